pub mod coordinator;
pub mod normalize;
pub mod polling;
pub mod scan_api;
