pub mod handlers;
pub mod processing;
pub mod storage;
