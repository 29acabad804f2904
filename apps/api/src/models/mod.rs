pub mod activity;
pub mod file;
pub mod resume;
pub mod user;
