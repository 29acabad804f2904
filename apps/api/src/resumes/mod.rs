pub mod completeness;
pub mod content;
pub mod drafts;
pub mod handlers;
pub mod impact;
pub mod repository;
pub mod search;
pub mod versioning;
