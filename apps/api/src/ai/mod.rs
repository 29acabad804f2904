pub mod ats;
pub mod handlers;
pub mod prompts;
pub mod suggestions;
