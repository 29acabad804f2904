pub mod handlers;
pub mod jwt;
pub mod oauth;
pub mod password;
pub mod session;

pub use session::AuthUser;
