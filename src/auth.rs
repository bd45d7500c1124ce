//! Access tokens, decoded claims, and the session summary persisted next to them.

pub mod session;
pub mod token;

pub use session::*;
pub use token::*;
