pub mod log;
pub mod store;

pub use store::{Phase, SessionError, SessionSnapshot, SessionStore};
