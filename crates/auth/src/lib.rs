pub mod error;
mod session;
mod user;

pub use crate::session::{ROTATE_THRESHOLD_SECS, SESSION_TTL_SECS, Session, SessionAuthority};
pub use crate::user::{LoginFailure, Role, Secret, User, authenticate};
