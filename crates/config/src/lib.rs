pub mod error;
mod settings;
mod users;

pub use crate::settings::Settings;
pub use crate::users::load_users;
