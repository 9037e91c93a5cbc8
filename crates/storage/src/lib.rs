pub mod backend;
pub mod error;
mod models;
pub mod path;
pub mod trash;

pub use crate::backend::StorageAdapter;
pub use crate::models::{Entry, EntryKind, ListOptions, Listing};
pub use crate::trash::{TrashRecord, TrashStore};
use std::sync::Arc;

pub type BackendHandle = Arc<dyn StorageAdapter + Send + Sync>;
