//! Persistence layer for arena objects.
//!
//! The store is an external collaborator: it owns every durable byte, and the
//! reconcilers only hold per-invocation copies read through [`Api`].
//!
//! - [`ObjectStore`] is the raw, object-safe contract (JSON documents)
//! - [`Api`] is the typed, namespaced handle reconcilers use
//! - [`InMemoryStore`] and [`FileStore`] are the two implementations

mod api;
mod error;
mod file;
mod memory;
pub(crate) mod object;
mod traits;

pub use api::Api;
pub use error::{Result, StoreError};
pub use file::FileStore;
pub use memory::InMemoryStore;
pub use traits::{Change, ObjectStore, WatchEvent};
