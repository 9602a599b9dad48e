//! Persistence abstraction for the Clinidoc backend.
//!
//! This crate defines the `ChartStore` trait the orchestrator is injected
//! with, the query model, and an in-memory backend used by tests and the
//! default deployment. Entities are stored as versioned JSON bodies;
//! `replace` is a compare-and-swap on the entity version, which is how
//! per-entity linearizability is enforced.

pub mod error;
pub mod memory;
pub mod query;
pub mod traits;
pub mod types;

pub use error::{ErrorCategory, StorageError};
pub use memory::InMemoryStore;
pub use query::{Query, QueryFilter, QueryResult};
pub use traits::{ChartStore, StoreTransaction};
pub use types::{EntityKind, StoredEntity};

/// Type alias for a shareable store instance.
pub type DynChartStore = std::sync::Arc<dyn ChartStore>;

/// Creates a new in-memory store.
pub fn create_memory_store() -> DynChartStore {
    std::sync::Arc::new(InMemoryStore::new())
}
