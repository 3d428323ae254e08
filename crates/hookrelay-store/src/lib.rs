pub mod error;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sql_store;

// Re-export commonly used types
pub use error::{StoreError, StoreResult};
pub use memory::{MemoryAccountStore, MemoryCredentialStore, MemoryRequestLogStore};

#[cfg(feature = "sqlite")]
pub use sql_store::SqlStore;
