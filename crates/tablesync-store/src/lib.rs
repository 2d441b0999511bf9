//! # Tablesync Store Library
//!
//! Read-through / write-through caching layer between an application and two
//! backing collaborators: a local persistent store and a remote data service
//! reachable only over the network.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                     Application Layer                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      LocalStore trait                        │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       ReadthruStore                          │
//! │   (read-through population, write-through mirroring,         │
//! │    system-table pass-through, queue flush on write)          │
//! └─────────────────────────────────────────────────────────────┘
//!          │                      │                     │
//!          ▼                      ▼                     ▼
//! ┌──────────────────┐  ┌────────────────────┐  ┌───────────────┐
//! │   Local store    │  │   Remote service   │  │  Sync queue   │
//! │  (cache, grows   │  │ (source of truth)  │  │ (drained, not │
//! │   on demand)     │  │                    │  │    filled)    │
//! └──────────────────┘  └────────────────────┘  └───────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tablesync_store::{LocalStore, ReadthruStore, StoreConfig};
//!
//! let store = ReadthruStore::with_config(sqlite_store, http_client, queue, StoreConfig::from_env());
//! store.initialize().await?;
//!
//! // absent locally, fetched from the remote service and cached
//! let record = store.lookup("sightings", "s1").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handler;
pub mod readthru;
pub mod testkit;
pub mod traits;

// Re-export commonly used types
pub use config::StoreConfig;
pub use error::{Result, StoreError};
pub use handler::{
    NullSyncHandler, OperationHandler, OperationKind, PushStatus, PushSummary, QueuedOperation,
};
pub use readthru::ReadthruStore;
pub use tablesync_domain::{CompareOp, Filter, OrderBy, Record, SortDir, SystemTables, TableQuery};
pub use traits::{LocalStore, RemoteService, SyncQueue};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
