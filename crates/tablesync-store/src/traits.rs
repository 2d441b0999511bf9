//! # Collaborator Traits
//!
//! Abstract interfaces for the three collaborators the read-through store
//! mediates between: the local persistent store, the remote table service,
//! and the offline operation queue. Implementations can be swapped for
//! different backends (SQLite, HTTP, mock, etc.)

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use tablesync_domain::{Record, TableQuery};

// =============================================================================
// LOCAL STORE
// =============================================================================

/// A key/value + query-able persistent store holding per-table records.
///
/// The storage engine behind it is not this crate's concern; the in-process
/// [`crate::testkit::MemoryLocalStore`] is the one adapter shipped here.
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// Prepare the store for use. Must complete before any other operation.
    async fn initialize(&self) -> Result<()>;

    /// Fetch a single record by table and id.
    async fn lookup(&self, table: &str, id: &str) -> Result<Option<Record>>;

    /// Execute a query against locally held records.
    async fn read(&self, query: &TableQuery) -> Result<Vec<Record>>;

    /// Insert-or-update records. `from_server` marks the rows as
    /// server-originated so the offline queue does not re-push them.
    async fn upsert(&self, table: &str, records: &[Record], from_server: bool) -> Result<()>;

    /// Delete records by id.
    async fn delete_ids(&self, table: &str, ids: &[String]) -> Result<()>;

    /// Delete every record matching a query.
    async fn delete_query(&self, query: &TableQuery) -> Result<()>;

    /// Release held resources.
    async fn close(&self) -> Result<()>;
}

// =============================================================================
// REMOTE TABLE SERVICE
// =============================================================================

/// Network client for the remote data service's per-table CRUD surface.
///
/// `lookup` and `update` fail with the distinguished
/// [`StoreError::RemoteNotFound`](crate::StoreError::RemoteNotFound) when the
/// target id does not exist remotely; every other failure is opaque to the
/// caller. Retries and timeouts, if any, live inside the implementation.
#[async_trait]
pub trait RemoteService: Send + Sync {
    /// Fetch a single record by id.
    async fn lookup(&self, table: &str, id: &str) -> Result<Record>;

    /// Execute an OData query string. The response is either a bare JSON
    /// array or an envelope object carrying a `results` array (paged,
    /// server-driven responses); the caller deals with both shapes.
    async fn read(&self, table: &str, odata: &str) -> Result<Value>;

    /// Create a record; returns the record as echoed by the server,
    /// including any server-assigned fields.
    async fn insert(&self, table: &str, record: &Record) -> Result<Record>;

    /// Update an existing record; returns the server echo.
    async fn update(&self, table: &str, record: &Record) -> Result<Record>;

    /// Delete a record by id.
    async fn delete(&self, table: &str, id: &str) -> Result<()>;
}

// =============================================================================
// SYNC QUEUE
// =============================================================================

/// The offline operation queue of the surrounding sync subsystem.
///
/// This crate only ever drains it: other code paths may still enqueue
/// operations, and flushing after every write-through guarantees no stale
/// queue entry shadows freshly written remote state.
#[async_trait]
pub trait SyncQueue: Send + Sync {
    /// Flush all pending queued operations. A no-op when nothing is queued.
    async fn push(&self) -> Result<()>;

    /// Number of operations currently awaiting a push.
    async fn pending(&self) -> usize;
}
