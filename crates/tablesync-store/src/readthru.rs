//! # Read-Through Store
//!
//! The mediating decorator: a [`LocalStore`] implementation that wraps an
//! inner local store and transparently populates it from the remote table
//! service on misses, while making every local mutation durable on the
//! remote service first. Deferred offline synchronization is effectively
//! disabled in favor of synchronous-then-cached behavior.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;

use crate::config::StoreConfig;
use crate::error::{Result, StoreError};
use crate::traits::{LocalStore, RemoteService, SyncQueue};
use tablesync_domain::{Record, TableQuery};

/// Read-through / write-through decorator over a local store, a remote
/// table service and the offline sync queue.
///
/// Reads check the local store first and fall back to the remote service,
/// caching whatever it returns. Writes go to the remote service first and
/// mirror the server's echo locally, so the remote service stays the source
/// of truth. System tables pass straight through to the local store.
///
/// The "cache" only ever grows through on-demand population: there is no
/// TTL, size bound or eviction, and no invalidation beyond explicit delete.
///
/// Known limitation: a successful remote write followed by a failing local
/// write leaves the two stores diverged; no compensating transaction is
/// attempted.
pub struct ReadthruStore<L, R, Q> {
    store: L,
    remote: R,
    queue: Q,
    config: StoreConfig,
    initialized: AtomicBool,
}

impl<L, R, Q> ReadthruStore<L, R, Q>
where
    L: LocalStore,
    R: RemoteService,
    Q: SyncQueue,
{
    /// Create a store with default configuration.
    pub fn new(store: L, remote: R, queue: Q) -> Self {
        Self::with_config(store, remote, queue, StoreConfig::default())
    }

    /// Create a store with explicit configuration.
    pub fn with_config(store: L, remote: R, queue: Q, config: StoreConfig) -> Self {
        Self {
            store,
            remote,
            queue,
            config,
            initialized: AtomicBool::new(false),
        }
    }

    /// The wrapped local store.
    pub const fn inner(&self) -> &L {
        &self.store
    }

    /// The offline queue this store flushes after write-throughs.
    pub const fn queue(&self) -> &Q {
        &self.queue
    }

    fn ensure_initialized(&self) -> Result<()> {
        if self.initialized.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::NotInitialized)
        }
    }

    fn is_system(&self, table: &str) -> bool {
        self.config.system_tables.is_system(table)
    }

    /// Write-through for one record: remote update, falling back to insert
    /// when the id does not exist remotely, then mirror the server echo
    /// locally. Any other remote failure propagates with no local write.
    async fn write_through(&self, table: &str, record: &Record) -> Result<()> {
        let echoed = match self.remote.update(table, record).await {
            Ok(echoed) => echoed,
            Err(error) if error.is_remote_not_found() => {
                tracing::debug!(table, "update target absent on remote, inserting");
                self.remote.insert(table, record).await?
            }
            Err(error) => return Err(error),
        };

        // the server echo is what gets cached, not the caller's payload
        self.store
            .upsert(table, std::slice::from_ref(&echoed), true)
            .await
    }
}

#[async_trait]
impl<L, R, Q> LocalStore for ReadthruStore<L, R, Q>
where
    L: LocalStore,
    R: RemoteService,
    Q: SyncQueue,
{
    async fn initialize(&self) -> Result<()> {
        self.store.initialize().await?;
        self.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn lookup(&self, table: &str, id: &str) -> Result<Option<Record>> {
        self.ensure_initialized()?;

        if let Some(record) = self.store.lookup(table, id).await? {
            tracing::debug!(table, id, "local hit");
            return Ok(Some(record));
        }
        if self.is_system(table) {
            return Ok(None);
        }

        tracing::debug!(table, id, "local miss, fetching from remote");
        let record = match self.remote.lookup(table, id).await {
            Ok(record) => record,
            // absent remotely too; no negative caching
            Err(error) if error.is_remote_not_found() => return Ok(None),
            Err(error) => return Err(error),
        };

        self.store
            .upsert(table, std::slice::from_ref(&record), true)
            .await?;
        Ok(Some(record))
    }

    async fn read(&self, query: &TableQuery) -> Result<Vec<Record>> {
        self.ensure_initialized()?;

        let local = self.store.read(query).await?;
        if !local.is_empty() || self.is_system(&query.table) {
            return Ok(local);
        }

        tracing::debug!(table = %query.table, "local result set empty, querying remote");
        let raw = self.remote.read(&query.table, &query.to_odata()).await?;
        let records = extract_results(raw)?;

        self.store.upsert(&query.table, &records, true).await?;
        Ok(records)
    }

    async fn upsert(&self, table: &str, records: &[Record], from_server: bool) -> Result<()> {
        self.ensure_initialized()?;

        if self.is_system(table) {
            return self.store.upsert(table, records, from_server).await;
        }

        // `from_server` is ignored for ordinary tables: every value written
        // below has just been confirmed against the remote truth.
        for record in records {
            self.write_through(table, record).await?;
        }

        // other code paths may still enqueue operations; flushing here
        // guarantees no stale queue entry shadows the fresh remote state
        self.queue.push().await
    }

    async fn delete_ids(&self, table: &str, ids: &[String]) -> Result<()> {
        self.ensure_initialized()?;

        if self.is_system(table) {
            return Ok(());
        }

        for id in ids {
            self.remote.delete(table, id).await?;
        }
        self.store.delete_ids(table, ids).await?;

        self.queue.push().await
    }

    async fn delete_query(&self, query: &TableQuery) -> Result<()> {
        self.ensure_initialized()?;

        // accepted asymmetry: queries are not translated into remote filter
        // deletes; only the local rows go away
        self.store.delete_query(query).await
    }

    async fn close(&self) -> Result<()> {
        // the remote client's lifetime is not owned here
        self.store.close().await
    }
}

/// Pull the record list out of a remote read response: either a bare array
/// or an envelope object carrying a `results` array. Anything else counts
/// as an empty result set.
fn extract_results(raw: Value) -> Result<Vec<Record>> {
    let items = match raw {
        Value::Array(items) => items,
        Value::Object(mut envelope) => match envelope.remove("results") {
            Some(Value::Array(items)) => items,
            _ => return Ok(Vec::new()),
        },
        _ => return Ok(Vec::new()),
    };

    items
        .into_iter()
        .map(|item| Record::from_value(item).map_err(StoreError::from))
        .collect()
}
