//! # Test Doubles
//!
//! In-process implementations of the collaborator traits, shared by this
//! crate's tests and usable by downstream crates exercising the store
//! without a real backend or network. Every double appends to a shared
//! [`CallJournal`] so tests can assert not just *that* collaborators were
//! called but in which order.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::RwLock;

use crate::error::{Result, StoreError};
use crate::traits::{LocalStore, RemoteService, SyncQueue};
use tablesync_domain::{OrderBy, Record, SortDir, TableQuery};

// =============================================================================
// CALL JOURNAL
// =============================================================================

/// One observed collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    LocalLookup { table: String, id: String },
    LocalRead { table: String },
    LocalUpsert { table: String, ids: Vec<String>, from_server: bool },
    LocalDeleteIds { table: String, ids: Vec<String> },
    LocalDeleteQuery { table: String },
    RemoteLookup { table: String, id: String },
    RemoteRead { table: String, odata: String },
    RemoteInsert { table: String, id: String },
    RemoteUpdate { table: String, id: String },
    RemoteDelete { table: String, id: String },
    QueuePush,
}

/// Shared ordered log of collaborator calls.
#[derive(Debug, Clone, Default)]
pub struct CallJournal(Arc<Mutex<Vec<Call>>>);

impl CallJournal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, call: Call) {
        self.0.lock().expect("journal poisoned").push(call);
    }

    /// Snapshot of all calls observed so far.
    #[must_use]
    pub fn calls(&self) -> Vec<Call> {
        self.0.lock().expect("journal poisoned").clone()
    }

    /// Drain the journal, returning everything observed so far.
    #[must_use]
    pub fn take(&self) -> Vec<Call> {
        std::mem::take(&mut *self.0.lock().expect("journal poisoned"))
    }

    /// Count calls matching a predicate.
    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.0
            .lock()
            .expect("journal poisoned")
            .iter()
            .filter(|c| pred(c))
            .count()
    }
}

// =============================================================================
// MEMORY LOCAL STORE
// =============================================================================

/// In-memory [`LocalStore`] adapter: a map of tables, each a map of records
/// keyed by id. Queries are answered with the domain filter AST, ordering,
/// skip/top and projection applied in that order.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocalStore {
    inner: Arc<MemoryInner>,
}

#[derive(Debug, Default)]
struct MemoryInner {
    tables: RwLock<HashMap<String, BTreeMap<String, Record>>>,
    journal: CallJournal,
    initialized: AtomicBool,
    fail_upsert: Mutex<Option<StoreError>>,
}

impl MemoryLocalStore {
    #[must_use]
    pub fn new(journal: CallJournal) -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                journal,
                ..MemoryInner::default()
            }),
        }
    }

    /// Direct, unjournaled peek at a stored record.
    pub async fn peek(&self, table: &str, id: &str) -> Option<Record> {
        let tables = self.inner.tables.read().await;
        tables.get(table).and_then(|rows| rows.get(id)).cloned()
    }

    /// Number of records held for a table.
    pub async fn row_count(&self, table: &str) -> usize {
        let tables = self.inner.tables.read().await;
        tables.get(table).map_or(0, BTreeMap::len)
    }

    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::SeqCst)
    }

    /// Make the next upsert fail with `error` instead of writing, as a
    /// broken storage engine would.
    pub fn fail_upsert_with(&self, error: StoreError) {
        *self.inner.fail_upsert.lock().expect("failures poisoned") = Some(error);
    }
}

#[async_trait]
impl LocalStore for MemoryLocalStore {
    async fn initialize(&self) -> Result<()> {
        self.inner.initialized.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn lookup(&self, table: &str, id: &str) -> Result<Option<Record>> {
        self.inner.journal.record(Call::LocalLookup {
            table: table.to_string(),
            id: id.to_string(),
        });
        Ok(self.peek(table, id).await)
    }

    async fn read(&self, query: &TableQuery) -> Result<Vec<Record>> {
        self.inner.journal.record(Call::LocalRead {
            table: query.table.clone(),
        });

        let tables = self.inner.tables.read().await;
        let mut rows: Vec<Record> = tables
            .get(&query.table)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default();

        if let Some(filter) = &query.filter {
            rows.retain(|r| filter.matches(r));
        }
        if !query.order_by.is_empty() {
            rows.sort_by(|a, b| cmp_records(a, b, &query.order_by));
        }
        let rows: Vec<Record> = rows
            .into_iter()
            .skip(query.skip)
            .take(query.top.unwrap_or(usize::MAX))
            .map(|r| project(r, &query.select))
            .collect();

        Ok(rows)
    }

    async fn upsert(&self, table: &str, records: &[Record], from_server: bool) -> Result<()> {
        if let Some(error) = self.inner.fail_upsert.lock().expect("failures poisoned").take() {
            return Err(error);
        }

        let mut ids = Vec::with_capacity(records.len());
        for record in records {
            ids.push(record.id().ok_or(StoreError::MissingId)?.to_string());
        }
        self.inner.journal.record(Call::LocalUpsert {
            table: table.to_string(),
            ids: ids.clone(),
            from_server,
        });

        let mut tables = self.inner.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        for (id, record) in ids.into_iter().zip(records) {
            rows.insert(id, record.clone());
        }
        Ok(())
    }

    async fn delete_ids(&self, table: &str, ids: &[String]) -> Result<()> {
        self.inner.journal.record(Call::LocalDeleteIds {
            table: table.to_string(),
            ids: ids.to_vec(),
        });

        let mut tables = self.inner.tables.write().await;
        if let Some(rows) = tables.get_mut(table) {
            for id in ids {
                rows.remove(id);
            }
        }
        Ok(())
    }

    async fn delete_query(&self, query: &TableQuery) -> Result<()> {
        self.inner.journal.record(Call::LocalDeleteQuery {
            table: query.table.clone(),
        });

        let mut tables = self.inner.tables.write().await;
        if let Some(rows) = tables.get_mut(&query.table) {
            match &query.filter {
                Some(filter) => rows.retain(|_, r| !filter.matches(r)),
                None => rows.clear(),
            }
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.inner.initialized.store(false, Ordering::SeqCst);
        Ok(())
    }
}

fn cmp_records(a: &Record, b: &Record, order: &[OrderBy]) -> std::cmp::Ordering {
    for term in order {
        let left = a.get(&term.field).unwrap_or(&Value::Null);
        let right = b.get(&term.field).unwrap_or(&Value::Null);
        let mut ordering = cmp_values(left, right);
        if term.dir == SortDir::Descending {
            ordering = ordering.reverse();
        }
        if ordering != std::cmp::Ordering::Equal {
            return ordering;
        }
    }
    std::cmp::Ordering::Equal
}

fn cmp_values(a: &Value, b: &Value) -> std::cmp::Ordering {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x.cmp(y),
        _ => match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            _ => std::cmp::Ordering::Equal,
        },
    }
}

fn project(record: Record, select: &[String]) -> Record {
    if select.is_empty() {
        return record;
    }
    let mut fields = serde_json::Map::new();
    for field in select {
        if let Some(value) = record.get(field) {
            fields.insert(field.clone(), value.clone());
        }
    }
    Record::from(fields)
}

// =============================================================================
// SCRIPTED REMOTE SERVICE
// =============================================================================

/// In-memory [`RemoteService`] double with failure injection and echo
/// stamping.
///
/// `stamp_on_echo` registers fields the fake server adds to every insert and
/// update echo, standing in for server-assigned versions and timestamps, so
/// tests can tell the echo apart from the caller's payload. Query strings
/// are not interpreted: `read` returns every record of the table, either as
/// a bare array or (after `respond_with_envelope`) wrapped in a paged
/// `{"results": [...]}` envelope.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRemote {
    inner: Arc<RemoteInner>,
}

#[derive(Debug, Default)]
struct RemoteInner {
    tables: RwLock<HashMap<String, BTreeMap<String, Record>>>,
    journal: CallJournal,
    echo_stamps: Mutex<Vec<(String, Value)>>,
    fail_update: Mutex<HashMap<String, StoreError>>,
    envelope: AtomicBool,
}

impl ScriptedRemote {
    #[must_use]
    pub fn new(journal: CallJournal) -> Self {
        Self {
            inner: Arc::new(RemoteInner {
                journal,
                ..RemoteInner::default()
            }),
        }
    }

    /// Place a record on the fake server without going through the client
    /// surface.
    pub async fn seed(&self, table: &str, record: Record) {
        let id = record.id().expect("seeded records need an id").to_string();
        let mut tables = self.inner.tables.write().await;
        tables.entry(table.to_string()).or_default().insert(id, record);
    }

    /// Stamp a server-assigned field onto every future insert/update echo.
    pub fn stamp_on_echo(&self, field: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .echo_stamps
            .lock()
            .expect("stamps poisoned")
            .push((field.into(), value.into()));
    }

    /// Make the next update of `id` fail with `error` instead of executing.
    pub fn fail_update_with(&self, id: impl Into<String>, error: StoreError) {
        self.inner
            .fail_update
            .lock()
            .expect("failures poisoned")
            .insert(id.into(), error);
    }

    /// Answer reads with a `{"results": [...]}` envelope instead of a bare
    /// array.
    pub fn respond_with_envelope(&self) {
        self.inner.envelope.store(true, Ordering::SeqCst);
    }

    /// Direct, unjournaled peek at a server-side record.
    pub async fn peek(&self, table: &str, id: &str) -> Option<Record> {
        let tables = self.inner.tables.read().await;
        tables.get(table).and_then(|rows| rows.get(id)).cloned()
    }

    fn apply_stamps(&self, record: &Record) -> Record {
        let mut echoed = record.clone();
        for (field, value) in self.inner.echo_stamps.lock().expect("stamps poisoned").iter() {
            echoed = echoed.set(field.clone(), value.clone());
        }
        echoed
    }
}

#[async_trait]
impl RemoteService for ScriptedRemote {
    async fn lookup(&self, table: &str, id: &str) -> Result<Record> {
        self.inner.journal.record(Call::RemoteLookup {
            table: table.to_string(),
            id: id.to_string(),
        });
        self.peek(table, id)
            .await
            .ok_or_else(|| StoreError::remote_not_found(table, id))
    }

    async fn read(&self, table: &str, odata: &str) -> Result<Value> {
        self.inner.journal.record(Call::RemoteRead {
            table: table.to_string(),
            odata: odata.to_string(),
        });

        let tables = self.inner.tables.read().await;
        let rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.values().cloned().map(Record::into_value).collect())
            .unwrap_or_default();

        if self.inner.envelope.load(Ordering::SeqCst) {
            Ok(json!({ "results": rows, "count": rows.len() }))
        } else {
            Ok(Value::Array(rows))
        }
    }

    async fn insert(&self, table: &str, record: &Record) -> Result<Record> {
        let id = record.id().ok_or(StoreError::MissingId)?.to_string();
        self.inner.journal.record(Call::RemoteInsert {
            table: table.to_string(),
            id: id.clone(),
        });

        let mut tables = self.inner.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if rows.contains_key(&id) {
            return Err(StoreError::Remote {
                status: 409,
                message: format!("id already exists: {id}"),
            });
        }
        let echoed = self.apply_stamps(record);
        rows.insert(id, echoed.clone());
        Ok(echoed)
    }

    async fn update(&self, table: &str, record: &Record) -> Result<Record> {
        let id = record.id().ok_or(StoreError::MissingId)?.to_string();
        self.inner.journal.record(Call::RemoteUpdate {
            table: table.to_string(),
            id: id.clone(),
        });

        if let Some(error) = self
            .inner
            .fail_update
            .lock()
            .expect("failures poisoned")
            .remove(&id)
        {
            return Err(error);
        }

        let mut tables = self.inner.tables.write().await;
        let rows = tables.entry(table.to_string()).or_default();
        if !rows.contains_key(&id) {
            return Err(StoreError::remote_not_found(table, id));
        }
        let echoed = self.apply_stamps(record);
        rows.insert(id, echoed.clone());
        Ok(echoed)
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        self.inner.journal.record(Call::RemoteDelete {
            table: table.to_string(),
            id: id.to_string(),
        });

        let mut tables = self.inner.tables.write().await;
        let removed = tables.get_mut(table).and_then(|rows| rows.remove(id));
        match removed {
            Some(_) => Ok(()),
            None => Err(StoreError::remote_not_found(table, id)),
        }
    }
}

// =============================================================================
// COUNTING QUEUE
// =============================================================================

/// [`SyncQueue`] double that journals every flush and tracks a synthetic
/// pending count.
#[derive(Debug, Clone, Default)]
pub struct CountingQueue {
    inner: Arc<QueueInner>,
}

#[derive(Debug, Default)]
struct QueueInner {
    journal: CallJournal,
    pending: AtomicUsize,
    pushes: AtomicUsize,
    fail_push: Mutex<Option<StoreError>>,
}

impl CountingQueue {
    #[must_use]
    pub fn new(journal: CallJournal) -> Self {
        Self {
            inner: Arc::new(QueueInner {
                journal,
                ..QueueInner::default()
            }),
        }
    }

    /// Pretend `n` operations are waiting, as if another code path enqueued
    /// them.
    pub fn set_pending(&self, n: usize) {
        self.inner.pending.store(n, Ordering::SeqCst);
    }

    /// Number of flushes observed.
    #[must_use]
    pub fn pushes(&self) -> usize {
        self.inner.pushes.load(Ordering::SeqCst)
    }

    /// Make the next flush fail with `error`.
    pub fn fail_push_with(&self, error: StoreError) {
        *self.inner.fail_push.lock().expect("failures poisoned") = Some(error);
    }
}

#[async_trait]
impl SyncQueue for CountingQueue {
    async fn push(&self) -> Result<()> {
        if let Some(error) = self.inner.fail_push.lock().expect("failures poisoned").take() {
            return Err(error);
        }

        self.inner.journal.record(Call::QueuePush);
        self.inner.pushes.fetch_add(1, Ordering::SeqCst);
        self.inner.pending.store(0, Ordering::SeqCst);
        Ok(())
    }

    async fn pending(&self) -> usize {
        self.inner.pending.load(Ordering::SeqCst)
    }
}
