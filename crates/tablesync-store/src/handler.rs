//! # Queue Operation Handling
//!
//! The interface the offline queue calls back into while pushing, and the
//! no-op handler that disables its conflict-resolution machinery. With the
//! read-through store every write is already applied synchronously against
//! the remote service, so there is nothing left for a queued operation to
//! do by the time it is pushed.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use tablesync_domain::Record;

// =============================================================================
// QUEUED OPERATION TYPES
// =============================================================================

/// Kind of a queued table operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Insert,
    Update,
    Delete,
}

/// A single pending operation drained from the offline queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedOperation {
    pub kind: OperationKind,
    pub table: String,
    pub record_id: String,
    /// The record payload; absent for deletes.
    pub payload: Option<Record>,
}

/// Terminal status of a push batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PushStatus {
    Complete,
    Aborted,
}

/// Outcome of a completed push batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushSummary {
    pub status: PushStatus,
    pub errors: Vec<String>,
}

// =============================================================================
// OPERATION HANDLER
// =============================================================================

/// Callbacks the queue subsystem invokes while flushing.
#[async_trait]
pub trait OperationHandler: Send + Sync {
    /// Execute one queued operation, returning the server echo if any.
    async fn execute_operation(&self, operation: &QueuedOperation) -> Result<Option<Record>>;

    /// Invoked once after a push batch finishes.
    async fn on_push_complete(&self, summary: &PushSummary) -> Result<()>;
}

/// Handler that performs no conflict resolution and reports immediate
/// success for every queued operation and every completed push.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullSyncHandler;

#[async_trait]
impl OperationHandler for NullSyncHandler {
    async fn execute_operation(&self, _operation: &QueuedOperation) -> Result<Option<Record>> {
        Ok(None)
    }

    async fn on_push_complete(&self, _summary: &PushSummary) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn null_handler_succeeds_without_side_effects() {
        let handler = NullSyncHandler;

        let operation = QueuedOperation {
            kind: OperationKind::Update,
            table: "sightings".to_string(),
            record_id: "s1".to_string(),
            payload: Some(Record::with_id("s1")),
        };
        let echoed = handler.execute_operation(&operation).await.unwrap();
        assert!(echoed.is_none());

        let summary = PushSummary {
            status: PushStatus::Complete,
            errors: vec![],
        };
        handler.on_push_complete(&summary).await.unwrap();
    }

    #[tokio::test]
    async fn null_handler_ignores_aborted_pushes() {
        let handler = NullSyncHandler;
        let summary = PushSummary {
            status: PushStatus::Aborted,
            errors: vec!["connection reset".to_string()],
        };
        assert!(handler.on_push_complete(&summary).await.is_ok());
    }
}
