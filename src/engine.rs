//! Search-engine collaborator contracts.
//!
//! The engine itself lives behind [`EngineClient`]: index administration,
//! mapping management and bulk commits. The crate only builds the documents,
//! mappings and queries that flow through it.

use crate::error::Result;

/// One queued write against the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum BulkAction {
    /// Idempotent upsert of a parent entity document.
    Upsert {
        index: String,
        doc_type: String,
        id: String,
        source: serde_json::Value,
    },
    /// Index-write of a child value document, routed through its parent.
    Index {
        index: String,
        doc_type: String,
        id: String,
        parent: Option<String>,
        source: serde_json::Value,
    },
}

impl BulkAction {
    pub fn id(&self) -> &str {
        match self {
            BulkAction::Upsert { id, .. } | BulkAction::Index { id, .. } => id,
        }
    }
}

/// A pending batch of bulk actions.
#[derive(Debug, Default)]
pub struct BulkBatch {
    actions: Vec<BulkAction>,
}

impl BulkBatch {
    pub fn push(&mut self, action: BulkAction) {
        self.actions.push(action);
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn into_actions(self) -> Vec<BulkAction> {
        self.actions
    }
}

/// A sub-action the engine rejected during a bulk commit.
#[derive(Debug, Clone)]
pub struct BulkFailure {
    pub id: String,
    pub reason: String,
}

/// Per-action outcome of a bulk commit.
#[derive(Debug, Default)]
pub struct BulkReport {
    pub failures: Vec<BulkFailure>,
}

impl BulkReport {
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Client interface of the search engine.
///
/// `commit` blocks the calling thread until the engine acknowledges the
/// batch and reports per-action failures; only transport failures surface as
/// errors.
pub trait EngineClient: Send + Sync {
    fn has_index(&self, name: &str) -> Result<bool>;

    fn create_index(&self, name: &str, mapping: serde_json::Value)
    -> Result<()>;

    fn get_mapping(&self, name: &str) -> Result<serde_json::Value>;

    fn put_mapping(&self, name: &str, mapping: serde_json::Value)
    -> Result<()>;

    fn delete_index(&self, name: &str) -> Result<()>;

    fn commit(&self, batch: BulkBatch) -> Result<BulkReport>;
}

/// Executes detached background tasks handed off by the indexing pipeline.
pub trait TaskRunner: Send + Sync {
    fn spawn(&self, task: Box<dyn FnOnce() + Send>);
}

/// Default [`TaskRunner`] spawning a plain thread per task.
#[derive(Debug, Default)]
pub struct ThreadRunner;

impl TaskRunner for ThreadRunner {
    fn spawn(&self, task: Box<dyn FnOnce() + Send>) {
        std::thread::spawn(task);
    }
}
