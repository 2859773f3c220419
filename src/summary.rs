//! Variable summary collaborator.

use crate::table::{TableRef, Value, Variable};

/// Accumulates per-variable statistics while a table is being indexed.
///
/// Cells are streamed in during indexing; `compute_summaries` is triggered
/// asynchronously once indexing completes, and `clear_computing_summaries`
/// purges the in-progress state when an indexing run is cancelled.
pub trait SummaryHandler: Send + Sync {
    fn stack_variable(&self, table: &TableRef, variable: &Variable, value: &Value);

    fn compute_summaries(&self, table: &TableRef);

    fn clear_computing_summaries(&self, table: &TableRef);
}

/// No-op handler for embedders that do not compute summaries.
#[derive(Debug, Default)]
pub struct NoSummaries;

impl SummaryHandler for NoSummaries {
    fn stack_variable(&self, _: &TableRef, _: &Variable, _: &Value) {}

    fn compute_summaries(&self, _: &TableRef) {}

    fn clear_computing_summaries(&self, _: &TableRef) {}
}
