//! Concurrent row delivery from the source dataset.

use rayon::prelude::*;

use crate::{
    error::Result,
    table::{Value, Variable},
};

/// Callback invoked by a [`ConcurrentRowReader`].
///
/// `on_values` is called once per entity, possibly from several reader
/// threads at once, with one value per filtered variable in the order given
/// to `on_begin`. The reader queries `is_cancelled` before delivering each
/// row.
pub trait RowCallback: Sync {
    fn on_begin(&self, variables: &[Variable]) -> Result<()>;

    fn on_values(&self, entity: &str, values: &[Value]) -> Result<()>;

    fn on_complete(&self) -> Result<()>;

    fn is_cancelled(&self) -> bool;
}

/// Reads rows of a value table concurrently and drives a [`RowCallback`].
///
/// Implementations ignore individual read errors rather than aborting the
/// whole scan; only callback errors stop delivery.
pub trait ConcurrentRowReader {
    fn read(
        &self,
        variables: &[Variable],
        callback: &dyn RowCallback,
    ) -> Result<()>;
}

/// In-memory reader delivering rows from worker threads via rayon.
///
/// Rows carry one value per variable passed to [`ConcurrentRowReader::read`],
/// in the same order.
#[derive(Debug, Default)]
pub struct InMemoryReader {
    rows: Vec<(String, Vec<Value>)>,
}

impl InMemoryReader {
    pub fn new(rows: Vec<(String, Vec<Value>)>) -> Self {
        Self { rows }
    }
}

impl ConcurrentRowReader for InMemoryReader {
    fn read(
        &self,
        variables: &[Variable],
        callback: &dyn RowCallback,
    ) -> Result<()> {
        callback.on_begin(variables)?;
        self.rows.par_iter().try_for_each(|(entity, values)| {
            if callback.is_cancelled() {
                return Ok(());
            }
            callback.on_values(entity, values)
        })?;
        callback.on_complete()
    }
}
