//! The concurrent values-indexing pipeline.
//!
//! Rows are delivered by a [`ConcurrentRowReader`], one callback per entity,
//! from several worker threads at once. The pipeline projects each cell,
//! batches the resulting documents and commits them through the engine's
//! bulk interface. The pending batch is the only shared mutable state and is
//! guarded by a single mutex; threshold-triggered commits run while holding
//! it, so concurrent rows block until the engine acknowledges.

use std::sync::{
    Arc, Mutex, OnceLock,
    atomic::{AtomicBool, AtomicU64, Ordering},
};
use std::time::Instant;

use serde_json::{Map, Value as Json, json};
use tracing::{debug, info, warn};

use crate::{
    engine::{BulkAction, BulkBatch, EngineClient, TaskRunner},
    error::{Error, Result},
    mapping::{self, VALUES_DOC_TYPE},
    project::project,
    reader::{ConcurrentRowReader, RowCallback},
    summary::SummaryHandler,
    table::{Value, ValueTable, Variable, VariableNature},
};

/// Number of bulk actions accumulated before a synchronous commit.
pub const BATCH_SIZE: usize = 100;

/// Per-variable snapshot taken once at begin, for O(1) hot-path lookups.
struct PlannedField {
    variable: Variable,
    nature: VariableNature,
    field: String,
}

/// Indexes one value table into a values index.
///
/// Implements [`RowCallback`] so it can be handed directly to a concurrent
/// row reader; [`ValuesIndexer::run`] wires the two together.
pub struct ValuesIndexer<'a, E: EngineClient> {
    table: &'a ValueTable,
    engine: &'a E,
    summaries: Arc<dyn SummaryHandler>,
    tasks: Arc<dyn TaskRunner>,
    index_name: String,
    batch_size: usize,
    cancelled: Arc<AtomicBool>,
    done: AtomicU64,
    started: OnceLock<Instant>,
    plan: OnceLock<Vec<PlannedField>>,
    batch: Mutex<BulkBatch>,
}

impl<'a, E: EngineClient> ValuesIndexer<'a, E> {
    pub fn new(
        table: &'a ValueTable,
        index_root: &str,
        engine: &'a E,
        summaries: Arc<dyn SummaryHandler>,
        tasks: Arc<dyn TaskRunner>,
    ) -> Self {
        Self {
            table,
            engine,
            summaries,
            tasks,
            index_name: mapping::values_index_name(index_root),
            batch_size: BATCH_SIZE,
            cancelled: Arc::new(AtomicBool::new(false)),
            done: AtomicU64::new(0),
            started: OnceLock::new(),
            plan: OnceLock::new(),
            batch: Mutex::new(BulkBatch::default()),
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn index_name(&self) -> &str {
        &self.index_name
    }

    /// Cooperative cancellation flag, checked at per-entity granularity.
    pub fn cancellation(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Number of entities processed so far.
    pub fn progress(&self) -> u64 {
        self.done.load(Ordering::Relaxed)
    }

    /// Drive the full pipeline with the given reader.
    pub fn run<R: ConcurrentRowReader>(&self, reader: &R) -> Result<()> {
        let variables: Vec<Variable> =
            self.table.index_variables().cloned().collect();
        reader.read(&variables, self)
    }

    fn commit(&self, batch: BulkBatch) -> Result<()> {
        if batch.is_empty() {
            return Ok(());
        }
        debug!(
            actions = batch.len(),
            index = %self.index_name,
            "committing bulk batch"
        );
        let report = self.engine.commit(batch)?;
        if !report.is_ok() {
            for failure in &report.failures {
                warn!(
                    id = %failure.id,
                    reason = %failure.reason,
                    "bulk action rejected"
                );
            }
        }
        Ok(())
    }
}

impl<E: EngineClient> RowCallback for ValuesIndexer<'_, E> {
    fn on_begin(&self, variables: &[Variable]) -> Result<()> {
        self.started.get_or_init(Instant::now);

        if self.engine.has_index(&self.index_name)? {
            let mut live = self.engine.get_mapping(&self.index_name)?;
            mapping::update_values_mapping(self.table, &mut live);
            self.engine.put_mapping(&self.index_name, live)?;
        } else {
            let full = mapping::values_mapping(self.table);
            self.engine.create_index(&self.index_name, full)?;
        }

        let reference = self.table.reference.to_string();
        let plan = variables
            .iter()
            .map(|v| PlannedField {
                nature: VariableNature::of(v),
                field: mapping::field_name_for(
                    &reference,
                    &v.name,
                    v.value_type,
                ),
                variable: v.clone(),
            })
            .collect();
        let _ = self.plan.set(plan);
        Ok(())
    }

    fn on_values(&self, entity: &str, values: &[Value]) -> Result<()> {
        if self.is_cancelled() {
            return Ok(());
        }
        let plan = self
            .plan
            .get()
            .ok_or(Error::PipelineState("rows delivered before begin"))?;

        let mut source = Map::new();
        source.insert("identifier".into(), json!(entity));
        source.insert(
            "project".into(),
            json!(self.table.reference.datasource),
        );
        source.insert(
            "datasource".into(),
            json!(self.table.reference.datasource),
        );
        source.insert("table".into(), json!(self.table.reference.table));
        source.insert(
            "reference".into(),
            json!(self.table.reference.to_string()),
        );
        source.insert("entityType".into(), json!(self.table.entity_type));

        for (planned, value) in plan.iter().zip(values) {
            self.summaries.stack_variable(
                &self.table.reference,
                &planned.variable,
                value,
            );
            let projected = project(&planned.variable, planned.nature, value);
            source.insert(planned.field.clone(), projected);
        }

        let parent = BulkAction::Upsert {
            index: self.index_name.clone(),
            doc_type: self.table.entity_type.clone(),
            id: entity.to_string(),
            source: json!({"identifier": entity}),
        };
        let child = BulkAction::Index {
            index: self.index_name.clone(),
            doc_type: VALUES_DOC_TYPE.to_string(),
            id: format!("{}-{}", self.table.reference, entity),
            parent: Some(entity.to_string()),
            source: Json::Object(source),
        };

        let mut batch = self
            .batch
            .lock()
            .map_err(|_| Error::PipelineState("batch lock poisoned"))?;
        batch.push(parent);
        batch.push(child);
        self.done.fetch_add(1, Ordering::Relaxed);

        if batch.len() >= self.batch_size {
            let full = std::mem::take(&mut *batch);
            // Committed while holding the lock: one batch in flight at a
            // time, concurrent rows wait.
            self.commit(full)?;
        }
        Ok(())
    }

    fn on_complete(&self) -> Result<()> {
        if self.is_cancelled() {
            // No durable partial state: the whole index goes, along with any
            // in-flight summary accumulation.
            self.engine.delete_index(&self.index_name)?;
            self.summaries
                .clear_computing_summaries(&self.table.reference);
            info!(
                table = %self.table.reference,
                "indexing cancelled, index deleted"
            );
            return Ok(());
        }

        let pending = {
            let mut batch = self
                .batch
                .lock()
                .map_err(|_| Error::PipelineState("batch lock poisoned"))?;
            std::mem::take(&mut *batch)
        };
        self.commit(pending)?;
        self.engine
            .put_mapping(&self.index_name, mapping::timestamp_update(VALUES_DOC_TYPE))?;

        let elapsed =
            self.started.get().map(Instant::elapsed).unwrap_or_default();
        info!(
            table = %self.table.reference,
            entities = self.done.load(Ordering::Relaxed),
            ?elapsed,
            "indexed table"
        );

        // Summaries are computed in the background; indexing completion does
        // not wait for them.
        let summaries = Arc::clone(&self.summaries);
        let reference = self.table.reference.clone();
        self.tasks
            .spawn(Box::new(move || summaries.compute_summaries(&reference)));
        Ok(())
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
