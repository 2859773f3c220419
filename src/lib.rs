//! rowdex - faceted search indexing for typed value tables.
//!
//! rowdex streams the rows of a value table (named entities × typed
//! variables) into a search engine as parent/child documents, derives the
//! engine mapping from the table's variable descriptors, and translates
//! declarative query terms (filters, field aggregations, global scopes)
//! into the engine's native query and aggregation syntax, resolving
//! variable names that may span several tables.
//!
//! The engine itself, the dataset's storage and the DTO layer stay behind
//! collaborator traits ([`EngineClient`], [`ConcurrentRowReader`],
//! [`SummaryHandler`], [`query::FieldResolver`]).
//!
//! # Quick start
//!
//! ```
//! use std::sync::Arc;
//!
//! use rowdex::{
//!     query::{FacetTerm, FieldTerm, QueryTerm, QueryTranslator},
//!     resolver::{StaticRegistry, TableResolver},
//!     table::{TableRef, ValueTable, ValueType, Variable},
//! };
//!
//! let table = ValueTable::new(
//!     TableRef::new("study", "baseline"),
//!     "Participant",
//!     vec![Variable::new("AGE", ValueType::Integer)],
//! );
//!
//! // Engine mapping for the table's values index.
//! let mapping = rowdex::mapping::values_mapping(&table);
//! assert!(mapping["ValueSet"]["properties"].is_object());
//!
//! // Translate a query-term tree into a native query object.
//! let registry = Arc::new(StaticRegistry::new([table.clone()]));
//! let resolver = TableResolver::new(table, registry);
//! let query = QueryTranslator::new(Box::new(resolver), 10)
//!     .translate(&[FacetTerm::new(
//!         "0",
//!         QueryTerm::Field(FieldTerm::new("AGE")),
//!     )])
//!     .unwrap();
//! assert_eq!(
//!     query["aggregations"]["0"]["extended_stats"]["field"],
//!     "study_baseline-AGE-integer"
//! );
//! ```

pub mod engine;
pub mod error;
pub mod indexer;
pub mod mapping;
pub mod project;
pub mod query;
pub mod reader;
pub mod resolver;
pub mod summary;
pub mod table;

pub use engine::{
    BulkAction, BulkBatch, BulkReport, EngineClient, TaskRunner, ThreadRunner,
};
pub use error::{Error, Result};
pub use indexer::ValuesIndexer;
pub use query::QueryTranslator;
pub use reader::{ConcurrentRowReader, InMemoryReader, RowCallback};
pub use summary::SummaryHandler;
pub use table::{
    TableRef, Value, ValueTable, ValueType, Variable, VariableNature,
};
