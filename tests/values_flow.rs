//! End-to-end flow over the public API: index a table through a fake engine,
//! then translate a query against the same table.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use rowdex::{
    BulkAction, BulkBatch, BulkReport, EngineClient, InMemoryReader, TableRef,
    Value, ValueTable, ValueType, ValuesIndexer, Variable,
    engine::ThreadRunner,
    query::{
        AggregationType, FacetTerm, FieldTerm, QueryTerm, QueryTranslator,
    },
    resolver::{StaticRegistry, TableResolver},
    summary::NoSummaries,
    table::{Category, Scalar},
};
use serde_json::Value as Json;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init()
        .ok();
}

#[derive(Default)]
struct FakeEngine {
    mappings: Mutex<HashMap<String, Json>>,
    committed: Mutex<Vec<BulkAction>>,
}

impl EngineClient for FakeEngine {
    fn has_index(&self, name: &str) -> rowdex::Result<bool> {
        Ok(self.mappings.lock().unwrap().contains_key(name))
    }

    fn create_index(&self, name: &str, mapping: Json) -> rowdex::Result<()> {
        self.mappings
            .lock()
            .unwrap()
            .insert(name.to_string(), mapping);
        Ok(())
    }

    fn get_mapping(&self, name: &str) -> rowdex::Result<Json> {
        Ok(self
            .mappings
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or(Json::Null))
    }

    fn put_mapping(&self, name: &str, mapping: Json) -> rowdex::Result<()> {
        self.mappings
            .lock()
            .unwrap()
            .insert(name.to_string(), mapping);
        Ok(())
    }

    fn delete_index(&self, name: &str) -> rowdex::Result<()> {
        self.mappings.lock().unwrap().remove(name);
        Ok(())
    }

    fn commit(&self, batch: BulkBatch) -> rowdex::Result<BulkReport> {
        self.committed
            .lock()
            .unwrap()
            .extend(batch.into_actions());
        Ok(BulkReport::default())
    }
}

fn study_table() -> ValueTable {
    ValueTable::new(
        TableRef::new("study", "baseline"),
        "Participant",
        vec![
            Variable::new("AGE", ValueType::Integer)
                .with_categories(vec![Category::new("9999", true)]),
            Variable::new("SMOKER", ValueType::Text).with_categories(vec![
                Category::new("YES", false),
                Category::new("NO", false),
            ]),
        ],
    )
}

#[test]
fn index_then_query() {
    init_tracing();

    let table = study_table();
    let engine = FakeEngine::default();
    let indexer = ValuesIndexer::new(
        &table,
        "study",
        &engine,
        Arc::new(NoSummaries),
        Arc::new(ThreadRunner),
    );

    let reader = InMemoryReader::new(vec![
        (
            "p1".to_string(),
            vec![
                Value::Scalar(Scalar::Integer(42)),
                Value::Scalar(Scalar::Text("YES".to_string())),
            ],
        ),
        (
            "p2".to_string(),
            vec![
                Value::Scalar(Scalar::Integer(9999)),
                Value::Scalar(Scalar::Text("NO".to_string())),
            ],
        ),
    ]);
    indexer.run(&reader).unwrap();

    assert!(engine.has_index("study-values").unwrap());
    let committed = engine.committed.lock().unwrap();
    assert_eq!(committed.len(), 4); // 2 parents + 2 children

    let p2 = committed
        .iter()
        .find_map(|a| match a {
            BulkAction::Index { id, source, .. }
                if id == "study.baseline-p2" =>
            {
                Some(source)
            }
            _ => None,
        })
        .unwrap();
    assert_eq!(p2["study_baseline-AGE-integer"], Json::Null);
    assert_eq!(p2["study_baseline-SMOKER-text"], "NO");

    // Query the categorical frequencies and the continuous statistics.
    let registry = Arc::new(StaticRegistry::new([table.clone()]));
    let resolver = TableResolver::new(table, registry);
    let query = QueryTranslator::new(Box::new(resolver), 10)
        .translate(&[
            FacetTerm::new("0", QueryTerm::Field(FieldTerm::new("SMOKER"))),
            FacetTerm::new(
                "1",
                QueryTerm::Field(
                    FieldTerm::new("AGE")
                        .with_aggregation(AggregationType::Stats),
                ),
            ),
        ])
        .unwrap();

    assert_eq!(
        query["query"]["query_string"]["query"],
        "reference:\"study.baseline\""
    );
    assert_eq!(
        query["aggregations"]["0"]["terms"]["field"],
        "study_baseline-SMOKER-text"
    );
    assert_eq!(query["aggregations"]["0"]["terms"]["size"], 0);
    assert_eq!(
        query["aggregations"]["1"]["extended_stats"]["field"],
        "study_baseline-AGE-integer"
    );
}
