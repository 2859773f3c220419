//! Field resolution against table snapshots.

use std::collections::HashMap;
use std::sync::Arc;

use crate::{
    error::{Error, Result},
    mapping,
    query::FieldResolver,
    table::{ValueTable, Variable, VariableNature},
};

/// A possibly-qualified variable reference.
///
/// Accepted forms: `datasource.table:variable`, `table:variable`, or a bare
/// variable name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableReference {
    pub datasource: Option<String>,
    pub table: Option<String>,
    pub variable: String,
}

impl VariableReference {
    pub fn parse(input: &str) -> Self {
        match input.split_once(':') {
            None => Self {
                datasource: None,
                table: None,
                variable: input.to_string(),
            },
            Some((qualifier, variable)) => match qualifier.split_once('.') {
                Some((datasource, table)) => Self {
                    datasource: Some(datasource.to_string()),
                    table: Some(table.to_string()),
                    variable: variable.to_string(),
                },
                None => Self {
                    datasource: None,
                    table: Some(qualifier.to_string()),
                    variable: variable.to_string(),
                },
            },
        }
    }

    pub fn is_qualified(&self) -> bool {
        self.datasource.is_some() && self.table.is_some()
    }
}

/// Looks up table snapshots so a resolver can be retargeted at another table.
pub trait TableRegistry: Send + Sync {
    fn table(&self, datasource: &str, table: &str) -> Result<ValueTable>;
}

/// Registry over a fixed set of in-memory tables.
#[derive(Debug, Default)]
pub struct StaticRegistry {
    tables: HashMap<String, ValueTable>,
}

impl StaticRegistry {
    pub fn new(tables: impl IntoIterator<Item = ValueTable>) -> Self {
        Self {
            tables: tables
                .into_iter()
                .map(|t| (t.reference.to_string(), t))
                .collect(),
        }
    }
}

impl TableRegistry for StaticRegistry {
    fn table(&self, datasource: &str, table: &str) -> Result<ValueTable> {
        let key = format!("{datasource}.{table}");
        self.tables
            .get(&key)
            .cloned()
            .ok_or(Error::NoSuchTable(key))
    }
}

/// Resolves bare variable names of one table to their indexed field name,
/// derived nature and native query fragment.
pub struct TableResolver {
    table: ValueTable,
    registry: Arc<dyn TableRegistry>,
}

impl TableResolver {
    pub fn new(table: ValueTable, registry: Arc<dyn TableRegistry>) -> Self {
        Self { table, registry }
    }

    fn variable(&self, name: &str) -> Result<&Variable> {
        self.table
            .variable(name)
            .ok_or_else(|| Error::NoSuchVariable {
                table: self.table.reference.to_string(),
                variable: name.to_string(),
            })
    }
}

impl FieldResolver for TableResolver {
    fn reference(&self) -> String {
        self.table.reference.to_string()
    }

    fn field_name(&self, variable: &str) -> Result<String> {
        let variable = self.variable(variable)?;
        Ok(mapping::field_name(&self.table.reference, variable))
    }

    fn nature(&self, variable: &str) -> Result<VariableNature> {
        Ok(VariableNature::of(self.variable(variable)?))
    }

    fn query_fragment(&self) -> String {
        format!("reference:\"{}\"", self.table.reference)
    }

    fn for_table(
        &self,
        datasource: &str,
        table: &str,
    ) -> Result<Box<dyn FieldResolver>> {
        let target = self.registry.table(datasource, table)?;
        Ok(Box::new(Self::new(target, Arc::clone(&self.registry))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{TableRef, ValueType};

    #[test]
    fn parses_bare_name() {
        let r = VariableReference::parse("AGE");
        assert_eq!(r.variable, "AGE");
        assert!(!r.is_qualified());
    }

    #[test]
    fn parses_table_qualified_name() {
        let r = VariableReference::parse("FNAC:AGE");
        assert_eq!(r.table.as_deref(), Some("FNAC"));
        assert_eq!(r.variable, "AGE");
        assert!(!r.is_qualified());
    }

    #[test]
    fn parses_fully_qualified_name() {
        let r = VariableReference::parse("opal-data.FNAC:AGE");
        assert_eq!(r.datasource.as_deref(), Some("opal-data"));
        assert_eq!(r.table.as_deref(), Some("FNAC"));
        assert_eq!(r.variable, "AGE");
        assert!(r.is_qualified());
    }

    fn resolver() -> TableResolver {
        let table = ValueTable::new(
            TableRef::new("ds", "tbl"),
            "Participant",
            vec![Variable::new("AGE", ValueType::Integer)],
        );
        let registry =
            Arc::new(StaticRegistry::new([table.clone()]));
        TableResolver::new(table, registry)
    }

    #[test]
    fn resolves_field_name_and_nature() {
        let r = resolver();
        assert_eq!(r.field_name("AGE").unwrap(), "ds_tbl-AGE-integer");
        assert_eq!(r.nature("AGE").unwrap(), VariableNature::Continuous);
        assert_eq!(r.query_fragment(), "reference:\"ds.tbl\"");
    }

    #[test]
    fn unknown_variable_is_an_error() {
        let err = resolver().field_name("NOPE").unwrap_err();
        assert!(matches!(err, Error::NoSuchVariable { .. }));
    }

    #[test]
    fn retarget_at_unknown_table_is_an_error() {
        let err = resolver().for_table("other", "tbl").unwrap_err();
        assert!(matches!(err, Error::NoSuchTable(_)));
    }
}
