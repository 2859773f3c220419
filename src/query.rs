//! Translation of declarative query terms into engine-native queries.
//!
//! A query-term tree (field aggregations, logical filters, global scopes)
//! becomes one combined query-string query plus an aggregation tree of the
//! same shape. The term model (de)serializes with serde, so trees can arrive
//! as JSON documents. Variable names are resolved through [`FieldResolver`]
//! collaborators; names qualified with another table lazily pull in a
//! resolver for that table, cached for the duration of the translation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};

use crate::{
    error::{Error, Result},
    resolver::VariableReference,
    table::VariableNature,
};

/// Resolves bare variable names for one table.
pub trait FieldResolver {
    /// Table reference this resolver is bound to.
    fn reference(&self) -> String;

    fn field_name(&self, variable: &str) -> Result<String>;

    fn nature(&self, variable: &str) -> Result<VariableNature>;

    /// Native match-all query fragment for this table's documents.
    fn query_fragment(&self) -> String;

    /// A resolver bound to another table of the same engine.
    fn for_table(
        &self,
        datasource: &str,
        table: &str,
    ) -> Result<Box<dyn FieldResolver>>;
}

impl std::fmt::Debug for dyn FieldResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FieldResolver")
            .field("reference", &self.reference())
            .finish()
    }
}

/// Explicit aggregation kind requested on a field term.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AggregationType {
    Missing,
    Cardinality,
    Terms,
    Stats,
    Percentiles,
}

/// An aggregation over one variable's field.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldTerm {
    pub variable: String,
    pub aggregation: Option<AggregationType>,
}

impl FieldTerm {
    pub fn new(variable: impl Into<String>) -> Self {
        Self {
            variable: variable.into(),
            aggregation: None,
        }
    }

    pub fn with_aggregation(mut self, aggregation: AggregationType) -> Self {
        self.aggregation = Some(aggregation);
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TermOperator {
    And,
    Or,
}

/// Optional numeric-range bounds, each independently inclusive or exclusive.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RangeBounds {
    pub from: Option<String>,
    pub to: Option<String>,
    pub include_lower: Option<bool>,
    pub include_upper: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Set membership over the listed candidate values.
    In(Vec<String>),
    Range(RangeBounds),
    Exists,
}

/// One leaf filter on a variable, optionally negated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterTerm {
    pub variable: String,
    pub kind: FilterKind,
    #[serde(default)]
    pub not: bool,
}

impl FilterTerm {
    pub fn new(variable: impl Into<String>, kind: FilterKind) -> Self {
        Self {
            variable: variable.into(),
            kind,
            not: false,
        }
    }

    pub fn negated(mut self) -> Self {
        self.not = true;
        self
    }
}

/// One or more leaf filters combined under a logical operator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogicalTerm {
    pub operator: TermOperator,
    pub filters: Vec<FilterTerm>,
}

/// One node of the query-term tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryTerm {
    Field(FieldTerm),
    Filter(LogicalTerm),
    /// A logical filter with a nested aggregation evaluated within the
    /// filtered scope.
    FacetFilter {
        filter: LogicalTerm,
        field: Option<FieldTerm>,
    },
    /// Aggregation scope unconstrained by the outer query filter.
    Global { field: Option<FieldTerm> },
}

/// A named facet and its term.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetTerm {
    pub facet: String,
    pub term: QueryTerm,
}

impl FacetTerm {
    pub fn new(facet: impl Into<String>, term: QueryTerm) -> Self {
        Self {
            facet: facet.into(),
            term,
        }
    }
}

/// Translates a query-term tree into one engine-native query object.
///
/// Holds no state beyond its per-call resolver cache; build one translator
/// per translation.
pub struct QueryTranslator {
    resolvers: Vec<(String, Box<dyn FieldResolver>)>,
    terms_facet_size: u64,
}

impl QueryTranslator {
    /// `terms_facet_size` bounds the bucket count of non-exhaustive terms
    /// aggregations.
    pub fn new(primary: Box<dyn FieldResolver>, terms_facet_size: u64) -> Self {
        let reference = primary.reference();
        Self {
            resolvers: vec![(reference, primary)],
            terms_facet_size,
        }
    }

    pub fn translate(mut self, terms: &[FacetTerm]) -> Result<Json> {
        let mut aggregations = Map::new();
        for term in terms {
            let converted = self.convert_term(&term.term)?;
            aggregations.insert(term.facet.clone(), converted);
        }

        // The query string is assembled after the aggregations have been
        // walked, so lazily registered tables contribute their fragment.
        Ok(json!({
            "query": {"query_string": {"query": self.query_string()}},
            "size": 0,
            "aggregations": aggregations,
        }))
    }

    /// Logical OR of each referenced table's native query fragment: the
    /// query matches documents belonging to any of them.
    fn query_string(&self) -> String {
        self.resolvers
            .iter()
            .map(|(_, resolver)| resolver.query_fragment())
            .collect::<Vec<_>>()
            .join(" OR ")
    }

    fn convert_term(&mut self, term: &QueryTerm) -> Result<Json> {
        let mut out = Map::new();
        match term {
            QueryTerm::Filter(logical) => {
                self.convert_logical("filter", logical, &mut out)?;
            }
            QueryTerm::FacetFilter { filter, field } => {
                self.convert_logical("filter", filter, &mut out)?;
                if let Some(field) = field {
                    self.convert_nested_field(field, &mut out)?;
                }
            }
            QueryTerm::Field(field) => {
                self.convert_field(field, &mut out)?;
            }
            QueryTerm::Global { field } => {
                out.insert("global".into(), json!({}));
                if let Some(field) = field {
                    self.convert_nested_field(field, &mut out)?;
                }
            }
        }
        Ok(Json::Object(out))
    }

    fn convert_nested_field(
        &mut self,
        field: &FieldTerm,
        out: &mut Map<String, Json>,
    ) -> Result<()> {
        let mut agg = Map::new();
        self.convert_field(field, &mut agg)?;
        out.insert("aggregations".into(), json!({"0": agg}));
        Ok(())
    }

    fn convert_field(
        &mut self,
        term: &FieldTerm,
        out: &mut Map<String, Json>,
    ) -> Result<()> {
        let mut field = Map::new();
        let name = self.field_name(&term.variable)?;
        field.insert("field".into(), json!(name));

        match term.aggregation {
            Some(aggregation) => {
                self.convert_field_by_type(term, aggregation, field, out)
            }
            None => self.convert_field_by_nature(term, field, out),
        }
    }

    fn convert_field_by_type(
        &mut self,
        term: &FieldTerm,
        aggregation: AggregationType,
        mut field: Map<String, Json>,
        out: &mut Map<String, Json>,
    ) -> Result<()> {
        match aggregation {
            AggregationType::Missing => {
                out.insert("missing".into(), Json::Object(field));
            }
            AggregationType::Cardinality => {
                out.insert("cardinality".into(), Json::Object(field));
            }
            AggregationType::Terms => {
                field.insert("size".into(), json!(self.terms_facet_size));
                out.insert("terms".into(), Json::Object(field));
            }
            AggregationType::Stats => {
                self.require_continuous(
                    &term.variable,
                    "statistics aggregation is only applicable to numeric continuous variables",
                )?;
                out.insert("extended_stats".into(), Json::Object(field));
            }
            AggregationType::Percentiles => {
                self.require_continuous(
                    &term.variable,
                    "percentiles aggregation is only applicable to numeric continuous variables",
                )?;
                out.insert("percentiles".into(), Json::Object(field));
            }
        }
        Ok(())
    }

    /// Default aggregation from the variable's nature.
    fn convert_field_by_nature(
        &mut self,
        term: &FieldTerm,
        mut field: Map<String, Json>,
        out: &mut Map<String, Json>,
    ) -> Result<()> {
        match self.nature(&term.variable)? {
            VariableNature::Continuous => {
                out.insert("extended_stats".into(), Json::Object(field));
            }
            VariableNature::Categorical => {
                // All category frequencies are wanted; the category set is
                // small but must be exhaustive, so lift the bucket limit.
                field.insert("size".into(), json!(0));
                out.insert("terms".into(), Json::Object(field));
            }
            VariableNature::Other => {
                field.insert("size".into(), json!(self.terms_facet_size));
                out.insert("terms".into(), Json::Object(field));
            }
        }
        Ok(())
    }

    fn require_continuous(
        &mut self,
        variable: &str,
        message: &str,
    ) -> Result<()> {
        if self.nature(variable)? != VariableNature::Continuous {
            return Err(Error::InvalidAggregation(message.to_string()));
        }
        Ok(())
    }

    fn convert_logical(
        &mut self,
        key: &str,
        logical: &LogicalTerm,
        out: &mut Map<String, Json>,
    ) -> Result<()> {
        match logical.filters.as_slice() {
            [] => {}
            // A single leaf is emitted unwrapped.
            [single] => {
                let leaf = self.convert_filter(single)?;
                out.insert(key.into(), leaf);
            }
            filters => {
                let operator = match logical.operator {
                    TermOperator::And => "and",
                    TermOperator::Or => "or",
                };
                let leaves = filters
                    .iter()
                    .map(|f| self.convert_filter(f))
                    .collect::<Result<Vec<_>>>()?;
                out.insert(key.into(), json!({operator: leaves}));
            }
        }
        Ok(())
    }

    fn convert_filter(&mut self, filter: &FilterTerm) -> Result<Json> {
        let field = self.field_name(&filter.variable)?;
        let inner = match &filter.kind {
            FilterKind::In(values) if values.len() == 1 => {
                json!({"term": {field: values[0]}})
            }
            FilterKind::In(values) => json!({"terms": {field: values}}),
            FilterKind::Range(bounds) => {
                let mut range = Map::new();
                if let Some(from) = &bounds.from {
                    range.insert("from".into(), json!(from));
                }
                if let Some(include_lower) = bounds.include_lower {
                    range.insert("include_lower".into(), json!(include_lower));
                }
                if let Some(to) = &bounds.to {
                    range.insert("to".into(), json!(to));
                }
                if let Some(include_upper) = bounds.include_upper {
                    range.insert("include_upper".into(), json!(include_upper));
                }
                json!({"numeric_range": {field: range}})
            }
            FilterKind::Exists => json!({"exists": {"field": field}}),
        };
        Ok(if filter.not {
            json!({"not": inner})
        } else {
            inner
        })
    }

    fn field_name(&mut self, variable: &str) -> Result<String> {
        self.resolve(variable, |resolver, name| resolver.field_name(name))
    }

    fn nature(&mut self, variable: &str) -> Result<VariableNature> {
        self.resolve(variable, |resolver, name| resolver.nature(name))
    }

    /// Resolve against the primary table; on an unknown variable, reparse
    /// the name as a qualified reference and retry against that table's
    /// resolver, lazily instantiated and cached by table reference.
    fn resolve<T>(
        &mut self,
        variable: &str,
        get: impl Fn(&dyn FieldResolver, &str) -> Result<T>,
    ) -> Result<T> {
        let primary = self.resolvers[0].1.as_ref();
        match get(primary, variable) {
            Err(original @ Error::NoSuchVariable { .. }) => {
                let reference = VariableReference::parse(variable);
                let (Some(datasource), Some(table)) =
                    (&reference.datasource, &reference.table)
                else {
                    return Err(original);
                };
                let key = format!("{datasource}.{table}");
                if !self.resolvers.iter().any(|(r, _)| r == &key) {
                    let resolver =
                        self.resolvers[0].1.for_table(datasource, table)?;
                    self.resolvers.push((key.clone(), resolver));
                }
                let resolver = self
                    .resolvers
                    .iter()
                    .find(|(r, _)| r == &key)
                    .map(|(_, r)| r.as_ref())
                    .ok_or(original)?;
                get(resolver, &reference.variable)
            }
            other => other,
        }
    }
}
