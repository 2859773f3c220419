use std::fmt;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};

/// The closed set of value types a variable can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Text,
    Integer,
    Decimal,
    Boolean,
    Date,
    DateTime,
    Locale,
    Binary,
    Point,
    LineString,
    Polygon,
}

impl ValueType {
    /// Canonical lower-case name, used in deterministic field names.
    pub fn name(self) -> &'static str {
        match self {
            ValueType::Text => "text",
            ValueType::Integer => "integer",
            ValueType::Decimal => "decimal",
            ValueType::Boolean => "boolean",
            ValueType::Date => "date",
            ValueType::DateTime => "datetime",
            ValueType::Locale => "locale",
            ValueType::Binary => "binary",
            ValueType::Point => "point",
            ValueType::LineString => "linestring",
            ValueType::Polygon => "polygon",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, ValueType::Integer | ValueType::Decimal)
    }

    pub fn is_geo(self) -> bool {
        matches!(
            self,
            ValueType::Point | ValueType::LineString | ValueType::Polygon
        )
    }

    pub fn is_date_time(self) -> bool {
        matches!(self, ValueType::Date | ValueType::DateTime)
    }
}

/// A typed scalar payload.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Text(String),
    Integer(i64),
    Decimal(f64),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<Utc>),
    Locale(String),
    Binary(Vec<u8>),
    Point { lon: f64, lat: f64 },
}

impl Scalar {
    /// Stable textual form: dates as `YYYY-MM-DD`, datetimes as RFC 3339.
    ///
    /// Used both for projecting date-typed values and for comparing a value
    /// against a variable's missing-category names.
    pub fn canonical_string(&self) -> String {
        match self {
            Scalar::Text(s) | Scalar::Locale(s) => s.clone(),
            Scalar::Integer(i) => i.to_string(),
            Scalar::Decimal(d) => d.to_string(),
            Scalar::Boolean(b) => b.to_string(),
            Scalar::Date(d) => d.format("%Y-%m-%d").to_string(),
            Scalar::DateTime(dt) => {
                dt.to_rfc3339_opts(SecondsFormat::Millis, true)
            }
            Scalar::Binary(bytes) => format!("{} bytes", bytes.len()),
            Scalar::Point { lon, lat } => format!("POINT({lon} {lat})"),
        }
    }
}

/// A cell value: absent, a single scalar, or an ordered sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Scalar(Scalar),
    Sequence(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self, Value::Sequence(_))
    }
}

/// A category declared on a variable. Categories flagged as `missing` act as
/// the variable's missing-value sentinels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub name: String,
    pub missing: bool,
}

impl Category {
    pub fn new(name: impl Into<String>, missing: bool) -> Self {
        Self {
            name: name.into(),
            missing,
        }
    }
}

/// A key/locale-qualified attribute on a variable (`label`, `label-en`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attribute {
    pub name: String,
    pub locale: Option<String>,
    pub value: String,
}

impl Attribute {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            locale: None,
            value: value.into(),
        }
    }

    pub fn localized(
        name: impl Into<String>,
        locale: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            locale: Some(locale.into()),
            value: value.into(),
        }
    }

    /// The indexed field name for this attribute: `name` or `name-locale`.
    pub fn field_name(&self) -> String {
        match &self.locale {
            Some(locale) => format!("{}-{}", self.name, locale),
            None => self.name.clone(),
        }
    }
}

/// A column descriptor, immutable snapshot taken at indexing time.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    pub name: String,
    pub value_type: ValueType,
    pub repeatable: bool,
    pub occurrence_group: Option<String>,
    pub unit: Option<String>,
    pub mime_type: Option<String>,
    pub referenced_entity_type: Option<String>,
    pub categories: Vec<Category>,
    pub attributes: Vec<Attribute>,
}

impl Variable {
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        Self {
            name: name.into(),
            value_type,
            repeatable: false,
            occurrence_group: None,
            unit: None,
            mime_type: None,
            referenced_entity_type: None,
            categories: Vec::new(),
            attributes: Vec::new(),
        }
    }

    pub fn repeatable(mut self) -> Self {
        self.repeatable = true;
        self
    }

    pub fn with_categories(mut self, categories: Vec<Category>) -> Self {
        self.categories = categories;
        self
    }

    pub fn with_attributes(mut self, attributes: Vec<Attribute>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Whether `value` is one of this variable's declared missing sentinels.
    ///
    /// Only scalar values can match; null and sequences never do.
    pub fn is_missing_value(&self, value: &Value) -> bool {
        let Value::Scalar(scalar) = value else {
            return false;
        };
        let text = scalar.canonical_string();
        self.categories.iter().any(|c| c.missing && c.name == text)
    }
}

/// Derived nature of a variable, driving projection and aggregation defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VariableNature {
    Categorical,
    Continuous,
    Other,
}

impl VariableNature {
    pub fn of(variable: &Variable) -> Self {
        if variable.categories.iter().any(|c| !c.missing) {
            return VariableNature::Categorical;
        }
        if variable.value_type.is_numeric() {
            return VariableNature::Continuous;
        }
        if variable.value_type == ValueType::Boolean {
            return VariableNature::Categorical;
        }
        VariableNature::Other
    }
}

/// A table reference: `datasource.table`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub datasource: String,
    pub table: String,
}

impl TableRef {
    pub fn new(datasource: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            datasource: datasource.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.datasource, self.table)
    }
}

/// The row/column container metadata. The row data itself is delivered by a
/// [`ConcurrentRowReader`](crate::reader::ConcurrentRowReader).
#[derive(Debug, Clone, PartialEq)]
pub struct ValueTable {
    pub reference: TableRef,
    pub entity_type: String,
    pub variables: Vec<Variable>,
}

impl ValueTable {
    pub fn new(
        reference: TableRef,
        entity_type: impl Into<String>,
        variables: Vec<Variable>,
    ) -> Self {
        Self {
            reference,
            entity_type: entity_type.into(),
            variables,
        }
    }

    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Variables eligible for indexing. Binary and geo values are never
    /// read, never projected.
    pub fn index_variables(&self) -> impl Iterator<Item = &Variable> {
        self.variables.iter().filter(|v| {
            v.value_type != ValueType::Binary && !v.value_type.is_geo()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn continuous_var() -> Variable {
        Variable::new("AGE", ValueType::Integer)
            .with_categories(vec![Category::new("9999", true)])
    }

    #[test]
    fn nature_continuous_for_numeric_without_categories() {
        let v = Variable::new("WEIGHT", ValueType::Decimal);
        assert_eq!(VariableNature::of(&v), VariableNature::Continuous);
    }

    #[test]
    fn nature_continuous_when_all_categories_missing() {
        assert_eq!(
            VariableNature::of(&continuous_var()),
            VariableNature::Continuous
        );
    }

    #[test]
    fn nature_categorical_with_regular_categories() {
        let v = Variable::new("SMOKER", ValueType::Text).with_categories(vec![
            Category::new("YES", false),
            Category::new("NO", false),
        ]);
        assert_eq!(VariableNature::of(&v), VariableNature::Categorical);
    }

    #[test]
    fn nature_categorical_for_boolean() {
        let v = Variable::new("CONSENT", ValueType::Boolean);
        assert_eq!(VariableNature::of(&v), VariableNature::Categorical);
    }

    #[test]
    fn nature_other_for_plain_text() {
        let v = Variable::new("COMMENT", ValueType::Text);
        assert_eq!(VariableNature::of(&v), VariableNature::Other);
    }

    #[test]
    fn missing_value_matches_sentinel_across_types() {
        let v = continuous_var();
        assert!(v.is_missing_value(&Value::Scalar(Scalar::Integer(9999))));
        assert!(v.is_missing_value(&Value::Scalar(Scalar::Text("9999".into()))));
        assert!(!v.is_missing_value(&Value::Scalar(Scalar::Integer(42))));
        assert!(!v.is_missing_value(&Value::Null));
    }

    #[test]
    fn index_variables_skips_binary_and_geo() {
        let table = ValueTable::new(
            TableRef::new("ds", "tbl"),
            "Participant",
            vec![
                Variable::new("A", ValueType::Text),
                Variable::new("B", ValueType::Binary),
                Variable::new("C", ValueType::Point),
                Variable::new("D", ValueType::Integer),
            ],
        );
        let names: Vec<_> =
            table.index_variables().map(|v| v.name.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);
    }

    #[test]
    fn table_ref_display() {
        assert_eq!(TableRef::new("opal-data", "FNAC").to_string(), "opal-data.FNAC");
    }

    #[test]
    fn attribute_field_name_includes_locale() {
        assert_eq!(Attribute::new("label", "Age").field_name(), "label");
        assert_eq!(
            Attribute::localized("label", "en", "Age").field_name(),
            "label-en"
        );
    }
}
