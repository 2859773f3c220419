//! Projection of typed cell values into document-field values.

use serde_json::{Number, Value as Json};

use crate::table::{Scalar, Value, Variable, VariableNature};

/// Project a cell value into its document-field representation.
///
/// Missing sentinels of continuous variables project to null so numeric
/// aggregations stay correct. Date and datetime values project to their
/// canonical string form, keeping the document schema stable regardless of
/// the engine's date parsing configuration. Sequences project element-wise;
/// the continuous-missing rule applies only at the variable level, not per
/// sequence element.
pub fn project(
    variable: &Variable,
    nature: VariableNature,
    value: &Value,
) -> Json {
    if nature == VariableNature::Continuous && variable.is_missing_value(value)
    {
        return Json::Null;
    }
    match value {
        Value::Sequence(elements) => {
            Json::Array(elements.iter().map(project_element).collect())
        }
        other => project_element(other),
    }
}

fn project_element(value: &Value) -> Json {
    match value {
        Value::Null => Json::Null,
        Value::Scalar(scalar) => project_scalar(scalar),
        // Sequences do not nest in practice.
        Value::Sequence(elements) => {
            Json::Array(elements.iter().map(project_element).collect())
        }
    }
}

fn project_scalar(scalar: &Scalar) -> Json {
    match scalar {
        Scalar::Text(s) | Scalar::Locale(s) => Json::String(s.clone()),
        Scalar::Integer(i) => Json::Number((*i).into()),
        Scalar::Decimal(d) => {
            Number::from_f64(*d).map_or(Json::Null, Json::Number)
        }
        Scalar::Boolean(b) => Json::Bool(*b),
        // Canonical textual form, never a native temporal object.
        Scalar::Date(_) | Scalar::DateTime(_) => {
            Json::String(scalar.canonical_string())
        }
        // Binary and geo variables are excluded upstream.
        Scalar::Binary(_) | Scalar::Point { .. } => Json::Null,
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};
    use serde_json::json;

    use super::*;
    use crate::table::{Category, ValueType, VariableNature};

    fn continuous() -> (Variable, VariableNature) {
        let v = Variable::new("AGE", ValueType::Integer)
            .with_categories(vec![Category::new("9999", true)]);
        let n = VariableNature::of(&v);
        (v, n)
    }

    #[test]
    fn continuous_missing_projects_to_null() {
        let (v, n) = continuous();
        assert_eq!(
            project(&v, n, &Value::Scalar(Scalar::Integer(9999))),
            Json::Null
        );
    }

    #[test]
    fn categorical_sentinel_is_kept_literal() {
        // The missing rule only applies to continuous variables.
        let v = Variable::new("SMOKER", ValueType::Text).with_categories(vec![
            Category::new("YES", false),
            Category::new("DNK", true),
        ]);
        let n = VariableNature::of(&v);
        assert_eq!(
            project(&v, n, &Value::Scalar(Scalar::Text("DNK".into()))),
            json!("DNK")
        );
    }

    #[test]
    fn null_projects_to_null() {
        let (v, n) = continuous();
        assert_eq!(project(&v, n, &Value::Null), Json::Null);
    }

    #[test]
    fn scalars_project_to_native_payload() {
        let v = Variable::new("X", ValueType::Text);
        let n = VariableNature::of(&v);
        assert_eq!(
            project(&v, n, &Value::Scalar(Scalar::Text("abc".into()))),
            json!("abc")
        );
        assert_eq!(
            project(&v, n, &Value::Scalar(Scalar::Integer(42))),
            json!(42)
        );
        assert_eq!(
            project(&v, n, &Value::Scalar(Scalar::Decimal(1.5))),
            json!(1.5)
        );
        assert_eq!(
            project(&v, n, &Value::Scalar(Scalar::Boolean(true))),
            json!(true)
        );
    }

    #[test]
    fn dates_project_to_canonical_string() {
        let v = Variable::new("VISIT", ValueType::Date);
        let n = VariableNature::of(&v);
        let date = NaiveDate::from_ymd_opt(2017, 3, 9).unwrap();
        assert_eq!(
            project(&v, n, &Value::Scalar(Scalar::Date(date))),
            json!("2017-03-09")
        );

        let dt = Utc.with_ymd_and_hms(2017, 3, 9, 12, 30, 0).unwrap();
        assert_eq!(
            project(&v, n, &Value::Scalar(Scalar::DateTime(dt))),
            json!("2017-03-09T12:30:00.000Z")
        );
    }

    #[test]
    fn sequence_projects_element_wise() {
        let v = Variable::new("VISITS", ValueType::Date).repeatable();
        let n = VariableNature::of(&v);
        let seq = Value::Sequence(vec![
            Value::Scalar(Scalar::Date(
                NaiveDate::from_ymd_opt(2016, 1, 1).unwrap(),
            )),
            Value::Null,
            Value::Scalar(Scalar::Date(
                NaiveDate::from_ymd_opt(2016, 2, 1).unwrap(),
            )),
        ]);
        assert_eq!(
            project(&v, n, &seq),
            json!(["2016-01-01", null, "2016-02-01"])
        );
    }

    #[test]
    fn sequence_elements_skip_missing_rule() {
        // The sentinel sequence element stays literal; only whole-value
        // sentinels are nulled.
        let (v, n) = continuous();
        let v = Variable {
            repeatable: true,
            ..v
        };
        let seq = Value::Sequence(vec![
            Value::Scalar(Scalar::Integer(10)),
            Value::Scalar(Scalar::Integer(9999)),
        ]);
        assert_eq!(project(&v, n, &seq), json!([10, 9999]));
    }
}
