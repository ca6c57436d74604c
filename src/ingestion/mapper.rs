//! Record Mapper - source element to normalized record
//!
//! Pure transformation with no I/O. Each output column evaluates its
//! `FieldSource`; absent attributes are normal and never an error.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

use crate::ingestion::fields::{self, FieldSpec};

/// Where a column's value comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldSource {
    /// No source attribute; always NULL
    Absent,

    /// First present, non-null attribute wins
    Chain(&'static [&'static str]),

    /// `YYYY-MM-01` built from the first-registration year and month
    RegistrationDate,

    /// Stamped with the mapping time
    Now,

    Constant(bool),
}

/// A single typed column value
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Null,
    Text(String),
    Integer(i64),
    /// Decimal in its exact textual form
    Decimal(String),
    Boolean(bool),
    /// Calendar date in `YYYY-MM-DD` form
    Date(String),
    Timestamp(DateTime<Utc>),
}

impl FieldValue {
    /// Convert a JSON attribute value, keeping its natural type
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => FieldValue::Null,
            Value::Bool(b) => FieldValue::Boolean(*b),
            Value::Number(n) => match n.as_i64().or_else(|| n.as_f64().and_then(whole_number)) {
                Some(i) => FieldValue::Integer(i),
                None => FieldValue::Decimal(n.to_string()),
            },
            Value::String(s) => FieldValue::Text(s.clone()),
            other => FieldValue::Text(other.to_string()),
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Text form bound as a statement parameter; the column type does the cast
    pub fn to_param(&self) -> Option<String> {
        match self {
            FieldValue::Null => None,
            FieldValue::Text(s) | FieldValue::Decimal(s) | FieldValue::Date(s) => Some(s.clone()),
            FieldValue::Integer(i) => Some(i.to_string()),
            FieldValue::Boolean(b) => Some(b.to_string()),
            FieldValue::Timestamp(ts) => Some(ts.to_rfc3339_opts(SecondsFormat::Millis, true)),
        }
    }
}

/// Fixed-shape record, one value per destination column in table order
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRecord {
    fields: &'static [FieldSpec],
    values: Vec<FieldValue>,
}

impl NormalizedRecord {
    pub fn values(&self) -> &[FieldValue] {
        &self.values
    }

    /// Value of a column by name
    pub fn get(&self, column: &str) -> Option<&FieldValue> {
        self.fields
            .iter()
            .position(|f| f.column == column)
            .map(|i| &self.values[i])
    }

    /// Statement parameters in column order
    pub fn params(&self) -> Vec<Option<String>> {
        self.values.iter().map(FieldValue::to_param).collect()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Maps source elements onto a field table
#[derive(Debug, Clone, Copy)]
pub struct RecordMapper {
    fields: &'static [FieldSpec],
}

impl RecordMapper {
    pub fn new(fields: &'static [FieldSpec]) -> Self {
        Self { fields }
    }

    /// Mapper for the `vehicle_info` table
    pub fn vehicle() -> Self {
        Self::new(fields::VEHICLE_FIELDS)
    }

    pub fn fields(&self) -> &'static [FieldSpec] {
        self.fields
    }

    pub fn map(&self, element: &Value) -> NormalizedRecord {
        self.map_at(element, Utc::now())
    }

    /// Deterministic mapping with an explicit stamp for `Now` columns
    pub fn map_at(&self, element: &Value, now: DateTime<Utc>) -> NormalizedRecord {
        let values = self
            .fields
            .iter()
            .map(|field| match field.source {
                FieldSource::Absent => FieldValue::Null,
                FieldSource::Chain(names) => first_present(element, names)
                    .map(FieldValue::from_json)
                    .unwrap_or(FieldValue::Null),
                FieldSource::RegistrationDate => synthesize_registration_date(
                    element.get(fields::REGISTRATION_YEAR),
                    element.get(fields::REGISTRATION_MONTH),
                )
                .map(FieldValue::Date)
                .unwrap_or(FieldValue::Null),
                FieldSource::Now => FieldValue::Timestamp(now),
                FieldSource::Constant(b) => FieldValue::Boolean(b),
            })
            .collect();

        NormalizedRecord {
            fields: self.fields,
            values,
        }
    }
}

/// First attribute in `names` that is present and not null.
///
/// Non-object elements have no attributes.
pub fn first_present<'a>(element: &'a Value, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .filter_map(|name| element.get(*name))
        .find(|value| !value.is_null())
}

/// Build `YYYY-MM-01` from a year and month attribute.
///
/// A missing year yields `None`; a missing month defaults to `01`.
/// Zero, `false` and blank parts count as missing. Numeric months are
/// zero-padded to two digits.
pub fn synthesize_registration_date(year: Option<&Value>, month: Option<&Value>) -> Option<String> {
    let year = year.and_then(date_part)?;
    let month = month
        .and_then(date_part)
        .map(|m| format!("{:0>2}", m))
        .unwrap_or_else(|| "01".to_string());
    Some(format!("{}-{}-01", year, month))
}

/// `f64` with no fractional part that fits an `i64`
fn whole_number(f: f64) -> Option<i64> {
    let in_range = f.is_finite() && f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64;
    in_range.then_some(f as i64)
}

fn date_part(value: &Value) -> Option<String> {
    match value {
        Value::Null | Value::Bool(false) => None,
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty() && s != "0").then(|| s.to_string())
        }
        Value::Number(n) => match FieldValue::from_json(value) {
            FieldValue::Integer(0) => None,
            FieldValue::Integer(i) => Some(i.to_string()),
            _ => Some(n.to_string()),
        },
        other => Some(other.to_string()),
    }
}
