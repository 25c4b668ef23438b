// Normalizer - flattens board items into typed records keyed by canonical field name
use crate::domain::board::{BoardItem, ColumnValue};
use crate::domain::record::{FieldValue, NormalizedRecord, ITEM_ID_FIELD, ITEM_NAME_FIELD};
use crate::infrastructure::config::{DerivedFieldSpec, FieldDefault, FieldKind, FieldSpec};
use chrono::{DateTime, NaiveDate, NaiveDateTime};

pub struct Normalizer<'a> {
    fields: &'a [FieldSpec],
    derived: &'a [DerivedFieldSpec],
}

impl<'a> Normalizer<'a> {
    pub fn new(fields: &'a [FieldSpec], derived: &'a [DerivedFieldSpec]) -> Self {
        Self { fields, derived }
    }

    pub fn normalize(&self, items: &[BoardItem]) -> Vec<NormalizedRecord> {
        items.iter().map(|item| self.normalize_item(item)).collect()
    }

    pub fn normalize_item(&self, item: &BoardItem) -> NormalizedRecord {
        let mut record = NormalizedRecord::new()
            .with(ITEM_ID_FIELD, FieldValue::Text(item.id.clone()))
            .with(ITEM_NAME_FIELD, FieldValue::Text(item.name.clone()));

        for spec in self.fields {
            let value = match source_column(item, spec) {
                Some(column) => coerce(item, spec, column),
                None => default_value(spec),
            };
            record.set(&spec.name, value);
        }

        for derived in self.derived {
            let value = derived
                .first_nonzero_of
                .iter()
                .filter_map(|name| record.get(name).as_number())
                .find(|n| *n != 0.0)
                .unwrap_or(0.0);
            record.set(&derived.name, FieldValue::Number(value));
        }

        record
    }
}

/// First listed column that is present on the item and carries content
fn source_column<'i>(item: &'i BoardItem, spec: &FieldSpec) -> Option<&'i ColumnValue> {
    spec.columns
        .iter()
        .filter_map(|key| item.column(key))
        .find(|c| has_content(c, spec.kind))
}

fn has_content(column: &ColumnValue, kind: FieldKind) -> bool {
    if column.non_empty_text().is_some() {
        return true;
    }
    match kind {
        // Status and people columns keep an object value (`{"index":5}`) even when unset
        FieldKind::Text => json_text(column).is_some(),
        FieldKind::Number | FieldKind::Date => column.raw_json().is_some(),
    }
}

fn default_value(spec: &FieldSpec) -> FieldValue {
    match (spec.default, spec.kind) {
        (FieldDefault::Null, _) | (FieldDefault::Zero, FieldKind::Date) => FieldValue::Null,
        (FieldDefault::Zero, FieldKind::Number) => FieldValue::Number(0.0),
        (FieldDefault::Zero, FieldKind::Text) => FieldValue::Text(String::new()),
    }
}

fn coerce(item: &BoardItem, spec: &FieldSpec, column: &ColumnValue) -> FieldValue {
    let parsed = match spec.kind {
        FieldKind::Text => column
            .non_empty_text()
            .map(|t| FieldValue::Text(t.to_string()))
            .or_else(|| json_text(column).map(FieldValue::Text)),
        FieldKind::Number => column
            .non_empty_text()
            .and_then(parse_number)
            .or_else(|| column.raw_json().as_ref().and_then(json_number))
            .map(FieldValue::Number),
        FieldKind::Date => column
            .non_empty_text()
            .and_then(parse_date)
            .or_else(|| column.raw_json().as_ref().and_then(json_date))
            .map(FieldValue::Date),
    };

    parsed.unwrap_or_else(|| {
        tracing::warn!(
            item_id = %item.id,
            field = %spec.name,
            column = %column.id,
            text = ?column.text,
            "Unparseable {:?} value, using default",
            spec.kind
        );
        default_value(spec)
    })
}

/// Parses "1,250.50", "$3,000" and plain numbers. Non-finite results are rejected.
pub fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| !matches!(c, '$' | ',') && !c.is_whitespace())
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    if let Ok(date) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return Some(date);
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(text, format) {
            return Some(dt.date());
        }
    }
    DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.date_naive())
}

fn json_number(value: &serde_json::Value) -> Option<f64> {
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => parse_number(s),
        _ => None,
    }
}

fn json_date(value: &serde_json::Value) -> Option<NaiveDate> {
    match value {
        serde_json::Value::Object(map) => map.get("date")?.as_str().and_then(parse_date),
        serde_json::Value::String(s) => parse_date(s),
        _ => None,
    }
}

fn json_text(column: &ColumnValue) -> Option<String> {
    match column.raw_json()? {
        serde_json::Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}
