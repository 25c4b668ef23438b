// Board domain model - items as returned by the Monday.com API
use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct BoardId(pub u64);

impl fmt::Display for BoardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnValue {
    pub id: String,
    pub title: String,
    pub kind: Option<String>,
    pub text: Option<String>,
    /// Raw JSON as sent by the API (itself a JSON-encoded string)
    pub value: Option<String>,
}

impl ColumnValue {
    #[cfg(test)]
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: Option<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: None,
            text,
            value: None,
        }
    }

    /// True if either the column id or its title equals `key`
    pub fn matches(&self, key: &str) -> bool {
        self.id == key || self.title == key
    }

    /// The display text, if it has any non-whitespace content
    pub fn non_empty_text(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|t| !t.is_empty())
    }

    /// The raw value decoded into JSON. Monday sends `"null"` or nothing for unset columns.
    pub fn raw_json(&self) -> Option<serde_json::Value> {
        let raw = self.value.as_deref()?;
        match serde_json::from_str::<serde_json::Value>(raw) {
            Ok(serde_json::Value::Null) => None,
            Ok(v) => Some(v),
            Err(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BoardItem {
    pub id: String,
    pub name: String,
    pub column_values: Vec<ColumnValue>,
}

impl BoardItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, column_values: Vec<ColumnValue>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            column_values,
        }
    }

    pub fn column(&self, key: &str) -> Option<&ColumnValue> {
        self.column_values.iter().find(|c| c.matches(key))
    }
}
