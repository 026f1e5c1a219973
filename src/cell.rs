use serde::{Deserialize, Serialize};
use std::fmt;

/// A single spreadsheet cell or attribute field value.
///
/// Spreadsheet cells arrive as a mix of numbers and strings; keeping the tag
/// explicit means nothing downstream has to guess which one it got.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Bool(bool),
    Empty,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            CellValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, CellValue::Empty)
    }

    pub fn to_json(&self) -> serde_json::Value {
        match self {
            CellValue::Number(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            CellValue::Text(s) => serde_json::Value::String(s.clone()),
            CellValue::Bool(b) => serde_json::Value::Bool(*b),
            CellValue::Empty => serde_json::Value::Null,
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Text(s) => write!(f, "{}", s),
            CellValue::Bool(b) => write!(f, "{}", b),
            CellValue::Empty => Ok(()),
        }
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Bool(value)
    }
}

impl From<Option<f64>> for CellValue {
    fn from(value: Option<f64>) -> Self {
        value.map(CellValue::Number).unwrap_or(CellValue::Empty)
    }
}

/// Returns true when a coordinate field carries no usable data.
///
/// Missing cells, `Empty`, blank strings and zero (numeric or spelled as text)
/// all count as absent. A pair with an absent component is never projected, so
/// an unfilled row cannot turn into a point at (0°, 0°).
pub fn is_absent(value: Option<&CellValue>) -> bool {
    match value {
        None | Some(CellValue::Empty) => true,
        Some(CellValue::Number(n)) => *n == 0.0,
        Some(CellValue::Text(s)) => {
            let trimmed = s.trim();
            trimmed.is_empty() || trimmed.parse::<f64>().map(|n| n == 0.0).unwrap_or(false)
        }
        Some(CellValue::Bool(_)) => false,
    }
}
