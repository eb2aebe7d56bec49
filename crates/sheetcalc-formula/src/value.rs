//! Runtime values produced while evaluating formulas

use sheetcalc_core::{CellError, CellValue};
use std::cmp::Ordering;

/// Value types during formula evaluation
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaValue {
    Number(f64),
    String(String),
    Boolean(bool),
    Error(CellError),
    /// Rows of columns; ranges evaluate to arrays
    Array(Vec<Vec<FormulaValue>>),
    Empty,
}

impl FormulaValue {
    /// Convert to number, if possible
    pub fn as_number(&self) -> Option<f64> {
        match self {
            FormulaValue::Number(n) => Some(*n),
            FormulaValue::Boolean(true) => Some(1.0),
            FormulaValue::Boolean(false) => Some(0.0),
            FormulaValue::String(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
            FormulaValue::Empty => Some(0.0),
            _ => None,
        }
    }

    /// Convert to boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FormulaValue::Boolean(b) => Some(*b),
            FormulaValue::Number(n) => Some(*n != 0.0),
            FormulaValue::Empty => Some(false),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("TRUE") => Some(true),
            FormulaValue::String(s) if s.eq_ignore_ascii_case("FALSE") => Some(false),
            _ => None,
        }
    }

    /// Convert to string
    pub fn as_string(&self) -> String {
        match self {
            FormulaValue::Number(n) => format_number(*n),
            FormulaValue::String(s) => s.clone(),
            FormulaValue::Boolean(true) => "TRUE".to_string(),
            FormulaValue::Boolean(false) => "FALSE".to_string(),
            FormulaValue::Error(e) => e.to_string(),
            FormulaValue::Empty => String::new(),
            FormulaValue::Array(_) => CellError::Value.to_string(),
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, FormulaValue::Error(_))
    }

    /// Get the error if this is one
    pub fn get_error(&self) -> Option<CellError> {
        match self {
            FormulaValue::Error(e) => Some(*e),
            _ => None,
        }
    }

    /// Top-left element of an array, or the value itself
    pub fn scalar(&self) -> FormulaValue {
        match self {
            FormulaValue::Array(rows) => rows
                .first()
                .and_then(|row| row.first())
                .map(FormulaValue::scalar)
                .unwrap_or(FormulaValue::Error(CellError::Value)),
            other => other.clone(),
        }
    }

    /// Iterate over every scalar value, descending into arrays row-major
    pub fn flatten(&self) -> Box<dyn Iterator<Item = &FormulaValue> + '_> {
        match self {
            FormulaValue::Array(rows) => Box::new(rows.iter().flatten().flat_map(|v| v.flatten())),
            other => Box::new(std::iter::once(other)),
        }
    }

    /// Array dimensions (rows, cols); scalars are 1x1
    pub fn dimensions(&self) -> (usize, usize) {
        match self {
            FormulaValue::Array(rows) => (rows.len(), rows.first().map_or(0, Vec::len)),
            _ => (1, 1),
        }
    }
}

/// Render a number the way a cell displays it in general format
pub fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{n}")
    }
}

impl From<CellValue> for FormulaValue {
    fn from(value: CellValue) -> Self {
        match value {
            CellValue::Empty => FormulaValue::Empty,
            CellValue::Number(n) => FormulaValue::Number(n),
            CellValue::String(s) => FormulaValue::String(s),
            CellValue::Boolean(b) => FormulaValue::Boolean(b),
            CellValue::Error(e) => FormulaValue::Error(e),
            CellValue::Formula { cached_value, .. } => cached_value
                .map(|v| (*v).into())
                .unwrap_or(FormulaValue::Empty),
        }
    }
}

impl From<FormulaValue> for CellValue {
    /// Arrays store their top-left element
    fn from(value: FormulaValue) -> Self {
        match value {
            FormulaValue::Empty => CellValue::Empty,
            FormulaValue::Number(n) if !n.is_finite() => CellValue::Error(CellError::Num),
            FormulaValue::Number(n) => CellValue::Number(n),
            FormulaValue::String(s) => CellValue::String(s),
            FormulaValue::Boolean(b) => CellValue::Boolean(b),
            FormulaValue::Error(e) => CellValue::Error(e),
            array @ FormulaValue::Array(_) => array.scalar().into(),
        }
    }
}

impl From<f64> for FormulaValue {
    fn from(n: f64) -> Self {
        FormulaValue::Number(n)
    }
}

impl From<bool> for FormulaValue {
    fn from(b: bool) -> Self {
        FormulaValue::Boolean(b)
    }
}

impl From<&str> for FormulaValue {
    fn from(s: &str) -> Self {
        FormulaValue::String(s.to_string())
    }
}

impl From<String> for FormulaValue {
    fn from(s: String) -> Self {
        FormulaValue::String(s)
    }
}

impl From<CellError> for FormulaValue {
    fn from(e: CellError) -> Self {
        FormulaValue::Error(e)
    }
}

/// Compare two values the way comparison operators do
///
/// Empty compares as 0 against numbers and as "" against strings. Strings
/// compare case-insensitively. Across types numbers sort before strings,
/// which sort before booleans.
pub fn compare_values(left: &FormulaValue, right: &FormulaValue) -> Ordering {
    use FormulaValue as V;

    fn rank(v: &FormulaValue) -> u8 {
        match v {
            V::Number(_) | V::Empty => 0,
            V::String(_) => 1,
            V::Boolean(_) => 2,
            V::Error(_) => 3,
            V::Array(_) => 4,
        }
    }

    match (left, right) {
        (V::Empty, V::Empty) => Ordering::Equal,
        (V::Empty, V::String(s)) => "".cmp(s.as_str()),
        (V::String(s), V::Empty) => s.as_str().cmp(""),
        (V::Empty, V::Boolean(b)) => false.cmp(b),
        (V::Boolean(b), V::Empty) => b.cmp(&false),
        (V::Number(_) | V::Empty, V::Number(_) | V::Empty) => {
            let l = left.as_number().unwrap_or(0.0);
            let r = right.as_number().unwrap_or(0.0);
            l.partial_cmp(&r).unwrap_or(Ordering::Equal)
        }
        (V::String(l), V::String(r)) => l.to_lowercase().cmp(&r.to_lowercase()),
        (V::Boolean(l), V::Boolean(r)) => l.cmp(r),
        (V::Error(l), V::Error(r)) => l.type_code().cmp(&r.type_code()),
        _ => rank(left).cmp(&rank(right)),
    }
}

/// Case-insensitive equality used by lookups and criteria
pub fn values_equal(left: &FormulaValue, right: &FormulaValue) -> bool {
    compare_values(left, right) == Ordering::Equal
}
