//! Criteria matching for SUMIF, COUNTIF, AVERAGEIF and related functions
//!
//! Criteria can be:
//! - A number: matches equal numbers and numeric text (e.g., 5)
//! - A text string: case-insensitive match (e.g., "apple")
//! - A comparison expression: ">5", ">=10", "<100", "<=50", "<>0", "=5", ">b"
//! - Wildcards: "*" matches any characters, "?" matches one, "~" escapes
//! - Empty string: matches empty cells
//! - An error value: matches cells holding the same error

use super::text::wildcard_regex;
use super::{arg, as_table, cell_result, CellResult};
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::{compare_values, FormulaValue};
use regex::Regex;
use sheetcalc_core::CellError;
use std::cmp::Ordering;

/// Criteria matcher for SUMIF/COUNTIF/AVERAGEIF, their multi-criteria forms
/// and the database functions
#[derive(Debug)]
pub struct CriteriaMatcher {
    criteria_type: CriteriaType,
}

#[derive(Debug)]
enum CriteriaType {
    /// Exact number match
    Number(f64),
    /// Comparison against a number, text or boolean operand
    Comparison(ComparisonOp, FormulaValue),
    /// Text match (case-insensitive)
    Text(String),
    /// Text match with wildcards, optionally inverted by `<>`
    Pattern { regex: Regex, negate: bool },
    /// Match empty values
    Empty,
    /// Match a specific error
    Error(CellError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ComparisonOp {
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

impl ComparisonOp {
    fn holds(self, ordering: Ordering) -> bool {
        match self {
            ComparisonOp::Equal => ordering == Ordering::Equal,
            ComparisonOp::NotEqual => ordering != Ordering::Equal,
            ComparisonOp::LessThan => ordering == Ordering::Less,
            ComparisonOp::LessEqual => ordering != Ordering::Greater,
            ComparisonOp::GreaterThan => ordering == Ordering::Greater,
            ComparisonOp::GreaterEqual => ordering != Ordering::Less,
        }
    }
}

/// Whether two values are of a kind a criterion can order
fn same_kind(a: &FormulaValue, b: &FormulaValue) -> bool {
    matches!(
        (a, b),
        (FormulaValue::Number(_), FormulaValue::Number(_))
            | (FormulaValue::String(_), FormulaValue::String(_))
            | (FormulaValue::Boolean(_), FormulaValue::Boolean(_))
    )
}

impl CriteriaMatcher {
    /// Create a new criteria matcher from a FormulaValue
    pub fn new(criteria: &FormulaValue) -> Self {
        let criteria_type = match criteria.scalar() {
            FormulaValue::Number(n) => CriteriaType::Number(n),
            FormulaValue::Boolean(b) => {
                CriteriaType::Comparison(ComparisonOp::Equal, FormulaValue::Boolean(b))
            }
            FormulaValue::String(s) => Self::parse_string_criteria(&s),
            FormulaValue::Error(e) => CriteriaType::Error(e),
            FormulaValue::Empty | FormulaValue::Array(_) => CriteriaType::Empty,
        };

        Self { criteria_type }
    }

    fn parse_string_criteria(s: &str) -> CriteriaType {
        let trimmed = s.trim_start();
        // Longer operators first
        let (op, rest) = if let Some(rest) = trimmed.strip_prefix(">=") {
            (ComparisonOp::GreaterEqual, rest)
        } else if let Some(rest) = trimmed.strip_prefix("<=") {
            (ComparisonOp::LessEqual, rest)
        } else if let Some(rest) = trimmed.strip_prefix("<>") {
            (ComparisonOp::NotEqual, rest)
        } else if let Some(rest) = trimmed.strip_prefix('>') {
            (ComparisonOp::GreaterThan, rest)
        } else if let Some(rest) = trimmed.strip_prefix('<') {
            (ComparisonOp::LessThan, rest)
        } else if let Some(rest) = trimmed.strip_prefix('=') {
            (ComparisonOp::Equal, rest)
        } else {
            return Self::parse_operand(s.trim());
        };

        let rest = rest.trim();
        match (op, Self::parse_operand(rest)) {
            (ComparisonOp::Equal, operand) => operand,
            (op, CriteriaType::Number(n)) => CriteriaType::Comparison(op, FormulaValue::Number(n)),
            (op, CriteriaType::Comparison(_, operand)) => CriteriaType::Comparison(op, operand),
            (op, CriteriaType::Empty) => CriteriaType::Comparison(op, FormulaValue::Empty),
            (ComparisonOp::NotEqual, CriteriaType::Pattern { regex, .. }) => {
                CriteriaType::Pattern {
                    regex,
                    negate: true,
                }
            }
            (ComparisonOp::NotEqual, CriteriaType::Error(e)) => {
                CriteriaType::Comparison(ComparisonOp::NotEqual, FormulaValue::Error(e))
            }
            (op, _) => CriteriaType::Comparison(op, FormulaValue::String(rest.to_string())),
        }
    }

    /// Criteria with no operator
    fn parse_operand(s: &str) -> CriteriaType {
        if s.is_empty() {
            return CriteriaType::Empty;
        }
        if let Ok(n) = s.parse::<f64>() {
            if n.is_finite() {
                return CriteriaType::Number(n);
            }
        }
        if let Some(e) = CellError::from_str(s) {
            return CriteriaType::Error(e);
        }
        if s.eq_ignore_ascii_case("TRUE") || s.eq_ignore_ascii_case("FALSE") {
            let b = s.eq_ignore_ascii_case("TRUE");
            return CriteriaType::Comparison(ComparisonOp::Equal, FormulaValue::Boolean(b));
        }
        if s.contains(['*', '?', '~']) {
            if let Ok(regex) = wildcard_regex(s, true) {
                return CriteriaType::Pattern {
                    regex,
                    negate: false,
                };
            }
        }
        CriteriaType::Text(s.to_lowercase())
    }

    /// Check if a value matches the criteria
    pub fn matches(&self, value: &FormulaValue) -> bool {
        match &self.criteria_type {
            CriteriaType::Number(criteria_num) => match value {
                FormulaValue::Number(n) => (n - criteria_num).abs() < 1e-10,
                FormulaValue::String(_) => value
                    .as_number()
                    .map_or(false, |n| (n - criteria_num).abs() < 1e-10),
                _ => false,
            },

            CriteriaType::Comparison(op, operand) => {
                if let FormulaValue::Error(e) = operand {
                    // Only `<>#ERR!` builds this
                    return value.get_error() != Some(*e);
                }
                if matches!(operand, FormulaValue::Empty) {
                    let empty = matches!(value, FormulaValue::Empty);
                    return match op {
                        ComparisonOp::NotEqual => !empty,
                        ComparisonOp::Equal => empty,
                        _ => false,
                    };
                }
                if same_kind(value, operand) {
                    op.holds(compare_values(value, operand))
                } else {
                    *op == ComparisonOp::NotEqual
                }
            }

            CriteriaType::Text(text) => {
                matches!(value, FormulaValue::String(s) if s.to_lowercase() == *text)
            }

            CriteriaType::Pattern { regex, negate } => {
                let hit = matches!(value, FormulaValue::String(s) if regex.is_match(s));
                hit != *negate
            }

            CriteriaType::Empty => {
                matches!(value, FormulaValue::Empty)
                    || matches!(value, FormulaValue::String(s) if s.is_empty())
            }

            CriteriaType::Error(e) => value.get_error() == Some(*e),
        }
    }
}

/// Every (row, col) of `range` whose value satisfies all criteria pairs
///
/// Each pair is a criteria range (same shape as `range`) and a criterion.
fn matching_cells(
    shape: &[Vec<FormulaValue>],
    pairs: &[(Vec<Vec<FormulaValue>>, CriteriaMatcher)],
) -> CellResult<Vec<(usize, usize)>> {
    let rows = shape.len();
    let cols = shape.first().map_or(0, Vec::len);
    for (range, _) in pairs {
        if range.len() != rows || range.first().map_or(0, Vec::len) != cols {
            return Err(CellError::Value);
        }
    }

    let mut cells = Vec::new();
    for r in 0..rows {
        for c in 0..cols {
            let all = pairs.iter().all(|(range, matcher)| {
                range
                    .get(r)
                    .and_then(|row| row.get(c))
                    .map_or(false, |v| matcher.matches(v))
            });
            if all {
                cells.push((r, c));
            }
        }
    }
    Ok(cells)
}

/// Criteria pairs starting at `args[start]`
fn criteria_pairs(
    args: &[FormulaValue],
    start: usize,
) -> CellResult<Vec<(Vec<Vec<FormulaValue>>, CriteriaMatcher)>> {
    let rest = args.get(start..).unwrap_or_default();
    if rest.is_empty() || rest.len() % 2 != 0 {
        return Err(CellError::Value);
    }
    Ok(rest
        .chunks(2)
        .map(|pair| (as_table(&pair[0]), CriteriaMatcher::new(&pair[1])))
        .collect())
}

/// Numbers in `values` at the given cells
fn numbers_at(values: &[Vec<FormulaValue>], cells: &[(usize, usize)]) -> CellResult<Vec<f64>> {
    let mut numbers = Vec::new();
    for &(r, c) in cells {
        match values.get(r).and_then(|row| row.get(c)) {
            Some(FormulaValue::Number(n)) => numbers.push(*n),
            Some(FormulaValue::Error(e)) => return Err(*e),
            _ => {}
        }
    }
    Ok(numbers)
}

/// COUNTIF(range, criteria)
pub fn fn_countif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let matcher = CriteriaMatcher::new(arg(args, 1));
        let count = arg(args, 0).flatten().filter(|v| matcher.matches(v)).count();
        Ok(FormulaValue::Number(count as f64))
    })
}

/// Numbers selected by a single criterion over `args[0]`, read from the
/// optional value range `args[2]`
fn single_criteria_numbers(args: &[FormulaValue]) -> CellResult<Vec<f64>> {
    let range = as_table(arg(args, 0));
    let pairs = vec![(range.clone(), CriteriaMatcher::new(arg(args, 1)))];
    let cells = matching_cells(&range, &pairs)?;
    match args.get(2) {
        // The value range is read from its top-left with the criteria range's shape
        Some(values) => numbers_at(&as_table(values), &cells),
        None => numbers_at(&range, &cells),
    }
}

/// SUMIF(range, criteria, [sum_range])
pub fn fn_sumif(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        Ok(FormulaValue::Number(
            single_criteria_numbers(args)?.iter().sum(),
        ))
    })
}

/// AVERAGEIF(range, criteria, [average_range])
pub fn fn_averageif(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let numbers = single_criteria_numbers(args)?;
        if numbers.is_empty() {
            return Err(CellError::Div0);
        }
        Ok(FormulaValue::Number(
            numbers.iter().sum::<f64>() / numbers.len() as f64,
        ))
    })
}

/// COUNTIFS(criteria_range1, criteria1, [criteria_range2, criteria2], ...)
pub fn fn_countifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let pairs = criteria_pairs(args, 0)?;
        let shape = pairs[0].0.clone();
        let cells = matching_cells(&shape, &pairs)?;
        Ok(FormulaValue::Number(cells.len() as f64))
    })
}

/// SUMIFS(sum_range, criteria_range1, criteria1, [criteria_range2, criteria2], ...)
///
/// All ranges must have the same dimensions.
pub fn fn_sumifs(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let sum_range = as_table(arg(args, 0));
        let pairs = criteria_pairs(args, 1)?;
        let cells = matching_cells(&sum_range, &pairs)?;
        Ok(FormulaValue::Number(
            numbers_at(&sum_range, &cells)?.iter().sum(),
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::functions::test_support::{eval_in, num};
    use pretty_assertions::assert_eq;
    use sheetcalc_core::Workbook;

    fn matcher(criteria: &str) -> CriteriaMatcher {
        CriteriaMatcher::new(&FormulaValue::String(criteria.into()))
    }

    fn s(text: &str) -> FormulaValue {
        FormulaValue::String(text.into())
    }

    #[test]
    fn test_numeric_criteria() {
        let m = CriteriaMatcher::new(&num(5.0));
        assert!(m.matches(&num(5.0)));
        assert!(m.matches(&s("5")));
        assert!(!m.matches(&num(4.0)));

        assert!(matcher(">5").matches(&num(6.0)));
        assert!(!matcher(">5").matches(&s("6x")));
        assert!(matcher("<=5").matches(&num(5.0)));
        assert!(matcher("<>0").matches(&s("text")));
        assert!(matcher("<>0").matches(&FormulaValue::Empty));
        assert!(!matcher("<>0").matches(&num(0.0)));
        assert!(matcher("=5").matches(&num(5.0)));
    }

    #[test]
    fn test_text_criteria() {
        assert!(matcher("apple").matches(&s("APPLE")));
        assert!(!matcher("apple").matches(&s("apples")));
        assert!(matcher("ap*").matches(&s("Apricot")));
        assert!(!matcher("ap*").matches(&num(1.0)));
        assert!(matcher("?at").matches(&s("cat")));
        assert!(!matcher("?at").matches(&s("chat")));
        assert!(matcher("~*").matches(&s("*")));
        assert!(!matcher("~*").matches(&s("a")));
        assert!(matcher("<>a*").matches(&s("banana")));
        assert!(!matcher("<>a*").matches(&s("apple")));
        assert!(matcher(">b").matches(&s("Cherry")));
        assert!(!matcher(">b").matches(&num(100.0)));
    }

    #[test]
    fn test_empty_and_error_criteria() {
        assert!(matcher("").matches(&FormulaValue::Empty));
        assert!(matcher("").matches(&s("")));
        assert!(matcher("<>").matches(&num(0.0)));
        assert!(!matcher("<>").matches(&FormulaValue::Empty));
        assert!(matcher("#N/A").matches(&FormulaValue::Error(CellError::Na)));
        assert!(CriteriaMatcher::new(&FormulaValue::Boolean(true)).matches(&FormulaValue::Boolean(true)));
        assert!(!CriteriaMatcher::new(&FormulaValue::Boolean(true)).matches(&num(1.0)));
    }

    fn workbook() -> Workbook {
        let mut wb = Workbook::new();
        let ws = wb.worksheet_mut(0).unwrap();
        for (row, (fruit, qty, price)) in [
            ("apple", 10.0, 1.0),
            ("banana", 5.0, 2.0),
            ("apple", 7.0, 3.0),
            ("cherry", 2.0, 4.0),
        ]
        .into_iter()
        .enumerate()
        {
            let r = row as u32;
            ws.set_cell_value_at(r, 0, fruit).unwrap();
            ws.set_cell_value_at(r, 1, qty).unwrap();
            ws.set_cell_value_at(r, 2, price).unwrap();
        }
        wb
    }

    #[test]
    fn test_if_functions() {
        let wb = workbook();
        assert_eq!(eval_in(&wb, "=COUNTIF(A1:A4,\"apple\")").unwrap(), num(2.0));
        assert_eq!(eval_in(&wb, "=COUNTIF(B1:B4,\">4\")").unwrap(), num(3.0));
        assert_eq!(eval_in(&wb, "=SUMIF(A1:A4,\"apple\",B1:B4)").unwrap(), num(17.0));
        assert_eq!(eval_in(&wb, "=SUMIF(B1:B4,\">=5\")").unwrap(), num(22.0));
        assert_eq!(eval_in(&wb, "=AVERAGEIF(A1:A4,\"apple\",C1:C4)").unwrap(), num(2.0));
        assert_eq!(
            eval_in(&wb, "=AVERAGEIF(A1:A4,\"kiwi\",C1:C4)").unwrap(),
            FormulaValue::Error(CellError::Div0)
        );
    }

    #[test]
    fn test_multi_criteria_functions() {
        let wb = workbook();
        assert_eq!(
            eval_in(&wb, "=COUNTIFS(A1:A4,\"apple\",B1:B4,\">8\")").unwrap(),
            num(1.0)
        );
        assert_eq!(
            eval_in(&wb, "=SUMIFS(C1:C4,A1:A4,\"<>banana\",B1:B4,\"<10\")").unwrap(),
            num(7.0)
        );
        assert_eq!(
            eval_in(&wb, "=SUMIFS(C1:C4,A1:A3,\"apple\")").unwrap(),
            FormulaValue::Error(CellError::Value)
        );
        assert_eq!(
            eval_in(&wb, "=COUNTIFS(A1:A4,\"apple\",B1:B4)").unwrap(),
            FormulaValue::Error(CellError::Value)
        );
    }
}
