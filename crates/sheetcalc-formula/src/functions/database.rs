//! Database functions
//!
//! A database is a range whose first row holds field names and whose other
//! rows are records. The criteria range has the same layout: its first row
//! names fields, and every further row is one alternative. Records match when
//! any criteria row matches, and a row matches when every non-empty cell in it
//! matches the record's value for that field.

use super::criteria::CriteriaMatcher;
use super::{arg, as_table, cell_result, number, CellResult};
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::FormulaValue;
use sheetcalc_core::CellError;

type Table = Vec<Vec<FormulaValue>>;

fn header_name(value: &FormulaValue) -> String {
    value.as_string().trim().to_lowercase()
}

/// Column of `header` whose name is `name`
fn column_named(header: &[FormulaValue], name: &str) -> Option<usize> {
    let name = name.trim().to_lowercase();
    header.iter().position(|h| header_name(h) == name)
}

/// Column selected by the field argument: a 1-based index or a field name
fn field_column(header: &[FormulaValue], field: &FormulaValue) -> CellResult<Option<usize>> {
    match field {
        FormulaValue::Empty => Ok(None),
        FormulaValue::Error(e) => Err(*e),
        FormulaValue::String(name) => column_named(header, name)
            .map(Some)
            .ok_or(CellError::Value),
        other => {
            let index = number(other)?.trunc();
            if index < 1.0 || index > header.len() as f64 {
                return Err(CellError::Value);
            }
            Ok(Some(index as usize - 1))
        }
    }
}

/// One row of criteria: (database column, matcher) pairs; `None` when the
/// row names a field the database lacks and so can never match
fn criteria_row(
    db_header: &[FormulaValue],
    criteria_header: &[FormulaValue],
    row: &[FormulaValue],
) -> Option<Vec<(usize, CriteriaMatcher)>> {
    row.iter()
        .zip(criteria_header)
        .filter(|(cell, _)| !matches!(cell, FormulaValue::Empty))
        .map(|(cell, name)| {
            column_named(db_header, &name.as_string()).map(|col| (col, CriteriaMatcher::new(cell)))
        })
        .collect()
}

/// Values of the selected field for every record that meets the criteria
fn selected_values(args: &[FormulaValue]) -> CellResult<Vec<FormulaValue>> {
    let database: Table = as_table(arg(args, 0));
    let criteria: Table = as_table(arg(args, 2));

    let Some((db_header, records)) = database.split_first() else {
        return Err(CellError::Value);
    };
    let Some((criteria_header, alternatives)) = criteria.split_first() else {
        return Err(CellError::Value);
    };
    if alternatives.is_empty() {
        return Err(CellError::Value);
    }

    let column = field_column(db_header, arg(args, 1))?;
    let rows: Vec<Option<Vec<(usize, CriteriaMatcher)>>> = alternatives
        .iter()
        .map(|row| criteria_row(db_header, criteria_header, row))
        .collect();

    let is_selected = |record: &[FormulaValue]| {
        rows.iter().flatten().any(|conditions| {
            conditions.iter().all(|(col, matcher)| {
                record
                    .get(*col)
                    .map_or(false, |value| matcher.matches(value))
            })
        })
    };

    Ok(records
        .iter()
        .filter(|record| is_selected(record))
        .map(|record| match column {
            Some(col) => record.get(col).cloned().unwrap_or(FormulaValue::Empty),
            None => FormulaValue::Number(0.0),
        })
        .collect())
}

fn selected_numbers(args: &[FormulaValue]) -> CellResult<Vec<f64>> {
    let mut numbers = Vec::new();
    for value in selected_values(args)? {
        match value {
            FormulaValue::Number(n) => numbers.push(n),
            FormulaValue::Error(e) => return Err(e),
            _ => {}
        }
    }
    Ok(numbers)
}

/// DSUM(database, field, criteria)
pub fn fn_dsum(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(FormulaValue::Number(selected_numbers(args)?.iter().sum())))
}

/// DCOUNT(database, field, criteria) - counts numeric field values
pub fn fn_dcount(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let count = selected_values(args)?
            .iter()
            .filter(|v| matches!(v, FormulaValue::Number(_)))
            .count();
        Ok(FormulaValue::Number(count as f64))
    })
}

/// DCOUNTA(database, field, criteria) - counts non-empty field values
pub fn fn_dcounta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let count = selected_values(args)?
            .iter()
            .filter(|v| !matches!(v, FormulaValue::Empty))
            .count();
        Ok(FormulaValue::Number(count as f64))
    })
}

/// DAVERAGE(database, field, criteria)
pub fn fn_daverage(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let numbers = selected_numbers(args)?;
        if numbers.is_empty() {
            return Err(CellError::Div0);
        }
        Ok(FormulaValue::Number(
            numbers.iter().sum::<f64>() / numbers.len() as f64,
        ))
    })
}

/// DMAX(database, field, criteria)
pub fn fn_dmax(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let max = selected_numbers(args)?.into_iter().reduce(f64::max);
        Ok(FormulaValue::Number(max.unwrap_or(0.0)))
    })
}

/// DMIN(database, field, criteria)
pub fn fn_dmin(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let min = selected_numbers(args)?.into_iter().reduce(f64::min);
        Ok(FormulaValue::Number(min.unwrap_or(0.0)))
    })
}

/// DGET(database, field, criteria) - the single matching value
///
/// No match is `#VALUE!`, more than one is `#NUM!`.
pub fn fn_dget(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let mut values = selected_values(args)?.into_iter();
        match (values.next(), values.next()) {
            (Some(value), None) => Ok(value),
            (None, _) => Err(CellError::Value),
            (Some(_), Some(_)) => Err(CellError::Num),
        }
    })
}
