//! Statistical functions

use super::{arg, cell_result, collect_numbers, number, CellResult};
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::FormulaValue;
use sheetcalc_core::CellError;

/// AVERAGE(number1, [number2], ...)
pub fn fn_average(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let numbers = collect_numbers(args)?;
        if numbers.is_empty() {
            return Err(CellError::Div0);
        }
        Ok(FormulaValue::Number(
            numbers.iter().sum::<f64>() / numbers.len() as f64,
        ))
    })
}

/// MIN(number1, [number2], ...) - 0 when there are no numbers
pub fn fn_min(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let min = collect_numbers(args)?.into_iter().reduce(f64::min);
        Ok(FormulaValue::Number(min.unwrap_or(0.0)))
    })
}

/// MAX(number1, [number2], ...) - 0 when there are no numbers
pub fn fn_max(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let max = collect_numbers(args)?.into_iter().reduce(f64::max);
        Ok(FormulaValue::Number(max.unwrap_or(0.0)))
    })
}

/// COUNT(value1, [value2], ...)
///
/// Counts numbers. Direct arguments also count when they are booleans or
/// numeric text; errors are skipped rather than propagated.
pub fn fn_count(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let mut count = 0usize;
    for value in args {
        match value {
            FormulaValue::Array(_) => {
                count += value
                    .flatten()
                    .filter(|v| matches!(v, FormulaValue::Number(_)))
                    .count();
            }
            FormulaValue::Number(_) | FormulaValue::Boolean(_) => count += 1,
            FormulaValue::String(_) if value.as_number().is_some() => count += 1,
            _ => {}
        }
    }
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTA(value1, [value2], ...) - counts non-empty values, errors included
pub fn fn_counta(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    let count = args
        .iter()
        .flat_map(FormulaValue::flatten)
        .filter(|v| !matches!(v, FormulaValue::Empty))
        .count();
    Ok(FormulaValue::Number(count as f64))
}

/// COUNTBLANK(range) - empty cells and empty text
pub fn fn_countblank(
    args: &[FormulaValue],
    _ctx: &EvaluationContext,
) -> FormulaResult<FormulaValue> {
    let count = arg(args, 0)
        .flatten()
        .filter(|v| match v {
            FormulaValue::Empty => true,
            FormulaValue::String(s) => s.is_empty(),
            _ => false,
        })
        .count();
    Ok(FormulaValue::Number(count as f64))
}

fn sorted_numbers(args: &[FormulaValue]) -> CellResult<Vec<f64>> {
    let mut numbers = collect_numbers(args)?;
    numbers.sort_by(f64::total_cmp);
    Ok(numbers)
}

/// MEDIAN(number1, [number2], ...)
pub fn fn_median(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let numbers = sorted_numbers(args)?;
        let mid = numbers.len() / 2;
        let median = match numbers.len() {
            0 => return Err(CellError::Num),
            n if n % 2 == 1 => numbers[mid],
            _ => (numbers[mid - 1] + numbers[mid]) / 2.0,
        };
        Ok(FormulaValue::Number(median))
    })
}

/// k-th value (1-based) of the numbers in the first argument, smallest first
fn kth(args: &[FormulaValue], largest: bool) -> CellResult<FormulaValue> {
    let numbers = sorted_numbers(&args[..1.min(args.len())])?;
    let k = number(arg(args, 1))?.ceil();
    if k < 1.0 || k > numbers.len() as f64 {
        return Err(CellError::Num);
    }
    let k = k as usize;
    let index = if largest { numbers.len() - k } else { k - 1 };
    Ok(FormulaValue::Number(numbers[index]))
}

/// LARGE(array, k)
pub fn fn_large(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| kth(args, true))
}

/// SMALL(array, k)
pub fn fn_small(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| kth(args, false))
}
