//! Information functions

use super::arg;
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::value::FormulaValue;
use sheetcalc_core::CellError;

fn is(args: &[FormulaValue], test: impl FnOnce(&FormulaValue) -> bool) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(test(&arg(args, 0).scalar())))
}

/// ISBLANK(value)
pub fn fn_isblank(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Empty))
}

/// ISNUMBER(value)
pub fn fn_isnumber(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Number(_)))
}

/// ISTEXT(value)
pub fn fn_istext(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::String(_)))
}

/// ISLOGICAL(value)
pub fn fn_islogical(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Boolean(_)))
}

/// ISERROR(value)
pub fn fn_iserror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Error(_)))
}

/// ISERR(value) - any error except `#N/A`
pub fn fn_iserr(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| {
        matches!(v, FormulaValue::Error(e) if *e != CellError::Na)
    })
}

/// ISNA(value)
pub fn fn_isna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    is(args, |v| matches!(v, FormulaValue::Error(CellError::Na)))
}

/// NA()
pub fn fn_na(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Error(CellError::Na))
}
