//! Logical functions
//!
//! IF, IFERROR, IFNA, AND, OR and CHOOSE are registered with evaluators that
//! only evaluate the arguments they need. The eager bodies below are what a
//! caller gets when invoking the registered function directly on values.

use super::{arg, boolean, cell_result, number, CellResult};
use crate::compiler::{CallEvaluator, CompiledExpr, FunctionCompiler, WithEvaluator};
use crate::context::EvaluationContext;
use crate::error::FormulaResult;
use crate::repository::RegisteredFunction;
use crate::value::FormulaValue;
use sheetcalc_core::CellError;
use std::sync::Arc;

/// IF(condition, value_if_true, [value_if_false])
pub fn fn_if(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        if boolean(arg(args, 0))? {
            Ok(arg(args, 1).clone())
        } else {
            Ok(args.get(2).cloned().unwrap_or(FormulaValue::Boolean(false)))
        }
    })
}

/// IFERROR(value, value_if_error)
pub fn fn_iferror(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match arg(args, 0) {
        FormulaValue::Error(_) => arg(args, 1).clone(),
        value => value.clone(),
    })
}

/// IFNA(value, value_if_na)
pub fn fn_ifna(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match arg(args, 0) {
        FormulaValue::Error(CellError::Na) => arg(args, 1).clone(),
        value => value.clone(),
    })
}

/// Logical values an argument contributes to AND, OR and XOR
///
/// Direct arguments are coerced; inside arrays only booleans and numbers
/// count. Empty cells never count.
fn logical_values(value: &FormulaValue) -> CellResult<Vec<bool>> {
    match value {
        FormulaValue::Array(_) => value
            .flatten()
            .filter_map(|v| match v {
                FormulaValue::Boolean(b) => Some(Ok(*b)),
                FormulaValue::Number(n) => Some(Ok(*n != 0.0)),
                FormulaValue::Error(e) => Some(Err(*e)),
                _ => None,
            })
            .collect(),
        FormulaValue::Empty => Ok(Vec::new()),
        other => Ok(vec![boolean(other)?]),
    }
}

/// Fold logical values, stopping at the first one equal to `stop_on`
fn fold_logical(
    args: impl IntoIterator<Item = CellResult<FormulaValue>>,
    stop_on: bool,
) -> CellResult<FormulaValue> {
    let mut seen = false;
    for value in args {
        for b in logical_values(&value?)? {
            if b == stop_on {
                return Ok(FormulaValue::Boolean(stop_on));
            }
            seen = true;
        }
    }
    if !seen {
        return Err(CellError::Value);
    }
    Ok(FormulaValue::Boolean(!stop_on))
}

/// AND(logical1, [logical2], ...)
pub fn fn_and(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| fold_logical(args.iter().cloned().map(Ok), false))
}

/// OR(logical1, [logical2], ...)
pub fn fn_or(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| fold_logical(args.iter().cloned().map(Ok), true))
}

/// XOR(logical1, [logical2], ...) - TRUE when an odd number of values are TRUE
pub fn fn_xor(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let mut seen = false;
        let mut odd = false;
        for value in args {
            for b in logical_values(value)? {
                seen = true;
                odd ^= b;
            }
        }
        if !seen {
            return Err(CellError::Value);
        }
        Ok(FormulaValue::Boolean(odd))
    })
}

/// NOT(logical)
pub fn fn_not(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| Ok(FormulaValue::Boolean(!boolean(arg(args, 0))?)))
}

/// TRUE()
pub fn fn_true(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(true))
}

/// FALSE()
pub fn fn_false(_args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(FormulaValue::Boolean(false))
}

/// 1-based CHOOSE index among `choices` options
fn choose_index(index: &FormulaValue, choices: usize) -> CellResult<usize> {
    let n = number(index)?.trunc();
    if n < 1.0 || n > choices as f64 {
        return Err(CellError::Value);
    }
    Ok(n as usize)
}

/// CHOOSE(index, value1, [value2], ...)
pub fn fn_choose(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    cell_result(|| {
        let index = choose_index(arg(args, 0), args.len().saturating_sub(1))?;
        Ok(arg(args, index).clone())
    })
}

// === Lazy evaluation ===

/// Compiler attaching a lazy evaluator
pub fn lazy<E: CallEvaluator + 'static>(evaluator: E) -> WithEvaluator {
    WithEvaluator::new(evaluator)
}

/// IF compiler
///
/// A literal condition selects its branch at compile time, so the untaken
/// branch contributes no dependencies. Anything else evaluates lazily.
#[derive(Debug, Default, Clone, Copy)]
pub struct IfCompiler;

impl FunctionCompiler for IfCompiler {
    fn compile(
        &self,
        function: &Arc<RegisteredFunction>,
        args: Vec<CompiledExpr>,
    ) -> FormulaResult<CompiledExpr> {
        let constant = args.first().and_then(CompiledExpr::as_constant).map(boolean);

        match constant {
            Some(Ok(condition)) => {
                let branch = if condition { 1 } else { 2 };
                Ok(args
                    .into_iter()
                    .nth(branch)
                    .unwrap_or(CompiledExpr::Value(FormulaValue::Boolean(false))))
            }
            Some(Err(e)) => Ok(CompiledExpr::Value(FormulaValue::Error(e))),
            None => Ok(CompiledExpr::call(function.clone(), args, Arc::new(IfCall))),
        }
    }
}

/// Evaluates the condition, then only the selected branch
#[derive(Debug, Default, Clone, Copy)]
pub struct IfCall;

impl CallEvaluator for IfCall {
    fn evaluate(
        &self,
        _function: &RegisteredFunction,
        args: &[CompiledExpr],
        ctx: &EvaluationContext<'_>,
    ) -> FormulaResult<FormulaValue> {
        let condition = match args.first() {
            Some(expr) => expr.evaluate(ctx)?,
            None => FormulaValue::Empty,
        };
        let branch = match boolean(&condition) {
            Ok(true) => 1,
            Ok(false) => 2,
            Err(e) => return Ok(FormulaValue::Error(e)),
        };
        match args.get(branch) {
            Some(expr) => expr.evaluate(ctx),
            None => Ok(FormulaValue::Boolean(false)),
        }
    }
}

/// IFERROR and IFNA: the fallback is evaluated only when needed
#[derive(Debug, Clone, Copy)]
pub struct IfErrorCall {
    /// Only `#N/A` triggers the fallback
    pub only_na: bool,
}

impl CallEvaluator for IfErrorCall {
    fn evaluate(
        &self,
        _function: &RegisteredFunction,
        args: &[CompiledExpr],
        ctx: &EvaluationContext<'_>,
    ) -> FormulaResult<FormulaValue> {
        let value = match args.first() {
            Some(expr) => expr.evaluate(ctx)?,
            None => FormulaValue::Empty,
        };
        let fallback = match value {
            FormulaValue::Error(CellError::Na) => true,
            FormulaValue::Error(_) => !self.only_na,
            _ => false,
        };
        match (fallback, args.get(1)) {
            (true, Some(expr)) => expr.evaluate(ctx),
            _ => Ok(value),
        }
    }
}

/// AND and OR: stops evaluating arguments once the result is decided
#[derive(Debug, Clone, Copy)]
pub struct ShortCircuitCall {
    /// The value that decides the result (FALSE for AND, TRUE for OR)
    pub stop_on: bool,
}

impl CallEvaluator for ShortCircuitCall {
    fn evaluate(
        &self,
        _function: &RegisteredFunction,
        args: &[CompiledExpr],
        ctx: &EvaluationContext<'_>,
    ) -> FormulaResult<FormulaValue> {
        // Evaluation failures surface through `Err`; spreadsheet errors are
        // folded into the result.
        let mut failure = None;
        let values = args.iter().map_while(|expr| match expr.evaluate(ctx) {
            Ok(value) => Some(Ok(value)),
            Err(e) => {
                failure = Some(e);
                None
            }
        });
        let result = cell_result(|| fold_logical(values, self.stop_on));
        match failure {
            Some(e) => Err(e),
            None => result,
        }
    }
}

/// CHOOSE: evaluates the index and then only the chosen value
#[derive(Debug, Default, Clone, Copy)]
pub struct ChooseCall;

impl CallEvaluator for ChooseCall {
    fn evaluate(
        &self,
        _function: &RegisteredFunction,
        args: &[CompiledExpr],
        ctx: &EvaluationContext<'_>,
    ) -> FormulaResult<FormulaValue> {
        let index = match args.first() {
            Some(expr) => expr.evaluate(ctx)?,
            None => FormulaValue::Empty,
        };
        match choose_index(&index, args.len().saturating_sub(1)) {
            Ok(i) => match args.get(i) {
                Some(expr) => expr.evaluate(ctx),
                None => Ok(FormulaValue::Error(CellError::Value)),
            },
            Err(e) => Ok(FormulaValue::Error(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compiler::{Compiler, Reference};
    use crate::diagnostics::FunctionDiagnostics;
    use crate::functions::test_support::{eval, num, s};
    use crate::parser::parse_formula;
    use crate::repository::FunctionRepository;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::{CellId, Workbook};

    fn called(formula: &str) -> Vec<String> {
        let repo = FunctionRepository::with_builtins();
        let wb = Workbook::new();
        let compiled = Compiler::new(&repo, &wb, 0)
            .compile(&parse_formula(formula).unwrap())
            .unwrap();
        let diagnostics = FunctionDiagnostics::new();
        compiled
            .evaluate(&EvaluationContext::new(&wb, CellId::new(0, 5, 5)).with_diagnostics(&diagnostics))
            .unwrap();
        diagnostics.snapshot().into_iter().map(|(name, _)| name).collect()
    }

    #[test]
    fn test_if() {
        assert_eq!(eval("=IF(1>0,\"yes\",\"no\")"), s("yes"));
        assert_eq!(eval("=IF(1<0,\"yes\",\"no\")"), s("no"));
        assert_eq!(eval("=IF(1<0,\"yes\")"), FormulaValue::Boolean(false));
        assert_eq!(eval("=IF(\"x\"=\"y\",1)"), FormulaValue::Boolean(false));
        assert_eq!(eval("=IF(\"maybe\",1,2)"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=IF(1/0,1,2)"), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval("=IF(A1,1,2)"), num(2.0));
    }

    #[test]
    fn test_if_evaluates_one_branch() {
        let names = called("=IF(A1=0,ABS(-1),SQRT(4))");
        assert!(names.contains(&"ABS".to_string()));
        assert!(!names.contains(&"SQRT".to_string()));
    }

    #[test]
    fn test_constant_if_drops_untaken_references() {
        let repo = FunctionRepository::with_builtins();
        let wb = Workbook::new();
        let compiled = Compiler::new(&repo, &wb, 0)
            .compile(&parse_formula("=IF(TRUE,A1,B1)").unwrap())
            .unwrap();
        assert_eq!(compiled.references(), vec![Reference::Cell(CellId::new(0, 0, 0))]);

        let missing_else = Compiler::new(&repo, &wb, 0)
            .compile(&parse_formula("=IF(0,A1)").unwrap())
            .unwrap();
        assert!(missing_else.references().is_empty());
        assert_eq!(
            missing_else.as_constant(),
            Some(&FormulaValue::Boolean(false))
        );
    }

    #[test]
    fn test_iferror_and_ifna() {
        assert_eq!(eval("=IFERROR(1/0,\"bad\")"), s("bad"));
        assert_eq!(eval("=IFERROR(5,\"bad\")"), num(5.0));
        assert_eq!(eval("=IFNA(NA(),0)"), num(0.0));
        assert_eq!(eval("=IFNA(1/0,0)"), FormulaValue::Error(CellError::Div0));
        assert!(!called("=IFERROR(1,ABS(-1))").contains(&"ABS".to_string()));
    }

    #[test]
    fn test_and_or_xor_not() {
        assert_eq!(eval("=AND(TRUE,1)"), FormulaValue::Boolean(true));
        assert_eq!(eval("=AND(TRUE,0)"), FormulaValue::Boolean(false));
        assert_eq!(eval("=OR(FALSE,0)"), FormulaValue::Boolean(false));
        assert_eq!(eval("=OR({0,1})"), FormulaValue::Boolean(true));
        assert_eq!(eval("=AND({\"a\",\"b\"})"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=AND(\"a\")"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=OR(1/0,TRUE)"), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval("=XOR(TRUE,TRUE,TRUE)"), FormulaValue::Boolean(true));
        assert_eq!(eval("=XOR(TRUE,TRUE)"), FormulaValue::Boolean(false));
        assert_eq!(eval("=NOT(0)"), FormulaValue::Boolean(true));
        assert_eq!(eval("=TRUE()"), FormulaValue::Boolean(true));
        assert!(!called("=OR(TRUE,ABS(-1))").contains(&"ABS".to_string()));
    }

    #[test]
    fn test_choose() {
        assert_eq!(eval("=CHOOSE(2,\"a\",\"b\",\"c\")"), s("b"));
        assert_eq!(eval("=CHOOSE(3.7,1,2,3)"), num(3.0));
        assert_eq!(eval("=CHOOSE(4,1,2,3)"), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=CHOOSE(0,1)"), FormulaValue::Error(CellError::Value));
        assert!(!called("=CHOOSE(1,1,ABS(-1))").contains(&"ABS".to_string()));
    }

    #[test]
    fn test_eager_bodies_match_lazy_results() {
        let ctx = EvaluationContext::detached();
        let values = [FormulaValue::Boolean(false), num(1.0)];
        assert_eq!(fn_if(&values, &ctx).unwrap(), FormulaValue::Boolean(false));
        assert_eq!(fn_and(&values, &ctx).unwrap(), FormulaValue::Boolean(false));
        assert_eq!(fn_or(&values, &ctx).unwrap(), FormulaValue::Boolean(true));
        assert_eq!(
            fn_choose(&[num(2.0), s("a"), s("b")], &ctx).unwrap(),
            s("b")
        );
        assert_eq!(
            fn_iferror(&[FormulaValue::Error(CellError::Ref), num(0.0)], &ctx).unwrap(),
            num(0.0)
        );
    }
}
