//! Expression compiler
//!
//! Turns a parsed [`FormulaExpr`] into a [`CompiledExpr`]: sheet names are
//! resolved to indices, references become [`CellId`]s and every function call
//! is bound to its [`RegisteredFunction`]. A function registered with a
//! [`FunctionCompiler`] decides how its own call node is built; everything else
//! gets the default eager call that evaluates all arguments first.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::context::EvaluationContext;
use crate::error::{FormulaError, FormulaResult};
use crate::repository::{FunctionRepository, RegisteredFunction};
use crate::value::{compare_values, FormulaValue};
use sheetcalc_core::{CellError, CellId, CellRange, SheetCatalog};
use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

/// Builds the call node for one function
///
/// Receives the already compiled argument nodes. Implementations can fold
/// constants, inspect raw references, or attach a [`CallEvaluator`] that
/// controls which arguments are evaluated.
pub trait FunctionCompiler: Send + Sync {
    fn compile(
        &self,
        function: &Arc<RegisteredFunction>,
        args: Vec<CompiledExpr>,
    ) -> FormulaResult<CompiledExpr>;
}

/// Evaluates a call node from its unevaluated arguments
pub trait CallEvaluator: Send + Sync {
    fn evaluate(
        &self,
        function: &RegisteredFunction,
        args: &[CompiledExpr],
        ctx: &EvaluationContext<'_>,
    ) -> FormulaResult<FormulaValue>;
}

/// Default strategy: evaluate every argument, then call the implementation
#[derive(Debug, Default, Clone, Copy)]
pub struct EagerCall;

impl CallEvaluator for EagerCall {
    fn evaluate(
        &self,
        function: &RegisteredFunction,
        args: &[CompiledExpr],
        ctx: &EvaluationContext<'_>,
    ) -> FormulaResult<FormulaValue> {
        let values = args
            .iter()
            .map(|arg| arg.evaluate(ctx))
            .collect::<FormulaResult<Vec<_>>>()?;
        function.call(&values, ctx)
    }
}

/// Compiler that attaches a fixed [`CallEvaluator`] to every call
#[derive(Clone)]
pub struct WithEvaluator(pub Arc<dyn CallEvaluator>);

impl WithEvaluator {
    pub fn new<E: CallEvaluator + 'static>(evaluator: E) -> Self {
        Self(Arc::new(evaluator))
    }

    /// Same behaviour as the default compilation
    pub fn eager() -> Self {
        Self::new(EagerCall)
    }
}

impl FunctionCompiler for WithEvaluator {
    fn compile(
        &self,
        function: &Arc<RegisteredFunction>,
        args: Vec<CompiledExpr>,
    ) -> FormulaResult<CompiledExpr> {
        Ok(CompiledExpr::call(function.clone(), args, self.0.clone()))
    }
}

/// A function call bound to its implementation
pub struct CompiledCall {
    pub function: Arc<RegisteredFunction>,
    pub args: Vec<CompiledExpr>,
    pub evaluator: Arc<dyn CallEvaluator>,
}

impl fmt::Debug for CompiledCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledCall")
            .field("function", &self.function.name())
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}

/// A cell or range read by a compiled expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reference {
    Cell(CellId),
    Range { sheet: usize, range: CellRange },
}

/// Evaluable expression
#[derive(Debug)]
pub enum CompiledExpr {
    /// Constant
    Value(FormulaValue),
    /// Single cell read
    Cell(CellId),
    /// Range read
    Range { sheet: usize, range: CellRange },
    /// Undefined name; evaluates to `#NAME?`
    Name(String),
    Unary {
        op: UnaryOperator,
        operand: Box<CompiledExpr>,
    },
    Binary {
        op: BinaryOperator,
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
    },
    Array(Vec<Vec<CompiledExpr>>),
    Call(Box<CompiledCall>),
}

impl CompiledExpr {
    /// Build a call node
    pub fn call(
        function: Arc<RegisteredFunction>,
        args: Vec<CompiledExpr>,
        evaluator: Arc<dyn CallEvaluator>,
    ) -> Self {
        CompiledExpr::Call(Box::new(CompiledCall {
            function,
            args,
            evaluator,
        }))
    }

    /// Evaluate against a context
    ///
    /// Spreadsheet errors come back as `Ok(FormulaValue::Error(..))`; `Err` is
    /// reserved for failures raised by function bodies.
    pub fn evaluate(&self, ctx: &EvaluationContext<'_>) -> FormulaResult<FormulaValue> {
        match self {
            CompiledExpr::Value(v) => Ok(v.clone()),
            CompiledExpr::Cell(id) => Ok(ctx.cell_value(*id)),
            CompiledExpr::Range { sheet, range } => Ok(ctx.range_values(*sheet, range)),
            CompiledExpr::Name(_) => Ok(FormulaValue::Error(CellError::Name)),
            CompiledExpr::Unary { op, operand } => {
                let value = operand.evaluate(ctx)?;
                Ok(map_array(value, |v| apply_unary(*op, v)))
            }
            CompiledExpr::Binary { op, left, right } => {
                let l = left.evaluate(ctx)?;
                let r = right.evaluate(ctx)?;
                Ok(apply_binary(*op, &l, &r))
            }
            CompiledExpr::Array(rows) => rows
                .iter()
                .map(|row| row.iter().map(|e| e.evaluate(ctx)).collect())
                .collect::<FormulaResult<Vec<_>>>()
                .map(FormulaValue::Array),
            CompiledExpr::Call(call) => {
                let started = ctx.diagnostics.map(|_| Instant::now());
                let result = call.evaluator.evaluate(&call.function, &call.args, ctx);
                if let (Some(diagnostics), Some(started)) = (ctx.diagnostics, started) {
                    diagnostics.record(call.function.name(), started.elapsed());
                }
                result
            }
        }
    }

    /// Every cell and range the expression may read, in tree order
    pub fn references(&self) -> Vec<Reference> {
        let mut out = Vec::new();
        self.collect_references(&mut out);
        out
    }

    fn collect_references(&self, out: &mut Vec<Reference>) {
        match self {
            CompiledExpr::Cell(id) => out.push(Reference::Cell(*id)),
            CompiledExpr::Range { sheet, range } => out.push(Reference::Range {
                sheet: *sheet,
                range: *range,
            }),
            CompiledExpr::Unary { operand, .. } => operand.collect_references(out),
            CompiledExpr::Binary { left, right, .. } => {
                left.collect_references(out);
                right.collect_references(out);
            }
            CompiledExpr::Array(rows) => rows
                .iter()
                .flatten()
                .for_each(|e| e.collect_references(out)),
            CompiledExpr::Call(call) => call.args.iter().for_each(|a| a.collect_references(out)),
            CompiledExpr::Value(_) | CompiledExpr::Name(_) => {}
        }
    }

    /// Whether any call in the tree is to a volatile function
    pub fn is_volatile(&self) -> bool {
        match self {
            CompiledExpr::Call(call) => {
                call.function.is_volatile() || call.args.iter().any(CompiledExpr::is_volatile)
            }
            CompiledExpr::Unary { operand, .. } => operand.is_volatile(),
            CompiledExpr::Binary { left, right, .. } => left.is_volatile() || right.is_volatile(),
            CompiledExpr::Array(rows) => rows.iter().flatten().any(CompiledExpr::is_volatile),
            _ => false,
        }
    }

    /// The constant value, if this node is a literal
    pub fn as_constant(&self) -> Option<&FormulaValue> {
        match self {
            CompiledExpr::Value(v) => Some(v),
            _ => None,
        }
    }
}

/// Compiles parsed formulas for one sheet
pub struct Compiler<'a> {
    repository: &'a FunctionRepository,
    catalog: &'a dyn SheetCatalog,
    sheet: usize,
}

impl<'a> Compiler<'a> {
    /// Compiler for formulas on `sheet`; unqualified references point there
    pub fn new(repository: &'a FunctionRepository, catalog: &'a dyn SheetCatalog, sheet: usize) -> Self {
        Self {
            repository,
            catalog,
            sheet,
        }
    }

    /// Compile an expression tree
    ///
    /// Fails with [`FormulaError::UnknownFunction`] or
    /// [`FormulaError::ArgumentCount`]. References to unknown sheets compile to
    /// a `#REF!` constant.
    pub fn compile(&self, expr: &FormulaExpr) -> FormulaResult<CompiledExpr> {
        Ok(match expr {
            FormulaExpr::Number(n) => CompiledExpr::Value(FormulaValue::Number(*n)),
            FormulaExpr::String(s) => CompiledExpr::Value(FormulaValue::String(s.clone())),
            FormulaExpr::Boolean(b) => CompiledExpr::Value(FormulaValue::Boolean(*b)),
            FormulaExpr::Error(e) => CompiledExpr::Value(FormulaValue::Error(*e)),

            FormulaExpr::CellRef(r) => match self.resolve_sheet(r.sheet.as_deref()) {
                Some(sheet) => CompiledExpr::Cell(CellId::from_address(sheet, &r.address)),
                None => CompiledExpr::Value(FormulaValue::Error(CellError::Ref)),
            },
            FormulaExpr::RangeRef(r) => match self.resolve_sheet(r.sheet.as_deref()) {
                Some(sheet) => CompiledExpr::Range {
                    sheet,
                    range: r.range,
                },
                None => CompiledExpr::Value(FormulaValue::Error(CellError::Ref)),
            },
            FormulaExpr::NameRef(name) => CompiledExpr::Name(name.clone()),

            FormulaExpr::UnaryOp { op, operand } => CompiledExpr::Unary {
                op: *op,
                operand: Box::new(self.compile(operand)?),
            },
            FormulaExpr::BinaryOp { op, left, right } => CompiledExpr::Binary {
                op: *op,
                left: Box::new(self.compile(left)?),
                right: Box::new(self.compile(right)?),
            },
            FormulaExpr::Array(rows) => CompiledExpr::Array(
                rows.iter()
                    .map(|row| row.iter().map(|e| self.compile(e)).collect())
                    .collect::<FormulaResult<_>>()?,
            ),

            FormulaExpr::Function { name, args } => self.compile_call(name, args)?,
        })
    }

    fn compile_call(&self, name: &str, args: &[FormulaExpr]) -> FormulaResult<CompiledExpr> {
        let function = self
            .repository
            .lookup(name)
            .ok_or_else(|| FormulaError::UnknownFunction(name.to_string()))?;
        function.def.check_arity(args.len())?;

        let compiled = args
            .iter()
            .map(|arg| self.compile(arg))
            .collect::<FormulaResult<Vec<_>>>()?;

        match self.repository.compiler(function.id) {
            Some(compiler) => compiler.compile(function, compiled),
            None => Ok(CompiledExpr::call(
                function.clone(),
                compiled,
                Arc::new(EagerCall),
            )),
        }
    }

    fn resolve_sheet(&self, name: Option<&str>) -> Option<usize> {
        match name {
            None => Some(self.sheet),
            Some(name) => self.catalog.sheet_index(name),
        }
    }
}

// === Operators ===

fn map_array(value: FormulaValue, f: impl Fn(FormulaValue) -> FormulaValue + Copy) -> FormulaValue {
    match value {
        FormulaValue::Array(rows) => FormulaValue::Array(
            rows.into_iter()
                .map(|row| row.into_iter().map(|v| map_array(v, f)).collect())
                .collect(),
        ),
        other => f(other),
    }
}

fn apply_unary(op: UnaryOperator, value: FormulaValue) -> FormulaValue {
    if let Some(e) = value.get_error() {
        return FormulaValue::Error(e);
    }
    match value.as_number() {
        Some(n) => match op {
            UnaryOperator::Negate => FormulaValue::Number(-n),
            UnaryOperator::Percent => FormulaValue::Number(n / 100.0),
        },
        None => FormulaValue::Error(CellError::Value),
    }
}

/// Apply a binary operator, broadcasting over arrays element-wise
pub fn apply_binary(op: BinaryOperator, left: &FormulaValue, right: &FormulaValue) -> FormulaValue {
    if !matches!(left, FormulaValue::Array(_)) && !matches!(right, FormulaValue::Array(_)) {
        return apply_scalar(op, left, right);
    }

    let (lr, lc) = left.dimensions();
    let (rr, rc) = right.dimensions();
    let rows = lr.max(rr);
    let cols = lc.max(rc);

    FormulaValue::Array(
        (0..rows)
            .map(|r| {
                (0..cols)
                    .map(|c| match (broadcast_at(left, r, c), broadcast_at(right, r, c)) {
                        (Some(l), Some(r)) => apply_scalar(op, l, r),
                        _ => FormulaValue::Error(CellError::Na),
                    })
                    .collect()
            })
            .collect(),
    )
}

/// Element at (r, c); single rows and columns repeat across the other axis
fn broadcast_at(value: &FormulaValue, r: usize, c: usize) -> Option<&FormulaValue> {
    match value {
        FormulaValue::Array(rows) => {
            let row = if rows.len() == 1 { rows.first() } else { rows.get(r) }?;
            if row.len() == 1 {
                row.first()
            } else {
                row.get(c)
            }
        }
        scalar => Some(scalar),
    }
}

fn apply_scalar(op: BinaryOperator, left: &FormulaValue, right: &FormulaValue) -> FormulaValue {
    if let FormulaValue::Array(_) = left {
        return apply_scalar(op, &left.scalar(), right);
    }
    if let FormulaValue::Array(_) = right {
        return apply_scalar(op, left, &right.scalar());
    }

    // Propagate errors
    if let Some(e) = left.get_error() {
        return FormulaValue::Error(e);
    }
    if let Some(e) = right.get_error() {
        return FormulaValue::Error(e);
    }

    if op.is_comparison() {
        let ordering = compare_values(left, right);
        let result = match op {
            BinaryOperator::Equal => ordering == Ordering::Equal,
            BinaryOperator::NotEqual => ordering != Ordering::Equal,
            BinaryOperator::LessThan => ordering == Ordering::Less,
            BinaryOperator::LessEqual => ordering != Ordering::Greater,
            BinaryOperator::GreaterThan => ordering == Ordering::Greater,
            _ => ordering != Ordering::Less,
        };
        return FormulaValue::Boolean(result);
    }

    if op == BinaryOperator::Concat {
        return FormulaValue::String(left.as_string() + &right.as_string());
    }

    let (Some(l), Some(r)) = (left.as_number(), right.as_number()) else {
        return FormulaValue::Error(CellError::Value);
    };

    let result = match op {
        BinaryOperator::Add => l + r,
        BinaryOperator::Subtract => l - r,
        BinaryOperator::Multiply => l * r,
        BinaryOperator::Divide => {
            if r == 0.0 {
                return FormulaValue::Error(CellError::Div0);
            }
            l / r
        }
        BinaryOperator::Power => {
            if l == 0.0 && r < 0.0 {
                return FormulaValue::Error(CellError::Div0);
            }
            l.powf(r)
        }
        _ => return FormulaValue::Error(CellError::Value),
    };

    if result.is_finite() {
        FormulaValue::Number(result)
    } else {
        FormulaValue::Error(CellError::Num)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;
    use sheetcalc_core::Workbook;

    fn eval(formula: &str) -> FormulaResult<FormulaValue> {
        let repo = FunctionRepository::with_builtins();
        let wb = Workbook::new();
        let ast = parse_formula(formula)?;
        let compiled = Compiler::new(&repo, &wb, 0).compile(&ast)?;
        compiled.evaluate(&EvaluationContext::detached())
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("=1+2").unwrap(), FormulaValue::Number(3.0));
        assert_eq!(eval("=10-3").unwrap(), FormulaValue::Number(7.0));
        assert_eq!(eval("=4*5").unwrap(), FormulaValue::Number(20.0));
        assert_eq!(eval("=20/4").unwrap(), FormulaValue::Number(5.0));
        assert_eq!(eval("=2^10").unwrap(), FormulaValue::Number(1024.0));
        assert_eq!(eval("=2+3*4-5").unwrap(), FormulaValue::Number(9.0));
    }

    #[test]
    fn test_evaluate_unary() {
        assert_eq!(eval("=-5").unwrap(), FormulaValue::Number(-5.0));
        assert_eq!(eval("=50%").unwrap(), FormulaValue::Number(0.5));
        assert_eq!(eval("=--5").unwrap(), FormulaValue::Number(5.0));
    }

    #[test]
    fn test_evaluate_comparison_and_concat() {
        assert_eq!(eval("=1<2").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(eval("=5<>5").unwrap(), FormulaValue::Boolean(false));
        assert_eq!(eval("=\"a\"=\"A\"").unwrap(), FormulaValue::Boolean(true));
        assert_eq!(
            eval("=\"Value: \"&42").unwrap(),
            FormulaValue::String("Value: 42".into())
        );
    }

    #[test]
    fn test_error_values() {
        assert_eq!(eval("=1/0").unwrap(), FormulaValue::Error(CellError::Div0));
        assert_eq!(eval("=\"x\"+1").unwrap(), FormulaValue::Error(CellError::Value));
        assert_eq!(eval("=#N/A+1").unwrap(), FormulaValue::Error(CellError::Na));
        assert_eq!(eval("=(-8)^0.5").unwrap(), FormulaValue::Error(CellError::Num));
        assert_eq!(eval("=Unknown").unwrap(), FormulaValue::Error(CellError::Name));
        assert_eq!(eval("=NoSuchSheet!A1").unwrap(), FormulaValue::Error(CellError::Ref));
    }

    #[test]
    fn test_array_broadcast() {
        assert_eq!(
            eval("={1,2;3,4}*10").unwrap(),
            FormulaValue::Array(vec![
                vec![FormulaValue::Number(10.0), FormulaValue::Number(20.0)],
                vec![FormulaValue::Number(30.0), FormulaValue::Number(40.0)],
            ])
        );
        assert_eq!(
            eval("={1,2,3}+{1,2}").unwrap(),
            FormulaValue::Array(vec![vec![
                FormulaValue::Number(2.0),
                FormulaValue::Number(4.0),
                FormulaValue::Error(CellError::Na),
            ]])
        );
    }

    #[test]
    fn test_compile_errors() {
        assert!(matches!(
            eval("=NOSUCH(1)"),
            Err(FormulaError::UnknownFunction(name)) if name == "NOSUCH"
        ));
        assert!(matches!(
            eval("=ABS(1,2)"),
            Err(FormulaError::ArgumentCount { actual: 2, .. })
        ));
    }

    #[test]
    fn test_references_are_resolved() {
        let repo = FunctionRepository::with_builtins();
        let mut wb = Workbook::new();
        wb.add_worksheet_with_name("Data").unwrap();

        let ast = parse_formula("=A1+SUM(data!B1:B3)+'Data'!C1").unwrap();
        let compiled = Compiler::new(&repo, &wb, 0).compile(&ast).unwrap();
        assert_eq!(
            compiled.references(),
            vec![
                Reference::Cell(CellId::new(0, 0, 0)),
                Reference::Range {
                    sheet: 1,
                    range: CellRange::parse("B1:B3").unwrap()
                },
                Reference::Cell(CellId::new(1, 0, 2)),
            ]
        );
        assert!(!compiled.is_volatile());

        let now = Compiler::new(&repo, &wb, 0)
            .compile(&parse_formula("=1+NOW()").unwrap())
            .unwrap();
        assert!(now.is_volatile());
    }

    #[test]
    fn test_diagnostics_count_calls() {
        let repo = FunctionRepository::with_builtins();
        let wb = Workbook::new();
        let ast = parse_formula("=SUM(1,ABS(-2),ABS(-3))").unwrap();
        let compiled = Compiler::new(&repo, &wb, 0).compile(&ast).unwrap();

        let diagnostics = crate::FunctionDiagnostics::new();
        let ctx = EvaluationContext::detached().with_diagnostics(&diagnostics);
        assert_eq!(compiled.evaluate(&ctx).unwrap(), FormulaValue::Number(5.0));

        let counts: Vec<_> = diagnostics
            .snapshot()
            .into_iter()
            .map(|(name, stats)| (name, stats.count))
            .collect();
        assert_eq!(counts, vec![("ABS".to_string(), 2), ("SUM".to_string(), 1)]);
    }
}
