//! Host-supplied function modules driving a calculation

use pretty_assertions::assert_eq;
use sheetcalc::prelude::*;
use sheetcalc::{
    CompiledExpr, EagerCall, EvaluationContext, FormulaResult, FunctionCompiler,
    RegisteredFunction,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

fn fn_double(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match args[0].as_number() {
        Some(n) => FormulaValue::Number(n * 2.0),
        None => FormulaValue::Error(CellError::Value),
    })
}

fn fn_double_v2(args: &[FormulaValue], _ctx: &EvaluationContext) -> FormulaResult<FormulaValue> {
    Ok(match args[0].as_number() {
        Some(n) => FormulaValue::Number(n * 20.0),
        None => FormulaValue::Error(CellError::Value),
    })
}

/// Folds calls whose arguments are all constants, counting each fold
#[derive(Default)]
struct FoldingCompiler {
    folds: AtomicUsize,
}

impl FunctionCompiler for FoldingCompiler {
    fn compile(
        &self,
        function: &Arc<RegisteredFunction>,
        args: Vec<CompiledExpr>,
    ) -> FormulaResult<CompiledExpr> {
        let constants: Option<Vec<FormulaValue>> = args
            .iter()
            .map(|a| a.as_constant().cloned())
            .collect();
        match constants {
            Some(values) => {
                self.folds.fetch_add(1, Ordering::Relaxed);
                let value = function.call(&values, &EvaluationContext::detached())?;
                Ok(CompiledExpr::Value(value))
            }
            None => Ok(CompiledExpr::call(function.clone(), args, Arc::new(EagerCall))),
        }
    }
}

fn module(name: &str, compiler: Arc<FoldingCompiler>) -> FunctionModule {
    let mut module = FunctionModule::new(name);
    module.add_with_compiler(FunctionDef::new("MYFUNC", 1, Some(1), fn_double), compiler);
    module
}

#[test]
fn test_custom_compiler_takes_over_compilation() {
    let mut workbook = Workbook::new();
    let sheet = workbook.worksheet_mut(0).unwrap();
    sheet.set_cell_value("A1", 4.0).unwrap();
    sheet.set_cell_formula("B1", "=MYFUNC(21)").unwrap();
    sheet.set_cell_formula("B2", "=myfunc(A1)+1").unwrap();

    let compiler = Arc::new(FoldingCompiler::default());
    let mut engine = CalculationEngine::default();
    engine.load_module(&module("host", compiler.clone()));
    assert!(engine.repository().is_function_name("MyFunc"));

    let stats = engine.calculate_all(&mut workbook).unwrap();
    assert_eq!(stats.errors, 0);
    assert_eq!(compiler.folds.load(Ordering::Relaxed), 1);
    assert_eq!(workbook.value(CellId::new(0, 0, 1)), CellValue::Number(42.0));
    assert_eq!(workbook.value(CellId::new(0, 1, 1)), CellValue::Number(9.0));

    // The folded cell reads nothing; the other one still depends on A1
    let chain = engine.chain();
    let folded = chain.position_of(CellId::new(0, 0, 1)).unwrap();
    assert!(chain.get(folded).unwrap().reads().is_empty());
    let stats = engine
        .calculate_dirty(&mut workbook, &[CellId::new(0, 0, 0)])
        .unwrap();
    assert_eq!(stats.cells_calculated, 1);
}

#[test]
fn test_reloading_replaces_compiler_and_implementation() {
    let first = Arc::new(FoldingCompiler::default());
    let mut engine = CalculationEngine::default();
    engine.load_module(&module("host", first.clone()));
    engine.load_module(&module("host", first.clone()));
    let before = engine.repository().lookup("MYFUNC").unwrap().id;
    let count = engine.repository().len();

    let second = Arc::new(FoldingCompiler::default());
    let mut replacement = FunctionModule::new("host-v2");
    replacement.add_with_compiler(
        FunctionDef::new("MYFUNC", 1, Some(1), fn_double_v2),
        second.clone(),
    );
    engine.load_module(&replacement);

    let repository = engine.repository();
    let after = repository.lookup("MYFUNC").unwrap().id;
    assert_ne!(before, after);
    assert_eq!(repository.len(), count);

    let current = repository.compiler(after).unwrap();
    assert_eq!(
        Arc::as_ptr(current) as *const (),
        Arc::as_ptr(&second) as *const ()
    );
    assert!(repository.compiler(before).is_none());

    let mut workbook = Workbook::new();
    workbook
        .worksheet_mut(0)
        .unwrap()
        .set_cell_formula("A1", "=MYFUNC(2)")
        .unwrap();
    engine.calculate_all(&mut workbook).unwrap();
    assert_eq!(workbook.value(CellId::new(0, 0, 0)), CellValue::Number(40.0));
    assert_eq!(first.folds.load(Ordering::Relaxed), 0);
}
