//! Tests for formula evaluation with cell references

use pretty_assertions::assert_eq;
use sheetcalc::prelude::*;
use sheetcalc::{parse_formula, Compiler, EvaluationContext};

/// Compile and evaluate `formula` as if it sat in cell A1 of the first sheet
fn evaluate(wb: &Workbook, formula: &str) -> FormulaValue {
    let repo = FunctionRepository::with_builtins();
    let ast = parse_formula(formula).unwrap();
    let expr = Compiler::new(&repo, wb, 0).compile(&ast).unwrap();
    let ctx = EvaluationContext::new(wb, CellId::new(0, 0, 0));
    expr.evaluate(&ctx).unwrap()
}

/// Test basic formula evaluation without cell references
#[test]
fn test_evaluate_simple_formulas() {
    let wb = Workbook::new();

    // Arithmetic
    assert_eq!(evaluate(&wb, "=1+2*3"), FormulaValue::Number(7.0));
    assert_eq!(evaluate(&wb, "=-2^2"), FormulaValue::Number(4.0));
    assert_eq!(evaluate(&wb, "=2^3^2"), FormulaValue::Number(64.0));

    // String concatenation
    assert_eq!(
        evaluate(&wb, "=\"Hello \"&\"World\""),
        FormulaValue::String("Hello World".into())
    );

    // Comparison
    assert_eq!(evaluate(&wb, "=5>3"), FormulaValue::Boolean(true));
    assert_eq!(evaluate(&wb, "=\"a\"=\"A\""), FormulaValue::Boolean(true));
}

/// Test formula evaluation with cell references
#[test]
fn test_evaluate_with_cell_references() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 10.0).unwrap();
    sheet.set_cell_value("A2", 20.0).unwrap();
    sheet.set_cell_value("A3", 30.0).unwrap();
    sheet.set_cell_value("B1", 5.0).unwrap();

    assert_eq!(evaluate(&wb, "=A2"), FormulaValue::Number(20.0));
    assert_eq!(evaluate(&wb, "=A1+B1"), FormulaValue::Number(15.0));
    assert_eq!(evaluate(&wb, "=$A$1>B$1"), FormulaValue::Boolean(true));
    assert_eq!(evaluate(&wb, "=SUM(A1:A3)"), FormulaValue::Number(60.0));
    assert_eq!(evaluate(&wb, "=AVERAGE(A1:A3)"), FormulaValue::Number(20.0));
}

/// Test complex nested formulas
#[test]
fn test_evaluate_complex_formulas() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 100.0).unwrap();
    sheet.set_cell_value("A2", 50.0).unwrap();
    sheet.set_cell_value("B1", 0.5).unwrap();

    assert_eq!(
        evaluate(&wb, "=IF(A1>A2,A1*B1,A2*B1)"),
        FormulaValue::Number(50.0)
    );
    assert_eq!(evaluate(&wb, "=SUM(A1,A2)*B1"), FormulaValue::Number(75.0));
    assert_eq!(
        evaluate(&wb, "=ROUND(AVERAGE(A1:A2)/3,2)"),
        FormulaValue::Number(25.0)
    );
}

/// Test error propagation and absorption
#[test]
fn test_error_propagation() {
    let wb = Workbook::new();

    assert_eq!(evaluate(&wb, "=1/0"), FormulaValue::Error(CellError::Div0));
    assert_eq!(evaluate(&wb, "=1/0+5"), FormulaValue::Error(CellError::Div0));
    assert_eq!(evaluate(&wb, "=#N/A=1"), FormulaValue::Error(CellError::Na));
    assert_eq!(evaluate(&wb, "=IFERROR(1/0,\"safe\")"), FormulaValue::String("safe".into()));
    assert_eq!(evaluate(&wb, "=undefined_name"), FormulaValue::Error(CellError::Name));
}

/// Test empty cell handling
#[test]
fn test_empty_cell_handling() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", 10.0).unwrap();
    // A2 is empty
    sheet.set_cell_value("A3", 30.0).unwrap();

    // Empty cells are treated as 0 in arithmetic
    assert_eq!(evaluate(&wb, "=A1+A2"), FormulaValue::Number(10.0));
    // SUM ignores empty cells
    assert_eq!(evaluate(&wb, "=SUM(A1:A3)"), FormulaValue::Number(40.0));
    assert_eq!(evaluate(&wb, "=A2&\"x\""), FormulaValue::String("x".into()));
}

/// Test string operations
#[test]
fn test_string_operations() {
    let mut wb = Workbook::new();
    let sheet = wb.worksheet_mut(0).unwrap();

    sheet.set_cell_value("A1", "Hello").unwrap();
    sheet.set_cell_value("B1", "World").unwrap();

    assert_eq!(
        evaluate(&wb, "=A1&\" \"&B1"),
        FormulaValue::String("Hello World".into())
    );
    assert_eq!(
        evaluate(&wb, "=UPPER(LEFT(A1,2))&LEN(B1)"),
        FormulaValue::String("HE5".into())
    );
    assert_eq!(
        evaluate(&wb, "=\"say \"\"hi\"\"\""),
        FormulaValue::String("say \"hi\"".into())
    );
}

/// Test boolean functions
#[test]
fn test_boolean_functions() {
    let wb = Workbook::new();

    assert_eq!(evaluate(&wb, "=AND(TRUE,TRUE,TRUE)"), FormulaValue::Boolean(true));
    assert_eq!(evaluate(&wb, "=AND(TRUE,FALSE,TRUE)"), FormulaValue::Boolean(false));
    assert_eq!(evaluate(&wb, "=OR(FALSE,FALSE,TRUE)"), FormulaValue::Boolean(true));
    assert_eq!(evaluate(&wb, "=NOT(FALSE)"), FormulaValue::Boolean(true));
    assert_eq!(
        evaluate(&wb, "=AND(NOT(FALSE),OR(TRUE,FALSE))"),
        FormulaValue::Boolean(true)
    );
}

/// Boundary behaviour of date and text functions
#[test]
fn test_library_boundaries() {
    let wb = Workbook::new();

    assert_eq!(
        evaluate(&wb, "=DAYS360(DATE(2022,1,31),DATE(2022,3,31))"),
        FormulaValue::Number(60.0)
    );
    assert_eq!(evaluate(&wb, "=ROMAN(1994)"), FormulaValue::String("MCMXCIV".into()));
    assert_eq!(evaluate(&wb, "=ROMAN(0)"), FormulaValue::Error(CellError::Value));
    assert_eq!(evaluate(&wb, "=ROMAN(-1)"), FormulaValue::Error(CellError::Value));
    assert_eq!(evaluate(&wb, "=ROMAN(4000)"), FormulaValue::Error(CellError::Value));
}

/// Compilation failures are reported, not evaluated
#[test]
fn test_compile_errors() {
    let wb = Workbook::new();
    let repo = FunctionRepository::with_builtins();
    let compile = |formula: &str| {
        let ast = parse_formula(formula).unwrap();
        Compiler::new(&repo, &wb, 0).compile(&ast)
    };

    let err = compile("=NOPE(1)").unwrap_err();
    assert_eq!(err.to_string(), "Unknown function: NOPE");

    let err = compile("=ABS(1,2)").unwrap_err();
    assert!(matches!(
        err,
        sheetcalc::FormulaError::ArgumentCount { actual: 2, .. }
    ));
}
