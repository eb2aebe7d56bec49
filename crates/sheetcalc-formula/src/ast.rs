//! Formula Abstract Syntax Tree types

use sheetcalc_core::{CellAddress, CellError, CellRange, SheetReference};
use std::fmt;

/// Formula expression AST
///
/// References keep the sheet name as written; resolution to a sheet index
/// happens in the compiler, where the workbook's sheet catalog is available.
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal
    Number(f64),
    /// String literal
    String(String),
    /// Boolean literal
    Boolean(bool),
    /// Error literal
    Error(CellError),

    // === References ===
    /// Single cell reference
    CellRef(CellReference),
    /// Range reference
    RangeRef(RangeReference),
    /// Bare identifier that is not a function call
    NameRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    /// Function call; `name` is uppercased by the parser
    Function { name: String, args: Vec<FormulaExpr> },

    // === Array ===
    /// Array constant, rows of columns
    Array(Vec<Vec<FormulaExpr>>),
}

impl FormulaExpr {
    /// Build a binary node
    pub fn binary(op: BinaryOperator, left: FormulaExpr, right: FormulaExpr) -> Self {
        FormulaExpr::BinaryOp {
            op,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    /// Build a unary node
    pub fn unary(op: UnaryOperator, operand: FormulaExpr) -> Self {
        FormulaExpr::UnaryOp {
            op,
            operand: Box::new(operand),
        }
    }

    /// Names of every function called anywhere in the tree (uppercase, in
    /// pre-order, duplicates kept)
    pub fn function_names(&self) -> Vec<&str> {
        let mut names = Vec::new();
        self.collect_function_names(&mut names);
        names
    }

    fn collect_function_names<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            FormulaExpr::Function { name, args } => {
                out.push(name);
                args.iter().for_each(|a| a.collect_function_names(out));
            }
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.collect_function_names(out);
                right.collect_function_names(out);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.collect_function_names(out),
            FormulaExpr::Array(rows) => rows
                .iter()
                .flatten()
                .for_each(|e| e.collect_function_names(out)),
            _ => {}
        }
    }
}

impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Number(n) => write!(f, "{n}"),
            FormulaExpr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            FormulaExpr::Boolean(b) => f.write_str(if *b { "TRUE" } else { "FALSE" }),
            FormulaExpr::Error(e) => write!(f, "{e}"),
            FormulaExpr::CellRef(r) => write!(f, "{r}"),
            FormulaExpr::RangeRef(r) => write!(f, "{r}"),
            FormulaExpr::NameRef(name) => f.write_str(name),
            FormulaExpr::BinaryOp { op, left, right } => write!(f, "({left}{op}{right})"),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => write!(f, "-{operand}"),
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Percent,
                operand,
            } => write!(f, "{operand}%"),
            FormulaExpr::Function { name, args } => {
                write!(f, "{name}(")?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(",")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
            FormulaExpr::Array(rows) => {
                f.write_str("{")?;
                for (r, row) in rows.iter().enumerate() {
                    if r > 0 {
                        f.write_str(";")?;
                    }
                    for (c, item) in row.iter().enumerate() {
                        if c > 0 {
                            f.write_str(",")?;
                        }
                        write!(f, "{item}")?;
                    }
                }
                f.write_str("}")
            }
        }
    }
}

/// Cell reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct CellReference {
    pub sheet: Option<String>,
    pub address: CellAddress,
}

impl fmt::Display for CellReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", SheetReference::quote_sheet(sheet))?;
        }
        write!(f, "{}", self.address)
    }
}

/// Range reference with optional sheet
#[derive(Debug, Clone, PartialEq)]
pub struct RangeReference {
    pub sheet: Option<String>,
    pub range: CellRange,
}

impl fmt::Display for RangeReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(sheet) = &self.sheet {
            write!(f, "{}!", SheetReference::quote_sheet(sheet))?;
        }
        write!(f, "{}:{}", self.range.start, self.range.end)
    }
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,
    Power,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,

    // Text
    Concat,
}

impl BinaryOperator {
    /// Operator as written in formula text
    pub fn symbol(self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Power => "^",
            BinaryOperator::Equal => "=",
            BinaryOperator::NotEqual => "<>",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
            BinaryOperator::Concat => "&",
        }
    }

    /// Whether the operator produces a boolean comparison result
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinaryOperator::Equal
                | BinaryOperator::NotEqual
                | BinaryOperator::LessThan
                | BinaryOperator::LessEqual
                | BinaryOperator::GreaterThan
                | BinaryOperator::GreaterEqual
        )
    }
}

impl fmt::Display for BinaryOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
    Percent,
}
