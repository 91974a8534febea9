//! AST-to-executable compilation.
//!
//! Compilation happens once per formula, at graph-build time: references are
//! resolved against the owning sheet, function names are looked up in the
//! provider and the resulting `Arc<dyn Function>` is baked into the
//! expression, and argument counts are checked. Evaluation then runs the
//! compiled tree with no name resolution left to do.

use std::sync::Arc;

use cellgraph_common::LiteralValue;
use cellgraph_parse::{AstKind, AstNode};

use crate::error::FormulaError;
use crate::function::{Function, FunctionProvider};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Neg,
    Plus,
    /// Postfix `%`, divides by 100.
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
    Concat,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

/// A compiled expression. References have been flattened to addresses and
/// calls carry their implementation.
#[derive(Clone)]
pub enum CompiledExpr {
    Literal(LiteralValue),
    Cell(cellgraph_common::Address),
    Range(cellgraph_common::Address),
    Unary {
        op: UnaryOp,
        expr: Box<CompiledExpr>,
    },
    Binary {
        op: BinaryOp,
        left: Box<CompiledExpr>,
        right: Box<CompiledExpr>,
    },
    Call {
        name: String,
        func: Arc<dyn Function>,
        args: Vec<CompiledExpr>,
    },
}

impl std::fmt::Debug for CompiledExpr {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CompiledExpr::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            CompiledExpr::Cell(a) => f.debug_tuple("Cell").field(a).finish(),
            CompiledExpr::Range(a) => f.debug_tuple("Range").field(a).finish(),
            CompiledExpr::Unary { op, expr } => f
                .debug_struct("Unary")
                .field("op", op)
                .field("expr", expr)
                .finish(),
            CompiledExpr::Binary { op, left, right } => f
                .debug_struct("Binary")
                .field("op", op)
                .field("left", left)
                .field("right", right)
                .finish(),
            CompiledExpr::Call { name, args, .. } => f
                .debug_struct("Call")
                .field("name", name)
                .field("args", args)
                .finish(),
        }
    }
}

pub fn compile(
    ast: &AstNode,
    default_sheet: &str,
    functions: &dyn FunctionProvider,
) -> Result<CompiledExpr, FormulaError> {
    match &ast.kind {
        AstKind::Literal(value) => Ok(CompiledExpr::Literal(value.clone())),

        AstKind::Reference { reference, .. } => {
            let address = reference.to_address(default_sheet);
            if address.is_range() {
                Ok(CompiledExpr::Range(address))
            } else {
                Ok(CompiledExpr::Cell(address))
            }
        }

        AstKind::UnaryOp { op, expr } => {
            let op = match op.as_str() {
                "-" => UnaryOp::Neg,
                "+" => UnaryOp::Plus,
                "%" => UnaryOp::Percent,
                other => return Err(FormulaError::UnsupportedOperator(other.to_string())),
            };
            Ok(CompiledExpr::Unary {
                op,
                expr: Box::new(compile(expr, default_sheet, functions)?),
            })
        }

        AstKind::BinaryOp { op, left, right } => {
            let op = match op.as_str() {
                "+" => BinaryOp::Add,
                "-" => BinaryOp::Sub,
                "*" => BinaryOp::Mul,
                "/" => BinaryOp::Div,
                "^" => BinaryOp::Pow,
                "&" => BinaryOp::Concat,
                "=" => BinaryOp::Eq,
                "<>" => BinaryOp::Ne,
                "<" => BinaryOp::Lt,
                "<=" => BinaryOp::Le,
                ">" => BinaryOp::Gt,
                ">=" => BinaryOp::Ge,
                other => return Err(FormulaError::UnsupportedOperator(other.to_string())),
            };
            Ok(CompiledExpr::Binary {
                op,
                left: Box::new(compile(left, default_sheet, functions)?),
                right: Box::new(compile(right, default_sheet, functions)?),
            })
        }

        AstKind::Function { name, args } => {
            let func = functions
                .get_function(name)
                .ok_or_else(|| FormulaError::UnknownFunction(name.clone()))?;
            if args.len() < func.min_args() {
                return Err(FormulaError::Arity {
                    name: name.clone(),
                    min: func.min_args(),
                    got: args.len(),
                });
            }
            let args = args
                .iter()
                .map(|a| compile(a, default_sheet, functions))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(CompiledExpr::Call {
                name: name.clone(),
                func,
                args,
            })
        }
    }
}
