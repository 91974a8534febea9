//! The function trait and the argument model.
//!
//! Functions receive ranges *unevaluated*: a [`RangeHandle`] names the
//! member cells but pulls no values. A function that only touches some
//! members (`INDEX`, a short-circuiting lookup) therefore only forces those
//! members through the [`FunctionContext`].

use std::sync::Arc;

use cellgraph_common::{Address, LiteralValue};

use crate::error::EvalError;

/// One evaluated (or deferred) argument to a function call.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Value(LiteralValue),
    Range(RangeHandle),
}

impl ArgValue {
    /// Force this argument to a scalar, pulling every member of a range.
    pub fn into_value(self, ctx: &mut dyn FunctionContext) -> Result<LiteralValue, EvalError> {
        match self {
            ArgValue::Value(v) => Ok(v),
            ArgValue::Range(handle) => handle.materialize(ctx),
        }
    }
}

/// A window onto a rectangular range. Holds member addresses only; values
/// are fetched on demand through the evaluation context.
#[derive(Debug, Clone)]
pub struct RangeHandle {
    pub address: Address,
    rows: u32,
    cols: u32,
    /// Row-major member addresses, rows × cols entries.
    members: Arc<[Address]>,
}

impl RangeHandle {
    pub fn new(address: Address, rows: u32, cols: u32, members: Arc<[Address]>) -> Self {
        debug_assert_eq!(members.len() as u32, rows * cols);
        RangeHandle {
            address,
            rows,
            cols,
            members,
        }
    }

    pub fn dimensions(&self) -> (u32, u32) {
        (self.rows, self.cols)
    }

    /// Member address at a 0-based (row, col) position within the range.
    pub fn member(&self, row: u32, col: u32) -> Option<&Address> {
        if row >= self.rows || col >= self.cols {
            return None;
        }
        self.members.get((row * self.cols + col) as usize)
    }

    pub fn members(&self) -> &[Address] {
        &self.members
    }

    /// Evaluate every member and pack the results into a row-major array.
    pub fn materialize(&self, ctx: &mut dyn FunctionContext) -> Result<LiteralValue, EvalError> {
        let mut grid = Vec::with_capacity(self.rows as usize);
        for r in 0..self.rows {
            let mut row = Vec::with_capacity(self.cols as usize);
            for c in 0..self.cols {
                let addr = &self.members[(r * self.cols + c) as usize];
                row.push(ctx.value_of(addr)?);
            }
            grid.push(row);
        }
        Ok(LiteralValue::Array(grid))
    }
}

/// The slice of the engine a function is allowed to see during a call:
/// demand-driven access to cell values.
pub trait FunctionContext {
    fn value_of(&mut self, address: &Address) -> Result<LiteralValue, EvalError>;
}

/// A callable spreadsheet function.
pub trait Function: Send + Sync {
    fn name(&self) -> &'static str;

    /// Minimum number of arguments; checked at compile time, before any
    /// evaluation happens.
    fn min_args(&self) -> usize {
        0
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError>;
}

/// Source of function implementations, resolved once per formula when the
/// expression is compiled.
pub trait FunctionProvider {
    fn get_function(&self, name: &str) -> Option<Arc<dyn Function>>;
}
