//! Built-in spreadsheet functions.
//!
//! A deliberately small set: enough aggregation, logic, and lookup to
//! exercise every engine path (scalar args, eager ranges, lazy ranges).

use std::sync::Arc;

use cellgraph_common::{CellError, CellErrorKind, LiteralValue};

use crate::error::EvalError;
use crate::function::{ArgValue, Function, FunctionContext};

pub fn all() -> Vec<Arc<dyn Function>> {
    vec![
        Arc::new(Sum),
        Arc::new(Min),
        Arc::new(Max),
        Arc::new(Count),
        Arc::new(If),
        Arc::new(And),
        Arc::new(Or),
        Arc::new(Not),
        Arc::new(Abs),
        Arc::new(Index),
    ]
}

/// Numeric view of a value for aggregation. Empty counts as zero; errors
/// propagate; text is a `#VALUE!`.
fn coerce_number(value: &LiteralValue) -> Result<f64, EvalError> {
    match value {
        LiteralValue::Empty => Ok(0.0),
        LiteralValue::Error(e) => Err(EvalError::Value(e.clone())),
        other => other.as_serial_number().ok_or_else(|| {
            EvalError::Value(
                CellError::new(CellErrorKind::Value)
                    .with_message(format!("`{other}` is not numeric")),
            )
        }),
    }
}

/// Visit every scalar inside an argument list, forcing range members one by
/// one. Arrays nested in scalars are walked too.
fn for_each_scalar(
    args: &[ArgValue],
    ctx: &mut dyn FunctionContext,
    visit: &mut dyn FnMut(&LiteralValue) -> Result<(), EvalError>,
) -> Result<(), EvalError> {
    fn walk(
        value: &LiteralValue,
        visit: &mut dyn FnMut(&LiteralValue) -> Result<(), EvalError>,
    ) -> Result<(), EvalError> {
        if let LiteralValue::Array(rows) = value {
            for row in rows {
                for v in row {
                    walk(v, visit)?;
                }
            }
            Ok(())
        } else {
            visit(value)
        }
    }

    for arg in args {
        match arg {
            ArgValue::Value(v) => walk(v, visit)?,
            ArgValue::Range(handle) => {
                for addr in handle.members() {
                    let v = ctx.value_of(addr)?;
                    walk(&v, visit)?;
                }
            }
        }
    }
    Ok(())
}

struct Sum;

impl Function for Sum {
    fn name(&self) -> &'static str {
        "SUM"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let mut total = 0.0;
        for_each_scalar(args, ctx, &mut |v| {
            total += coerce_number(v)?;
            Ok(())
        })?;
        Ok(LiteralValue::Number(total))
    }
}

struct Min;

impl Function for Min {
    fn name(&self) -> &'static str {
        "MIN"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let mut best: Option<f64> = None;
        for_each_scalar(args, ctx, &mut |v| {
            if !matches!(v, LiteralValue::Empty) {
                let n = coerce_number(v)?;
                best = Some(best.map_or(n, |b| b.min(n)));
            }
            Ok(())
        })?;
        Ok(LiteralValue::Number(best.unwrap_or(0.0)))
    }
}

struct Max;

impl Function for Max {
    fn name(&self) -> &'static str {
        "MAX"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let mut best: Option<f64> = None;
        for_each_scalar(args, ctx, &mut |v| {
            if !matches!(v, LiteralValue::Empty) {
                let n = coerce_number(v)?;
                best = Some(best.map_or(n, |b| b.max(n)));
            }
            Ok(())
        })?;
        Ok(LiteralValue::Number(best.unwrap_or(0.0)))
    }
}

struct Count;

impl Function for Count {
    fn name(&self) -> &'static str {
        "COUNT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let mut count = 0i64;
        for_each_scalar(args, ctx, &mut |v| {
            if !matches!(v, LiteralValue::Error(_)) && v.as_serial_number().is_some() {
                count += 1;
            }
            Ok(())
        })?;
        Ok(LiteralValue::Int(count))
    }
}

struct If;

impl Function for If {
    fn name(&self) -> &'static str {
        "IF"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let cond = args[0].clone().into_value(ctx)?;
        if let LiteralValue::Error(e) = cond {
            return Err(EvalError::Value(e));
        }
        let branch = if cond.is_truthy() {
            args.get(1).cloned()
        } else {
            args.get(2).cloned()
        };
        match branch {
            Some(arg) => arg.into_value(ctx),
            None => Ok(LiteralValue::Boolean(false)),
        }
    }
}

struct And;

impl Function for And {
    fn name(&self) -> &'static str {
        "AND"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let mut result = true;
        for_each_scalar(args, ctx, &mut |v| {
            if let LiteralValue::Error(e) = v {
                return Err(EvalError::Value(e.clone()));
            }
            result = result && v.is_truthy();
            Ok(())
        })?;
        Ok(LiteralValue::Boolean(result))
    }
}

struct Or;

impl Function for Or {
    fn name(&self) -> &'static str {
        "OR"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let mut result = false;
        for_each_scalar(args, ctx, &mut |v| {
            if let LiteralValue::Error(e) = v {
                return Err(EvalError::Value(e.clone()));
            }
            result = result || v.is_truthy();
            Ok(())
        })?;
        Ok(LiteralValue::Boolean(result))
    }
}

struct Not;

impl Function for Not {
    fn name(&self) -> &'static str {
        "NOT"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let v = args[0].clone().into_value(ctx)?;
        if let LiteralValue::Error(e) = v {
            return Err(EvalError::Value(e));
        }
        Ok(LiteralValue::Boolean(!v.is_truthy()))
    }
}

struct Abs;

impl Function for Abs {
    fn name(&self) -> &'static str {
        "ABS"
    }

    fn min_args(&self) -> usize {
        1
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let n = coerce_number(&args[0].clone().into_value(ctx)?)?;
        Ok(LiteralValue::Number(n.abs()))
    }
}

/// `INDEX(range, row, [col])` — pulls exactly one member of the range, which
/// is why it takes the range lazily instead of materializing it.
struct Index;

impl Function for Index {
    fn name(&self) -> &'static str {
        "INDEX"
    }

    fn min_args(&self) -> usize {
        2
    }

    fn eval(
        &self,
        args: &[ArgValue],
        ctx: &mut dyn FunctionContext,
    ) -> Result<LiteralValue, EvalError> {
        let ArgValue::Range(handle) = &args[0] else {
            return Err(EvalError::Value(
                CellError::new(CellErrorKind::Value).with_message("INDEX needs a range"),
            ));
        };
        let row = coerce_number(&args[1].clone().into_value(ctx)?)? as u32;
        let col = match args.get(2) {
            Some(arg) => coerce_number(&arg.clone().into_value(ctx)?)? as u32,
            None => 1,
        };
        if row == 0 || col == 0 {
            return Err(EvalError::Value(
                CellError::new(CellErrorKind::Value).with_message("INDEX positions are 1-based"),
            ));
        }
        match handle.member(row - 1, col - 1) {
            Some(addr) => {
                let addr = addr.clone();
                ctx.value_of(&addr)
            }
            None => Err(EvalError::Value(
                CellError::new(CellErrorKind::Ref).with_message("INDEX position outside range"),
            )),
        }
    }
}
