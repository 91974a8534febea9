//! The evaluation session: a built dependency graph plus the lazy,
//! memoizing evaluator and the invalidation cascade over it.
//!
//! Evaluation is demand-driven. Asking for a cell walks its compiled
//! expression, forcing dependencies recursively; results are cached on the
//! node and reused until an input change dirties the chain. Cycles are
//! caught with a per-node in-progress flag rather than an up-front
//! topological sort, so acyclic regions of a cyclic sheet still evaluate.

use std::cmp::Ordering;

use cellgraph_common::{Address, CellError, CellErrorKind, LiteralValue};
use rustc_hash::FxHashMap;

use crate::compile::{BinaryOp, CompiledExpr, UnaryOp};
use crate::engine::builder::GraphBuilder;
use crate::engine::node::{Node, NodeFlags, NodeId, NodeKind};
use crate::error::{EvalError, GraphBuildError};
use crate::function::{ArgValue, FunctionContext, FunctionProvider, RangeHandle};
use crate::function_registry::GlobalFunctions;
use crate::resolver::CellResolver;

#[derive(Debug)]
pub struct Session {
    nodes: Vec<Node>,
    cellmap: FxHashMap<Address, NodeId>,
}

impl Session {
    /// Build the dependency graph reachable from `seeds`, compiling every
    /// formula against the global function registry.
    pub fn build_graph(
        seeds: &[Address],
        resolver: &dyn CellResolver,
    ) -> Result<Self, GraphBuildError> {
        Self::build_graph_with(seeds, resolver, &GlobalFunctions)
    }

    /// Like [`Session::build_graph`] but with a caller-supplied function
    /// provider.
    pub fn build_graph_with(
        seeds: &[Address],
        resolver: &dyn CellResolver,
        functions: &dyn FunctionProvider,
    ) -> Result<Self, GraphBuildError> {
        let (nodes, cellmap) = GraphBuilder::new(resolver, functions).build(seeds)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(nodes = nodes.len(), "dependency graph built");
        Ok(Session { nodes, cellmap })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn contains(&self, address: &Address) -> bool {
        self.cellmap.contains_key(address)
    }

    pub fn addresses(&self) -> impl Iterator<Item = &Address> {
        self.nodes.iter().map(|n| &n.address)
    }

    /// Whether the node needs recomputation. `None` for unknown addresses.
    pub fn is_dirty(&self, address: &Address) -> Option<bool> {
        let id = self.cellmap.get(address)?;
        Some(self.nodes[id.as_index()].flags.contains(NodeFlags::DIRTY))
    }

    /// Addresses that read this one, directly.
    pub fn dependents_of(&self, address: &Address) -> Option<Vec<Address>> {
        let id = self.cellmap.get(address)?;
        Some(
            self.nodes[id.as_index()]
                .dependents
                .iter()
                .map(|d| self.nodes[d.as_index()].address.clone())
                .collect(),
        )
    }

    fn lookup(&self, address: &Address) -> Result<NodeId, EvalError> {
        self.cellmap
            .get(address)
            .copied()
            .ok_or_else(|| EvalError::UnknownAddress(address.clone()))
    }

    /// Evaluate one address, recomputing only what is dirty.
    pub fn evaluate(&mut self, address: &Address) -> Result<LiteralValue, EvalError> {
        let id = self.lookup(address)?;
        self.evaluate_node(id)
    }

    /// Store a value into a cell. Dependents are invalidated only when the
    /// value actually changed; writing into a previously empty cell counts
    /// as a change.
    pub fn set_value(&mut self, address: &Address, value: LiteralValue) -> Result<(), EvalError> {
        let id = self.lookup(address)?;
        if self.nodes[id.as_index()].is_range() {
            return Err(EvalError::Value(
                CellError::new(CellErrorKind::Value)
                    .with_message(format!("cannot write into range {address}")),
            ));
        }

        let changed = self.nodes[id.as_index()].cached_value() != Some(&value);
        #[cfg(feature = "tracing")]
        tracing::debug!(%address, changed, "set_value");
        if changed {
            self.reset_node(id, true)?;
        }
        let node = &mut self.nodes[id.as_index()];
        if let NodeKind::Cell { value: slot, .. } = &mut node.kind {
            *slot = Some(value);
        }
        node.flags.remove(NodeFlags::DIRTY);
        Ok(())
    }

    /// Drop the cached value at an address and dirty everything downstream
    /// of it.
    pub fn reset(&mut self, address: &Address) -> Result<(), EvalError> {
        let id = self.lookup(address)?;
        #[cfg(feature = "tracing")]
        tracing::debug!(%address, "reset");
        let cascade = self.cascade_for(id);
        self.reset_node(id, cascade)
    }

    /// A node's dependents only need invalidating if they could have read
    /// something from it: ranges always pass through, cells only once they
    /// hold a value.
    fn cascade_for(&self, id: NodeId) -> bool {
        let node = &self.nodes[id.as_index()];
        node.is_range() || node.cached_value().is_some()
    }

    fn reset_node(&mut self, id: NodeId, cascade: bool) -> Result<(), EvalError> {
        let node = &mut self.nodes[id.as_index()];
        if node.flags.contains(NodeFlags::RESET_IN_PROGRESS) {
            return Err(EvalError::ResetInProgress(node.address.clone()));
        }
        node.flags.insert(NodeFlags::RESET_IN_PROGRESS);
        let result = self.reset_inner(id, cascade);
        self.nodes[id.as_index()]
            .flags
            .remove(NodeFlags::RESET_IN_PROGRESS);
        result
    }

    fn reset_inner(&mut self, id: NodeId, cascade: bool) -> Result<(), EvalError> {
        let node = &mut self.nodes[id.as_index()];
        let was_dirty = node.flags.contains(NodeFlags::DIRTY) && !node.is_range();
        // stored inputs are dropped too; a reset cell reads as Empty until
        // the next set_value or recomputation
        if let NodeKind::Cell { value, .. } = &mut node.kind {
            *value = None;
        }
        if was_dirty {
            // dependents were already dirtied when this node went dirty
            return Ok(());
        }
        node.flags.insert(NodeFlags::DIRTY);

        if cascade {
            let dependents = node.dependents.clone();
            for dependent in dependents {
                let next = self.cascade_for(dependent);
                self.reset_node(dependent, next)?;
            }
        }
        Ok(())
    }

    fn evaluate_node(&mut self, id: NodeId) -> Result<LiteralValue, EvalError> {
        if self.nodes[id.as_index()]
            .flags
            .contains(NodeFlags::EVAL_IN_PROGRESS)
        {
            return Err(EvalError::CycleDetected(
                self.nodes[id.as_index()].address.clone(),
            ));
        }

        if self.nodes[id.as_index()].is_range() {
            let handle = self.range_handle(id);
            self.nodes[id.as_index()]
                .flags
                .insert(NodeFlags::EVAL_IN_PROGRESS);
            let result = handle.materialize(&mut SessionCtx { session: self });
            self.nodes[id.as_index()]
                .flags
                .remove(NodeFlags::EVAL_IN_PROGRESS);
            return result;
        }

        let (expr, formula) = {
            let node = &self.nodes[id.as_index()];
            let clean = !node.flags.contains(NodeFlags::DIRTY);
            let NodeKind::Cell {
                formula,
                compiled,
                value,
            } = &node.kind
            else {
                unreachable!("range nodes handled above");
            };
            match compiled {
                Some(expr) if !clean => (expr.clone(), formula.clone()),
                _ => return Ok(value.clone().unwrap_or(LiteralValue::Empty)),
            }
        };

        // clear the dirty bit before running: a formula observing itself
        // through a cycle must not find itself still dirty
        {
            let flags = &mut self.nodes[id.as_index()].flags;
            flags.remove(NodeFlags::DIRTY);
            flags.insert(NodeFlags::EVAL_IN_PROGRESS);
        }
        let result = self.eval_expr(&expr);
        let node = &mut self.nodes[id.as_index()];
        node.flags.remove(NodeFlags::EVAL_IN_PROGRESS);

        match result {
            Ok(v) => {
                if let NodeKind::Cell { value, .. } = &mut node.kind {
                    *value = Some(v.clone());
                }
                #[cfg(feature = "tracing")]
                tracing::trace!(address = %node.address, value = %v, "evaluated");
                Ok(v)
            }
            Err(e) => {
                // stay dirty so the failure reproduces on retry
                node.flags.insert(NodeFlags::DIRTY);
                let address = node.address.clone();
                Err(match e {
                    EvalError::Value(_) => EvalError::Inner {
                        address,
                        formula,
                        source: Box::new(e),
                    },
                    other => other,
                })
            }
        }
    }

    fn range_handle(&self, id: NodeId) -> RangeHandle {
        let node = &self.nodes[id.as_index()];
        let NodeKind::Range {
            members,
            rows,
            cols,
        } = &node.kind
        else {
            unreachable!("range_handle is only called on range nodes");
        };
        RangeHandle::new(node.address.clone(), *rows, *cols, members.clone())
    }

    fn eval_expr(&mut self, expr: &CompiledExpr) -> Result<LiteralValue, EvalError> {
        match expr {
            CompiledExpr::Literal(v) => Ok(v.clone()),
            CompiledExpr::Cell(address) | CompiledExpr::Range(address) => self.evaluate(address),
            CompiledExpr::Unary { op, expr } => {
                let v = self.eval_expr(expr)?;
                eval_unary(*op, v)
            }
            CompiledExpr::Binary { op, left, right } => {
                let l = self.eval_expr(left)?;
                let r = self.eval_expr(right)?;
                eval_binary(*op, l, r)
            }
            CompiledExpr::Call { func, args, .. } => {
                let mut arg_values = Vec::with_capacity(args.len());
                for arg in args {
                    match arg {
                        // a bare range argument stays lazy; the function
                        // decides which members to force
                        CompiledExpr::Range(address) => {
                            let id = self.lookup(address)?;
                            arg_values.push(ArgValue::Range(self.range_handle(id)));
                        }
                        other => arg_values.push(ArgValue::Value(self.eval_expr(other)?)),
                    }
                }
                let func = func.clone();
                func.eval(&arg_values, &mut SessionCtx { session: self })
            }
        }
    }
}

/// The view a function call gets of the session.
struct SessionCtx<'a> {
    session: &'a mut Session,
}

impl FunctionContext for SessionCtx<'_> {
    fn value_of(&mut self, address: &Address) -> Result<LiteralValue, EvalError> {
        self.session.evaluate(address)
    }
}

fn check_operand(v: LiteralValue) -> Result<LiteralValue, EvalError> {
    match v {
        LiteralValue::Error(e) => Err(EvalError::Value(e)),
        other => Ok(other),
    }
}

fn coerce_number(v: &LiteralValue) -> Result<f64, EvalError> {
    match v {
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

fn eval_unary(op: UnaryOp, v: LiteralValue) -> Result<LiteralValue, EvalError> {
    let v = check_operand(v)?;
    match op {
        UnaryOp::Plus => Ok(v),
        UnaryOp::Neg => Ok(LiteralValue::Number(-coerce_number(&v)?)),
        UnaryOp::Percent => Ok(LiteralValue::Number(coerce_number(&v)? / 100.0)),
    }
}

fn eval_binary(op: BinaryOp, l: LiteralValue, r: LiteralValue) -> Result<LiteralValue, EvalError> {
    let l = check_operand(l)?;
    let r = check_operand(r)?;

    let arith = |f: fn(f64, f64) -> f64| -> Result<LiteralValue, EvalError> {
        Ok(LiteralValue::Number(f(coerce_number(&l)?, coerce_number(&r)?)))
    };

    match op {
        BinaryOp::Add => arith(|a, b| a + b),
        BinaryOp::Sub => arith(|a, b| a - b),
        BinaryOp::Mul => arith(|a, b| a * b),
        BinaryOp::Pow => arith(f64::powf),
        BinaryOp::Div => {
            let divisor = coerce_number(&r)?;
            if divisor == 0.0 {
                return Err(EvalError::Value(CellError::new(CellErrorKind::Div)));
            }
            Ok(LiteralValue::Number(coerce_number(&l)? / divisor))
        }
        BinaryOp::Concat => Ok(LiteralValue::Text(format!("{l}{r}"))),
        BinaryOp::Eq => Ok(LiteralValue::Boolean(compare(&l, &r) == Some(Ordering::Equal))),
        BinaryOp::Ne => Ok(LiteralValue::Boolean(compare(&l, &r) != Some(Ordering::Equal))),
        BinaryOp::Lt | BinaryOp::Le | BinaryOp::Gt | BinaryOp::Ge => {
            let Some(ordering) = compare(&l, &r) else {
                return Err(EvalError::Value(CellError::new(CellErrorKind::Value)
                    .with_message(format!("cannot compare `{l}` with `{r}`"))));
            };
            let result = match op {
                BinaryOp::Lt => ordering == Ordering::Less,
                BinaryOp::Le => ordering != Ordering::Greater,
                BinaryOp::Gt => ordering == Ordering::Greater,
                BinaryOp::Ge => ordering != Ordering::Less,
                _ => unreachable!(),
            };
            Ok(LiteralValue::Boolean(result))
        }
    }
}

/// Spreadsheet comparison: numeric when both sides have a numeric view,
/// case-insensitive text when both are text.
fn compare(l: &LiteralValue, r: &LiteralValue) -> Option<Ordering> {
    if let (Some(a), Some(b)) = (l.as_serial_number(), r.as_serial_number()) {
        return a.partial_cmp(&b);
    }
    match (l, r) {
        (LiteralValue::Text(a), LiteralValue::Text(b)) => {
            Some(a.to_lowercase().cmp(&b.to_lowercase()))
        }
        (LiteralValue::Empty, LiteralValue::Text(b)) => Some("".cmp(b.to_lowercase().as_str())),
        (LiteralValue::Text(a), LiteralValue::Empty) => Some(a.to_lowercase().as_str().cmp("")),
        _ => None,
    }
}
