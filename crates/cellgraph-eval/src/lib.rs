//! Dependency-graph construction and lazy incremental evaluation.
//!
//! The engine works in two phases. [`Session::build_graph`] pulls cell
//! snapshots through a [`CellResolver`], compiles every formula once, and
//! wires the dependency graph. After that the resolver is never consulted
//! again: [`Session::evaluate`] recomputes on demand with memoization, and
//! [`Session::set_value`] / [`Session::reset`] cascade invalidation to
//! exactly the nodes that could have observed the change.
//!
//! ```
//! use cellgraph_eval::{Session, TestWorkbook, test_workbook::addr};
//! use cellgraph_common::LiteralValue;
//!
//! let wb = TestWorkbook::new()
//!     .with_number("A1", 10.0)
//!     .with_formula("B1", "=A1*2");
//! let mut session = Session::build_graph(&[addr("B1")], &wb).unwrap();
//! assert_eq!(session.evaluate(&addr("B1")).unwrap(), LiteralValue::Number(20.0));
//! ```

pub mod builtins;
pub mod compile;
pub mod error;
pub mod function;
pub mod function_registry;
pub mod resolver;
pub mod test_workbook;

mod engine;

pub use compile::{BinaryOp, CompiledExpr, UnaryOp, compile};
pub use engine::Session;
pub use error::{EvalError, FormulaError, GraphBuildError, ResolveError};
pub use function::{ArgValue, Function, FunctionContext, FunctionProvider, RangeHandle};
pub use function_registry::GlobalFunctions;
pub use resolver::{CellResolver, CellSnapshot, RangeSnapshot};
pub use test_workbook::TestWorkbook;
