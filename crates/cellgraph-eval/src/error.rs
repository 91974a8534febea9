//! Engine failure types.
//!
//! These are the engine's own errors (graph construction, cycles, missing
//! cells), distinct from the spreadsheet-visible [`CellError`] codes a
//! formula can legitimately evaluate to.

use cellgraph_common::{Address, CellError};
use cellgraph_parse::ParseError;
use thiserror::Error;

/// A resolver could not produce a snapshot for the requested location.
#[derive(Debug, Clone, Error)]
#[error("cannot resolve `{reference}` on sheet `{sheet}`: {message}")]
pub struct ResolveError {
    pub sheet: String,
    pub reference: String,
    pub message: String,
}

impl ResolveError {
    pub fn new(
        sheet: impl Into<String>,
        reference: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        ResolveError {
            sheet: sheet.into(),
            reference: reference.into(),
            message: message.into(),
        }
    }
}

/// A formula failed to compile into an executable expression.
#[derive(Debug, Error)]
pub enum FormulaError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("unknown function `{0}`")]
    UnknownFunction(String),

    #[error("`{name}` requires at least {min} argument(s), got {got}")]
    Arity {
        name: String,
        min: usize,
        got: usize,
    },

    #[error("operator `{0}` is not supported")]
    UnsupportedOperator(String),
}

/// Graph construction failed. The offending cell and its formula text ride
/// along so callers can point at the exact input.
#[derive(Debug, Error)]
pub enum GraphBuildError {
    #[error("cell {address} formula `{formula}` is invalid: {source}")]
    Formula {
        address: Address,
        formula: String,
        source: FormulaError,
    },

    #[error(transparent)]
    Resolve(#[from] ResolveError),
}

/// Evaluation failed.
#[derive(Debug, Error)]
pub enum EvalError {
    #[error("circular reference through {0}")]
    CycleDetected(Address),

    #[error("reset re-entered {0} while already resetting it")]
    ResetInProgress(Address),

    #[error("no graph node for {0}")]
    UnknownAddress(Address),

    #[error("{0}")]
    Value(CellError),

    /// A failure inside a referenced cell, wrapped with the location (and
    /// formula, when there is one) where it surfaced.
    #[error("error in {address}{}: {source}", .formula.as_deref().map(|f| format!(" (`{f}`)")).unwrap_or_default())]
    Inner {
        address: Address,
        formula: Option<String>,
        #[source]
        source: Box<EvalError>,
    },
}

impl From<CellError> for EvalError {
    fn from(e: CellError) -> Self {
        EvalError::Value(e)
    }
}

impl EvalError {
    /// The innermost failure, unwrapping any location wrappers.
    pub fn root_cause(&self) -> &EvalError {
        match self {
            EvalError::Inner { source, .. } => source.root_cause(),
            other => other,
        }
    }
}
