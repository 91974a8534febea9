//! The seam between the engine and cell storage.
//!
//! A [`CellResolver`] hands the graph builder snapshots of cell content
//! (formula text and/or a stored value). The engine never reads storage
//! after the graph is built; everything it needs is captured in the nodes.

use cellgraph_common::{Coord, LiteralValue};

use crate::error::ResolveError;

/// What a cell looked like when the graph was built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CellSnapshot {
    /// Formula text including the leading `=`, if the cell holds a formula.
    pub formula: Option<String>,
    /// Stored (non-formula) value, if any.
    pub value: Option<LiteralValue>,
}

impl CellSnapshot {
    pub fn formula(text: impl Into<String>) -> Self {
        CellSnapshot {
            formula: Some(text.into()),
            value: None,
        }
    }

    pub fn value(v: LiteralValue) -> Self {
        CellSnapshot {
            formula: None,
            value: Some(v),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.formula.is_none() && self.value.is_none()
    }
}

/// A rectangular block of snapshots, row-major.
#[derive(Debug, Clone)]
pub struct RangeSnapshot {
    pub rows: u32,
    pub cols: u32,
    pub cells: Vec<(Coord, CellSnapshot)>,
}

/// Storage access used during graph construction.
pub trait CellResolver {
    fn resolve_cell(&self, sheet: &str, coord: Coord) -> Result<CellSnapshot, ResolveError>;

    fn resolve_range(
        &self,
        sheet: &str,
        start: Coord,
        end: Coord,
    ) -> Result<RangeSnapshot, ResolveError>;
}
