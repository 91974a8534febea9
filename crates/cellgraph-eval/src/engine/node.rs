//! Graph node storage.
//!
//! Nodes live in one arena `Vec` and refer to each other by index. Each node
//! records only its *dependents* (who reads me); dependencies are implicit
//! in the compiled expression and are re-walked during evaluation.

use std::sync::Arc;

use bitflags::bitflags;
use cellgraph_common::{Address, LiteralValue};
use smallvec::SmallVec;

use crate::compile::CompiledExpr;

/// Index of a node in the session arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub(crate) fn as_index(self) -> usize {
        self.0 as usize
    }
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub(crate) struct NodeFlags: u8 {
        /// Cached value is stale; next evaluation must recompute.
        const DIRTY = 0b0000_0001;
        /// Evaluation of this node is on the current call stack.
        const EVAL_IN_PROGRESS = 0b0000_0010;
        /// Reset cascade is currently visiting this node.
        const RESET_IN_PROGRESS = 0b0000_0100;
    }
}

#[derive(Debug)]
pub(crate) enum NodeKind {
    Cell {
        /// Original formula text, kept for diagnostics.
        formula: Option<String>,
        compiled: Option<Arc<CompiledExpr>>,
        value: Option<LiteralValue>,
    },
    /// A pass-through aggregation point. Never caches; it only fans
    /// invalidation out from members to range consumers and names its
    /// members for lazy access.
    Range {
        members: Arc<[Address]>,
        rows: u32,
        cols: u32,
    },
}

#[derive(Debug)]
pub(crate) struct Node {
    pub address: Address,
    pub kind: NodeKind,
    pub flags: NodeFlags,
    /// Nodes whose value depends on this one (edge dependency → dependent).
    pub dependents: SmallVec<[NodeId; 4]>,
}

impl Node {
    pub fn cell(address: Address) -> Self {
        Node {
            address,
            kind: NodeKind::Cell {
                formula: None,
                compiled: None,
                value: None,
            },
            flags: NodeFlags::empty(),
            dependents: SmallVec::new(),
        }
    }

    pub fn range(address: Address, members: Arc<[Address]>, rows: u32, cols: u32) -> Self {
        Node {
            address,
            kind: NodeKind::Range {
                members,
                rows,
                cols,
            },
            flags: NodeFlags::empty(),
            dependents: SmallVec::new(),
        }
    }

    pub fn is_range(&self) -> bool {
        matches!(self.kind, NodeKind::Range { .. })
    }

    pub fn cached_value(&self) -> Option<&LiteralValue> {
        match &self.kind {
            NodeKind::Cell { value, .. } => value.as_ref(),
            NodeKind::Range { .. } => None,
        }
    }

    /// Record a dependent edge, skipping duplicates. Dependent lists stay
    /// short, so a linear scan beats a set here.
    pub fn push_dependent(&mut self, id: NodeId) {
        if !self.dependents.contains(&id) {
            self.dependents.push(id);
        }
    }
}
