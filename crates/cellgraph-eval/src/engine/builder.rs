//! Work-list graph construction.
//!
//! Starting from seed cells, each formula is parsed and compiled against its
//! owning sheet, its references become edges, and newly discovered cells
//! join the work list. Range references get a dedicated pass-through node
//! whose members are wired member → range so invalidation fans out through
//! it.

use std::collections::VecDeque;
use std::sync::Arc;

use cellgraph_common::Address;
use cellgraph_parse::parse_formula;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::compile::compile;
use crate::engine::node::{Node, NodeFlags, NodeId, NodeKind};
use crate::error::{FormulaError, GraphBuildError};
use crate::function::FunctionProvider;
use crate::resolver::{CellResolver, CellSnapshot};

pub(crate) struct GraphBuilder<'a> {
    resolver: &'a dyn CellResolver,
    functions: &'a dyn FunctionProvider,
    nodes: Vec<Node>,
    cellmap: FxHashMap<Address, NodeId>,
    queue: VecDeque<Address>,
    visited: FxHashSet<Address>,
}

impl<'a> GraphBuilder<'a> {
    pub fn new(resolver: &'a dyn CellResolver, functions: &'a dyn FunctionProvider) -> Self {
        GraphBuilder {
            resolver,
            functions,
            nodes: Vec::new(),
            cellmap: FxHashMap::default(),
            queue: VecDeque::new(),
            visited: FxHashSet::default(),
        }
    }

    pub fn build(
        mut self,
        seeds: &[Address],
    ) -> Result<(Vec<Node>, FxHashMap<Address, NodeId>), GraphBuildError> {
        for seed in seeds {
            self.queue.push_back(seed.clone());
        }

        while let Some(address) = self.queue.pop_front() {
            if !self.visited.insert(address.clone()) {
                continue;
            }
            let Address::Cell { sheet, coord } = &address else {
                // range seeds are reached through formulas only
                continue;
            };
            let snapshot = self.resolver.resolve_cell(sheet, *coord)?;
            let id = self.ensure_cell(&address);
            self.populate(id, &address, snapshot)?;
        }

        Ok((self.nodes, self.cellmap))
    }

    /// Node for the address, creating an unpopulated placeholder if absent.
    fn ensure_cell(&mut self, address: &Address) -> NodeId {
        if let Some(&id) = self.cellmap.get(address) {
            return id;
        }
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::cell(address.clone()));
        self.cellmap.insert(address.clone(), id);
        id
    }

    fn populate(
        &mut self,
        id: NodeId,
        address: &Address,
        snapshot: CellSnapshot,
    ) -> Result<(), GraphBuildError> {
        let Some(formula) = snapshot.formula else {
            if let NodeKind::Cell { value, .. } = &mut self.nodes[id.as_index()].kind {
                *value = snapshot.value;
            }
            return Ok(());
        };

        let sheet = address.sheet().to_string();
        let wrap = |source: FormulaError| GraphBuildError::Formula {
            address: address.clone(),
            formula: formula.clone(),
            source,
        };

        let ast = parse_formula(&formula).map_err(|e| wrap(FormulaError::Parse(e)))?;
        let compiled = compile(&ast, &sheet, self.functions).map_err(wrap)?;

        // one edge per distinct reference, in source order
        let mut seen: FxHashSet<Address> = FxHashSet::default();
        for reference in ast.references() {
            let dep = reference.to_address(&sheet);
            if !seen.insert(dep.clone()) {
                continue;
            }
            if dep.is_range() {
                self.wire_range(&dep, id)?;
            } else {
                let dep_id = self.ensure_cell(&dep);
                self.nodes[dep_id.as_index()].push_dependent(id);
                self.queue.push_back(dep);
            }
        }

        let node = &mut self.nodes[id.as_index()];
        if let NodeKind::Cell {
            formula: slot,
            compiled: compiled_slot,
            value,
        } = &mut node.kind
        {
            *slot = Some(formula);
            *compiled_slot = Some(Arc::new(compiled));
            *value = None;
        }
        node.flags.insert(NodeFlags::DIRTY);
        Ok(())
    }

    /// Create (or reuse) the pass-through node for a range and hook up both
    /// sides: members feed the range, the range feeds its consumer.
    fn wire_range(&mut self, range: &Address, consumer: NodeId) -> Result<(), GraphBuildError> {
        if let Some(&rid) = self.cellmap.get(range) {
            self.nodes[rid.as_index()].push_dependent(consumer);
            return Ok(());
        }

        let Address::Range { sheet, start, end } = range else {
            unreachable!("wire_range is only called with range addresses");
        };
        let snapshot = self.resolver.resolve_range(sheet, *start, *end)?;

        let members: Arc<[Address]> = snapshot
            .cells
            .iter()
            .map(|(coord, _)| Address::cell(sheet.clone(), coord.row, coord.col))
            .collect();

        let rid = NodeId(self.nodes.len() as u32);
        self.nodes.push(Node::range(
            range.clone(),
            members.clone(),
            snapshot.rows,
            snapshot.cols,
        ));
        self.cellmap.insert(range.clone(), rid);
        self.nodes[rid.as_index()].push_dependent(consumer);

        for (member, (_, cell_snapshot)) in members.iter().zip(snapshot.cells) {
            let mid = self.ensure_cell(member);
            self.nodes[mid.as_index()].push_dependent(rid);
            if self.visited.insert(member.clone()) {
                self.populate(mid, member, cell_snapshot)?;
            }
        }
        Ok(())
    }
}
