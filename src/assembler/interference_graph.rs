// Interference graph for register allocation.
//
// Nodes are the IR registers that appear in at least one live-out set. An
// undirected edge (u, v) means u and v are live at the same time somewhere
// and must reside in different physical registers.
//
// Construction: for every instruction, connect each pair of members of its
// live-out set. Nothing else contributes edges; calls and divisions are
// handled by the allocator's register-class policy instead of precolored
// nodes.
//
// Storage is an arena: node slots in `nodes`, a name-to-slot map, and one
// ordered neighbour set per slot. The allocator marks nodes removed in a
// separate bitset rather than deleting them from here.

use std::collections::BTreeSet;

use rustc_hash::FxHashMap;

use crate::assembler::liveness::LivenessInfo;
use crate::cfg::three_address_code::Reg;

pub type NodeId = usize;

#[derive(Clone, Debug, Default)]
pub struct InterferenceGraph {
    nodes: Vec<Reg>,
    index: FxHashMap<Reg, NodeId>,
    /// Undirected adjacency.  Every edge (u,v) is stored in both
    /// `adj[u]` and `adj[v]`.
    adj: Vec<BTreeSet<NodeId>>,
}

impl InterferenceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Slot for `reg`, creating it if needed.
    pub fn ensure_node(&mut self, reg: &Reg) -> NodeId {
        if let Some(&n) = self.index.get(reg) {
            return n;
        }
        let n = self.nodes.len();
        self.nodes.push(reg.clone());
        self.index.insert(reg.clone(), n);
        self.adj.push(BTreeSet::new());
        n
    }

    /// Add an undirected edge between `u` and `v`.  Self-edges are ignored.
    pub fn add_edge(&mut self, u: NodeId, v: NodeId) {
        if u == v {
            return;
        }
        self.adj[u].insert(v);
        self.adj[v].insert(u);
    }

    pub fn node_id(&self, reg: &Reg) -> Option<NodeId> {
        self.index.get(reg).copied()
    }

    pub fn reg(&self, n: NodeId) -> &Reg {
        &self.nodes[n]
    }

    pub fn regs(&self) -> &[Reg] {
        &self.nodes
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.adj.iter().map(|s| s.len()).sum::<usize>() / 2
    }

    pub fn degree(&self, n: NodeId) -> usize {
        self.adj[n].len()
    }

    pub fn neighbors(&self, n: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adj[n].iter().copied()
    }

    pub fn contains_edge(&self, a: &Reg, b: &Reg) -> bool {
        match (self.node_id(a), self.node_id(b)) {
            (Some(u), Some(v)) => self.adj[u].contains(&v),
            _ => false,
        }
    }
}

// ---------------------------------------------------------------------------
// Graph construction
// ---------------------------------------------------------------------------

/// Build the interference graph from per-instruction live-out sets.
pub fn build_interference_graph(liveness: &LivenessInfo) -> InterferenceGraph {
    let mut g = InterferenceGraph::new();

    for live in &liveness.live_out {
        let ids: Vec<NodeId> = live.iter().map(|r| g.ensure_node(r)).collect();
        for (k, &u) in ids.iter().enumerate() {
            for &v in &ids[k + 1..] {
                g.add_edge(u, v);
            }
        }
    }

    g
}
