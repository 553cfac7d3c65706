use std::collections::HashMap;

use fixedbitset::FixedBitSet;
use petgraph::stable_graph::{NodeIndex, StableGraph};
use petgraph::visit::NodeIndexable;
use petgraph::Undirected;

use crate::error::{PhyloError, PhyloResult};
use crate::matrix::DistanceMatrix;

/// Weighted undirected tree over integer-labelled nodes.
///
/// Node labels are arbitrary non-negative integers: taxa 0..n-1 plus
/// synthesized internal nodes with labels >= n. The fresh-label counter is
/// owned by the reconstruction engine, never by the tree. A **leaf** is any
/// node of degree exactly 1.
///
/// The structure is a tree (connected, acyclic) whenever it is handed back
/// to a caller, but it may pass through transient non-tree states during a
/// multi-step edit such as an edge split.
#[derive(Debug, Clone, Default)]
pub struct UnrootedTree {
    // node payload is the external label; edge payload is the branch weight
    graph: StableGraph<usize, f64, Undirected>,
    id2node: HashMap<usize, NodeIndex>,
}

impl UnrootedTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from `(a, b, weight)` triples.
    pub fn from_edges<I>(edges: I) -> PhyloResult<Self>
    where
        I: IntoIterator<Item = (usize, usize, f64)>,
    {
        let mut tree = Self::new();
        for (a, b, w) in edges {
            tree.add_edge(a, b, w)?;
        }
        Ok(tree)
    }

    fn ensure_node(&mut self, id: usize) -> NodeIndex {
        if let Some(&v) = self.id2node.get(&id) {
            return v;
        }
        let v = self.graph.add_node(id);
        self.id2node.insert(id, v);
        v
    }

    fn node(&self, id: usize) -> PhyloResult<NodeIndex> {
        self.id2node
            .get(&id)
            .copied()
            .ok_or(PhyloError::IndexOutOfRange {
                index: id,
                len: self.graph.node_count(),
            })
    }

    pub fn contains_node(&self, id: usize) -> bool {
        self.id2node.contains_key(&id)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// All node labels, ascending.
    pub fn node_ids(&self) -> Vec<usize> {
        let mut ids: Vec<usize> = self.id2node.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Neighbor labels of `id`, ascending.
    pub fn neighbors(&self, id: usize) -> PhyloResult<Vec<usize>> {
        let v = self.node(id)?;
        let mut out: Vec<usize> = self.graph.neighbors(v).map(|u| self.graph[u]).collect();
        out.sort_unstable();
        Ok(out)
    }

    /// Insert the undirected edge `(a, b)` with weight `w`, creating the
    /// endpoints as needed. Self-edges, negative weights, and duplicate
    /// edges are rejected.
    pub fn add_edge(&mut self, a: usize, b: usize, w: f64) -> PhyloResult<()> {
        if a == b {
            return Err(PhyloError::invalid_edge(format!("self-edge at node {a}")));
        }
        if !w.is_finite() || w < 0.0 {
            return Err(PhyloError::invalid_edge(format!(
                "edge ({a}, {b}) has invalid weight {w}"
            )));
        }
        if self.edge_weight(a, b).is_some() {
            return Err(PhyloError::invalid_edge(format!(
                "edge ({a}, {b}) already present"
            )));
        }
        let va = self.ensure_node(a);
        let vb = self.ensure_node(b);
        self.graph.add_edge(va, vb, w);
        Ok(())
    }

    /// Remove the edge `(a, b)` and return its weight. An endpoint left with
    /// no remaining edges is dropped from the tree, so `add_edge` followed by
    /// `remove_edge` restores the prior node set.
    pub fn remove_edge(&mut self, a: usize, b: usize) -> PhyloResult<f64> {
        let (va, vb) = match (self.id2node.get(&a), self.id2node.get(&b)) {
            (Some(&va), Some(&vb)) => (va, vb),
            _ => return Err(PhyloError::MissingEdge { a, b }),
        };
        let e = self
            .graph
            .find_edge(va, vb)
            .ok_or(PhyloError::MissingEdge { a, b })?;
        let w = self
            .graph
            .remove_edge(e)
            .ok_or(PhyloError::MissingEdge { a, b })?;
        for (id, v) in [(a, va), (b, vb)] {
            if self.graph.neighbors(v).count() == 0 {
                self.graph.remove_node(v);
                self.id2node.remove(&id);
            }
        }
        Ok(w)
    }

    /// Replace edge `(a, b)` by `(a, mid)` and `(mid, b)`, placing `mid` at
    /// `dist_from_a` along the original edge. `mid` must be a fresh label.
    pub fn split_edge(
        &mut self,
        a: usize,
        b: usize,
        mid: usize,
        dist_from_a: f64,
    ) -> PhyloResult<()> {
        if self.contains_node(mid) {
            return Err(PhyloError::invalid_edge(format!(
                "split node {mid} already present"
            )));
        }
        let w = match self.edge_weight(a, b) {
            Some(w) => w,
            None => return Err(PhyloError::MissingEdge { a, b }),
        };
        if dist_from_a < 0.0 || dist_from_a > w {
            return Err(PhyloError::invalid_edge(format!(
                "split point {dist_from_a} outside edge ({a}, {b}) of weight {w}"
            )));
        }
        self.remove_edge(a, b)?;
        self.add_edge(a, mid, dist_from_a)?;
        self.add_edge(mid, b, w - dist_from_a)?;
        Ok(())
    }

    /// Weight of the direct edge `(a, b)`, in either orientation.
    pub fn edge_weight(&self, a: usize, b: usize) -> Option<f64> {
        let va = *self.id2node.get(&a)?;
        let vb = *self.id2node.get(&b)?;
        let e = self.graph.find_edge(va, vb)?;
        self.graph.edge_weight(e).copied()
    }

    /// Unique simple path from `i` to `j` as a node-label sequence.
    ///
    /// Iterative depth-first search with a per-call visited set, so the
    /// query is reentrant and safe on a shared read-only tree. On a
    /// well-formed tree any traversal order finds the same unique path;
    /// failure to reach `j` means the structure is disconnected.
    pub fn path(&self, i: usize, j: usize) -> PhyloResult<Vec<usize>> {
        let start = self.node(i)?;
        let goal = self.node(j)?;
        if start == goal {
            return Ok(vec![i]);
        }

        let mut visited = FixedBitSet::with_capacity(self.graph.node_bound());
        let mut parent: HashMap<NodeIndex, NodeIndex> = HashMap::new();
        let mut stack = vec![start];
        visited.insert(start.index());

        while let Some(v) = stack.pop() {
            if v == goal {
                break;
            }
            for u in self.graph.neighbors(v) {
                if !visited.contains(u.index()) {
                    visited.insert(u.index());
                    parent.insert(u, v);
                    stack.push(u);
                }
            }
        }

        if !visited.contains(goal.index()) {
            return Err(PhyloError::NoPath { from: i, to: j });
        }

        let mut labels = vec![self.graph[goal]];
        let mut cur = goal;
        while let Some(&p) = parent.get(&cur) {
            labels.push(self.graph[p]);
            cur = p;
        }
        labels.reverse();
        Ok(labels)
    }

    /// Path length from `i` to `j`: the direct edge weight when adjacent,
    /// otherwise the sum of weights along `path(i, j)`.
    pub fn distance(&self, i: usize, j: usize) -> PhyloResult<f64> {
        if i == j {
            self.node(i)?;
            return Ok(0.0);
        }
        if let Some(w) = self.edge_weight(i, j) {
            return Ok(w);
        }
        let path = self.path(i, j)?;
        let mut total = 0.0;
        for pair in path.windows(2) {
            total += self
                .edge_weight(pair[0], pair[1])
                .ok_or(PhyloError::MissingEdge {
                    a: pair[0],
                    b: pair[1],
                })?;
        }
        Ok(total)
    }

    /// Labels of all degree-1 nodes, ascending.
    pub fn leaves(&self) -> Vec<usize> {
        let mut out: Vec<usize> = self
            .graph
            .node_indices()
            .filter(|&v| self.graph.neighbors(v).count() == 1)
            .map(|v| self.graph[v])
            .collect();
        out.sort_unstable();
        out
    }

    /// Canonicalised edge list: `(min, max, weight)` triples, ascending.
    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        let mut out: Vec<(usize, usize, f64)> = self
            .graph
            .edge_indices()
            .filter_map(|e| {
                let (va, vb) = self.graph.edge_endpoints(e)?;
                let w = *self.graph.edge_weight(e)?;
                let a = self.graph[va];
                let b = self.graph[vb];
                Some((a.min(b), a.max(b), w))
            })
            .collect();
        out.sort_by(|x, y| (x.0, x.1).cmp(&(y.0, y.1)));
        out
    }

    /// Rebuild the pairwise leaf-to-leaf distance matrix, with leaves taken
    /// in ascending label order.
    pub fn distance_matrix(&self) -> PhyloResult<DistanceMatrix> {
        let leaves = self.leaves();
        let n = leaves.len();
        let mut mat = ndarray::Array2::<f64>::zeros((n, n));
        for (ri, &i) in leaves.iter().enumerate() {
            for (rj, &j) in leaves.iter().enumerate().skip(ri + 1) {
                let dist = self.distance(i, j)?;
                mat[[ri, rj]] = dist;
                mat[[rj, ri]] = dist;
            }
        }
        DistanceMatrix::new(mat)
    }
}
