/// Rooted tree with integer node labels and weighted parent-to-child edges
/// (branch lengths). Leaves carry original taxon indices 0..n-1; internal
/// nodes get fresh labels >= n during clustering.
#[derive(Debug, Clone, PartialEq)]
pub struct RootedTree {
    pub label: usize,
    pub children: Vec<(RootedTree, f64)>,
}

impl RootedTree {
    pub fn leaf(label: usize) -> Self {
        RootedTree {
            label,
            children: Vec::new(),
        }
    }

    pub fn with_children(label: usize, children: Vec<(RootedTree, f64)>) -> Self {
        RootedTree { label, children }
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    pub fn leaf_count(&self) -> usize {
        if self.is_leaf() {
            1
        } else {
            self.children.iter().map(|(c, _)| c.leaf_count()).sum()
        }
    }

    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(|(c, _)| c.node_count())
            .sum::<usize>()
    }

    /// `(leaf label, summed branch length from the root)` pairs, ascending
    /// by label. On an ultrametric tree all depths are equal.
    pub fn leaf_depths(&self) -> Vec<(usize, f64)> {
        let mut out = Vec::new();
        self.collect_leaf_depths(0.0, &mut out);
        out.sort_by_key(|&(label, _)| label);
        out
    }

    fn collect_leaf_depths(&self, depth: f64, out: &mut Vec<(usize, f64)>) {
        if self.is_leaf() {
            out.push((self.label, depth));
            return;
        }
        for (child, len) in &self.children {
            child.collect_leaf_depths(depth + len, out);
        }
    }

    /// Preorder `(parent, child, branch length)` edge list.
    pub fn edges(&self) -> Vec<(usize, usize, f64)> {
        let mut out = Vec::new();
        self.collect_edges(&mut out);
        out
    }

    fn collect_edges(&self, out: &mut Vec<(usize, usize, f64)>) {
        for (child, len) in &self.children {
            out.push((self.label, child.label, *len));
            child.collect_edges(out);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> RootedTree {
        // 6 -> (4 -> 2, 3), (5 -> 0, 1)
        RootedTree::with_children(
            6,
            vec![
                (
                    RootedTree::with_children(
                        4,
                        vec![(RootedTree::leaf(2), 1.0), (RootedTree::leaf(3), 1.0)],
                    ),
                    1.0,
                ),
                (
                    RootedTree::with_children(
                        5,
                        vec![(RootedTree::leaf(0), 1.5), (RootedTree::leaf(1), 1.5)],
                    ),
                    0.5,
                ),
            ],
        )
    }

    #[test]
    fn counts() {
        let t = sample();
        assert_eq!(t.leaf_count(), 4);
        assert_eq!(t.node_count(), 7);
        assert!(!t.is_leaf());
        assert!(RootedTree::leaf(0).is_leaf());
    }

    #[test]
    fn leaf_depths_sorted_by_label() {
        let t = sample();
        assert_eq!(
            t.leaf_depths(),
            vec![(0, 2.0), (1, 2.0), (2, 2.0), (3, 2.0)]
        );
    }

    #[test]
    fn preorder_edges() {
        let t = sample();
        assert_eq!(
            t.edges(),
            vec![
                (6, 4, 1.0),
                (4, 2, 1.0),
                (4, 3, 1.0),
                (6, 5, 0.5),
                (5, 0, 1.5),
                (5, 1, 1.5),
            ]
        );
    }
}
