use std::collections::{BTreeMap, HashMap};

use log::debug;

use crate::error::{PhyloError, PhyloResult};
use crate::matrix::DistanceMatrix;
use crate::phylo::RootedTree;

struct Cluster {
    members: Vec<usize>,
    tree: RootedTree,
    age: f64,
}

/// UPGMA: agglomerative clustering over average pairwise distances,
/// producing a rooted ultrametric tree.
///
/// The working collection is keyed by cluster label in a `BTreeMap`, so the
/// minimum search scans ordered label pairs `(c1, c2)`, `c1 < c2`, with a
/// strict `<` comparison: on ties the first pair in ascending label order
/// wins. That makes merge order fully deterministic and reproducible.
///
/// Branch lengths are placeholders until the whole cluster-age schedule is
/// known, then finalized as `age(parent) - age(child)`. O(n^3) over n taxa.
pub fn upgma(d: &DistanceMatrix) -> PhyloResult<RootedTree> {
    let n = d.len();
    if n == 0 {
        return Err(PhyloError::invalid_matrix("UPGMA over an empty matrix"));
    }

    let mut clusters: BTreeMap<usize, Cluster> = (0..n)
        .map(|i| {
            (
                i,
                Cluster {
                    members: vec![i],
                    tree: RootedTree::leaf(i),
                    age: 0.0,
                },
            )
        })
        .collect();
    let mut ages: HashMap<usize, f64> = (0..n).map(|i| (i, 0.0)).collect();
    let mut next_label = n;

    while clusters.len() > 1 {
        // full scan for the closest pair, ascending (c1, c2) label order
        let labels: Vec<usize> = clusters.keys().copied().collect();
        let mut best: Option<(usize, usize, f64)> = None;
        for (pos, &c1) in labels.iter().enumerate() {
            for &c2 in &labels[pos + 1..] {
                let dist = d.cluster_distance(&clusters[&c1].members, &clusters[&c2].members)?;
                if best.map_or(true, |(_, _, b)| dist < b) {
                    best = Some((c1, c2, dist));
                }
            }
        }
        let (c1, c2, dist) = best.expect("at least two clusters remain");
        debug!(
            "merging clusters {} and {} at distance {} into {}",
            c1, c2, dist, next_label
        );

        let first = clusters.remove(&c1).expect("cluster present");
        let second = clusters.remove(&c2).expect("cluster present");

        let age = dist / 2.0;
        let mut members = first.members;
        members.extend(second.members);
        members.sort_unstable();

        let tree = RootedTree::with_children(
            next_label,
            vec![(first.tree, 0.0), (second.tree, 0.0)],
        );
        ages.insert(next_label, age);
        clusters.insert(next_label, Cluster { members, tree, age });
        next_label += 1;
    }

    let mut root = clusters
        .into_values()
        .next()
        .expect("exactly one cluster remains")
        .tree;
    finalize_branch_lengths(&mut root, &ages);
    Ok(root)
}

/// Second phase: turn placeholder lengths into age differences.
fn finalize_branch_lengths(node: &mut RootedTree, ages: &HashMap<usize, f64>) {
    let parent_age = ages.get(&node.label).copied().unwrap_or(0.0);
    for (child, len) in &mut node.children {
        let child_age = ages.get(&child.label).copied().unwrap_or(0.0);
        *len = parent_age - child_age;
        finalize_branch_lengths(child, ages);
    }
}
