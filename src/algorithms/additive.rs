use ndarray::Array2;

use log::debug;

use crate::error::{PhyloError, PhyloResult};
use crate::matrix::distance_matrix::limb_length_in;
use crate::matrix::DistanceMatrix;
use crate::phylo::UnrootedTree;

/// Additive Phylogeny: exact reconstruction of the unrooted weighted tree
/// realizing an additive distance matrix.
///
/// Recursive divide-and-conquer on a private working copy: strip the last
/// taxon's limb, find where it attaches on the path between an `(i, k)`
/// witness pair, recurse on the remaining taxa, then re-attach. All searches
/// use a fixed order — `i` ascending then `k` ascending for the witness
/// pair, the attachment walk from `i` towards `k` — so the result is
/// reproducible for a given matrix. When the attachment point lands on an
/// existing path node (within the matrix tolerance), the leaf attaches there
/// directly; splitting an edge happens only for a strictly interior point.
///
/// Fresh internal labels come from a counter seeded at n and threaded
/// through the recursion. Non-additive input surfaces as
/// `PhyloError::NonAdditiveInput`; callers get no partial tree.
pub fn additive_phylogeny(d: &DistanceMatrix) -> PhyloResult<UnrootedTree> {
    let n = d.len();
    if n < 2 {
        return Err(PhyloError::invalid_matrix(format!(
            "additive phylogeny needs at least 2 taxa, matrix has {}",
            n
        )));
    }
    let mut work = d.values().clone();
    let mut next_label = n;
    reconstruct(&mut work, n, &mut next_label, d.tolerance())
}

/// One level of the recursion over the leading `n x n` block of `work`.
/// Rows/columns past `n` belong to enclosing levels and are never touched.
fn reconstruct(
    work: &mut Array2<f64>,
    n: usize,
    next_label: &mut usize,
    tol: f64,
) -> PhyloResult<UnrootedTree> {
    if n == 2 {
        let mut tree = UnrootedTree::new();
        tree.add_edge(0, 1, work[[0, 1]])?;
        return Ok(tree);
    }

    let last = n - 1;
    let limb = limb_length_in(work, n, last);

    // bald the last row/column: taxon n-1 now sits exactly on some i..k path
    for j in 0..last {
        work[[last, j]] -= limb;
        work[[j, last]] = work[[last, j]];
    }

    // witness pair: first (i, k) in ascending i-then-k order with
    // d[i][k] = d[i][n-1] + d[n-1][k]
    let mut witness: Option<(usize, usize)> = None;
    'search: for i in 0..last {
        for k in (i + 1)..last {
            if (work[[i, k]] - (work[[i, last]] + work[[last, k]])).abs() <= tol {
                witness = Some((i, k));
                break 'search;
            }
        }
    }
    let (i, k) = witness.ok_or(PhyloError::NonAdditiveInput)?;
    let x = work[[i, last]];
    debug!("taxon {last}: limb {limb}, attaches {x} along the {i}..{k} path");

    let mut tree = reconstruct(work, n - 1, next_label, tol)?;

    let host = attach_point(&mut tree, i, k, x, next_label, tol)?;
    tree.add_edge(last, host, limb)?;
    Ok(tree)
}

/// Walk the i-to-k path until the accumulated distance from `i` reaches `x`;
/// return the node to hang the new leaf on, splitting an edge if `x` falls
/// strictly between two path nodes. `x` may land on a taxon itself (a taxon
/// sitting exactly on another pair's path); the new leaf then hangs off that
/// taxon, which becomes degree-2 and internal.
fn attach_point(
    tree: &mut UnrootedTree,
    i: usize,
    k: usize,
    x: f64,
    next_label: &mut usize,
    tol: f64,
) -> PhyloResult<usize> {
    let path = tree.path(i, k)?;
    let mut acc = 0.0;
    for pair in path.windows(2) {
        let (a, b) = (pair[0], pair[1]);
        if (acc - x).abs() <= tol {
            return Ok(a);
        }
        let w = tree
            .edge_weight(a, b)
            .ok_or(PhyloError::MissingEdge { a, b })?;
        if acc + w > x + tol {
            let mid = *next_label;
            *next_label += 1;
            tree.split_edge(a, b, mid, x - acc)?;
            return Ok(mid);
        }
        acc += w;
    }
    // the attachment point may be the far endpoint itself
    if (acc - x).abs() <= tol {
        if let Some(&end) = path.last() {
            return Ok(end);
        }
    }
    Err(PhyloError::NonAdditiveInput)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn matrix(rows: Vec<Vec<f64>>) -> DistanceMatrix {
        DistanceMatrix::from_rows(rows).unwrap()
    }

    fn assert_round_trip(d: &DistanceMatrix) {
        let tree = additive_phylogeny(d).unwrap();
        let rebuilt = d_as_rows(&tree.distance_matrix().unwrap());
        let original = d_as_rows(d);
        for (i, (ro, rr)) in original.iter().zip(&rebuilt).enumerate() {
            for (j, (o, r)) in ro.iter().zip(rr).enumerate() {
                assert!(
                    (o - r).abs() < 1e-9,
                    "distance [{i}][{j}] differs: {o} vs {r}"
                );
            }
        }
    }

    fn d_as_rows(d: &DistanceMatrix) -> Vec<Vec<f64>> {
        (0..d.len())
            .map(|i| (0..d.len()).map(|j| d.get(i, j)).collect())
            .collect()
    }

    #[test]
    fn two_taxa_single_edge() {
        let d = matrix(vec![vec![0.0, 7.5], vec![7.5, 0.0]]);
        let tree = additive_phylogeny(&d).unwrap();
        assert_eq!(tree.edges(), vec![(0, 1, 7.5)]);
    }

    #[test]
    fn classic_four_taxon_matrix() {
        let d = matrix(vec![
            vec![0.0, 13.0, 21.0, 22.0],
            vec![13.0, 0.0, 12.0, 13.0],
            vec![21.0, 12.0, 0.0, 13.0],
            vec![22.0, 13.0, 13.0, 0.0],
        ]);
        let tree = additive_phylogeny(&d).unwrap();
        assert_eq!(
            tree.edges(),
            vec![
                (0, 4, 11.0),
                (1, 4, 2.0),
                (2, 5, 6.0),
                (3, 5, 7.0),
                (4, 5, 4.0),
            ]
        );
        assert_round_trip(&d);
    }

    #[test]
    fn round_trip_reproduces_input() {
        assert_round_trip(&matrix(vec![
            vec![0.0, 13.0, 21.0, 22.0],
            vec![13.0, 0.0, 12.0, 13.0],
            vec![21.0, 12.0, 0.0, 13.0],
            vec![22.0, 13.0, 13.0, 0.0],
        ]));
    }

    #[test]
    fn round_trip_five_taxa() {
        // Distances of the tree 0-5:2, 1-5:4, 5-6:3, 2-6:6, 6-7:2, 3-7:1, 4-7:5
        let d = matrix(vec![
            vec![0.0, 6.0, 11.0, 8.0, 12.0],
            vec![6.0, 0.0, 13.0, 10.0, 14.0],
            vec![11.0, 13.0, 0.0, 9.0, 13.0],
            vec![8.0, 10.0, 9.0, 0.0, 6.0],
            vec![12.0, 14.0, 13.0, 6.0, 0.0],
        ]);
        assert_round_trip(&d);
        let tree = additive_phylogeny(&d).unwrap();
        assert_eq!(tree.leaves(), vec![0, 1, 2, 3, 4]);
        // 5 leaves + 3 internal nodes
        assert_eq!(tree.node_count(), 8);
        assert_eq!(tree.edge_count(), 7);
    }

    #[test]
    fn attachment_on_existing_node_adds_no_internal_node() {
        // Star tree: 0-4:1, 1-4:2, 2-4:3, 3-4:4 — every later taxon attaches
        // exactly at the hub, so only one internal node ever exists.
        let d = matrix(vec![
            vec![0.0, 3.0, 4.0, 5.0],
            vec![3.0, 0.0, 5.0, 6.0],
            vec![4.0, 5.0, 0.0, 7.0],
            vec![5.0, 6.0, 7.0, 0.0],
        ]);
        let tree = additive_phylogeny(&d).unwrap();
        assert_eq!(tree.node_count(), 5);
        assert_eq!(tree.leaves(), vec![0, 1, 2, 3]);
        assert_round_trip(&d);
    }

    #[test]
    fn taxon_on_another_pairs_path_becomes_internal() {
        // Taxon 1 lies exactly on the 0..2 path, so taxon 2 hangs off it and
        // 1 drops out of the leaf set.
        let d = matrix(vec![
            vec![0.0, 2.0, 3.0],
            vec![2.0, 0.0, 1.0],
            vec![3.0, 1.0, 0.0],
        ]);
        let tree = additive_phylogeny(&d).unwrap();
        assert_eq!(tree.edges(), vec![(0, 1, 2.0), (1, 2, 1.0)]);
        assert_eq!(tree.leaves(), vec![0, 2]);
        assert_eq!(tree.distance(0, 2).unwrap(), 3.0);
    }

    #[test]
    fn non_additive_matrix_is_rejected() {
        // Violates the four-point condition.
        let d = matrix(vec![
            vec![0.0, 3.0, 9.0, 7.0],
            vec![3.0, 0.0, 4.0, 6.0],
            vec![9.0, 4.0, 0.0, 2.0],
            vec![7.0, 6.0, 2.0, 0.0],
        ]);
        let err = additive_phylogeny(&d).unwrap_err();
        assert!(matches!(err, PhyloError::NonAdditiveInput), "{err}");
    }

    #[test]
    fn single_taxon_is_rejected() {
        let d = matrix(vec![vec![0.0]]);
        assert!(matches!(
            additive_phylogeny(&d).unwrap_err(),
            PhyloError::InvalidMatrix { .. }
        ));
    }
}
