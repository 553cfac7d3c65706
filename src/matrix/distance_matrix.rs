use ndarray::Array2;

use crate::error::{PhyloError, PhyloResult};

/// Tolerance used for symmetry checks and all downstream float comparisons.
pub const DEFAULT_TOLERANCE: f64 = 1e-8;

/// Node-count ceiling: the engines are O(n^3) / recursive O(n^2) and meant
/// for tens to low hundreds of taxa. Oversized input fails fast.
pub const MAX_TAXA: usize = 2048;

/// A validated n x n matrix of pairwise distances between taxa 0..n-1.
///
/// Invariants, enforced at construction:
/// - zero diagonal,
/// - symmetric within `tolerance`,
/// - all entries non-negative.
///
/// Immutable once validated; the engines copy it before destructive edits.
#[derive(Debug, Clone)]
pub struct DistanceMatrix {
    values: Array2<f64>,
    tolerance: f64,
}

impl DistanceMatrix {
    pub fn new(values: Array2<f64>) -> PhyloResult<Self> {
        Self::with_tolerance(values, DEFAULT_TOLERANCE)
    }

    pub fn with_tolerance(values: Array2<f64>, tolerance: f64) -> PhyloResult<Self> {
        let n = values.nrows();
        if n != values.ncols() {
            return Err(PhyloError::invalid_matrix(format!(
                "matrix is not square: {}x{}",
                n,
                values.ncols()
            )));
        }
        if n > MAX_TAXA {
            return Err(PhyloError::invalid_matrix(format!(
                "{} taxa exceeds the supported maximum of {}",
                n, MAX_TAXA
            )));
        }
        for i in 0..n {
            if values[[i, i]].abs() > tolerance {
                return Err(PhyloError::invalid_matrix(format!(
                    "non-zero diagonal at [{0}][{0}]: {1}",
                    i,
                    values[[i, i]]
                )));
            }
            for j in 0..n {
                let v = values[[i, j]];
                if !v.is_finite() {
                    return Err(PhyloError::invalid_matrix(format!(
                        "non-finite entry at [{}][{}]",
                        i, j
                    )));
                }
                if v < 0.0 {
                    return Err(PhyloError::invalid_matrix(format!(
                        "negative entry at [{}][{}]: {}",
                        i, j, v
                    )));
                }
                if (v - values[[j, i]]).abs() > tolerance {
                    return Err(PhyloError::invalid_matrix(format!(
                        "asymmetric at [{i}][{j}]: {} vs {}",
                        v,
                        values[[j, i]]
                    )));
                }
            }
        }
        Ok(DistanceMatrix { values, tolerance })
    }

    /// Build from row vectors; rejects ragged or non-square input.
    pub fn from_rows(rows: Vec<Vec<f64>>) -> PhyloResult<Self> {
        let n = rows.len();
        let mut values = Array2::<f64>::zeros((n, n));
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n {
                return Err(PhyloError::invalid_matrix(format!(
                    "row {} has {} entries, expected {}",
                    i,
                    row.len(),
                    n
                )));
            }
            for (j, &v) in row.iter().enumerate() {
                values[[i, j]] = v;
            }
        }
        Self::new(values)
    }

    /// Number of taxa.
    pub fn len(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn tolerance(&self) -> f64 {
        self.tolerance
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    /// Minimal branch length attaching leaf `j` to the rest of the tree,
    /// assuming the matrix is additive:
    ///
    ///   min over i != j, k != j, i < k of (d[i][j] + d[j][k] - d[i][k]) / 2
    ///
    /// Exact (not an estimate) only when the matrix is truly additive.
    pub fn limb_length(&self, j: usize) -> PhyloResult<f64> {
        let n = self.len();
        if j >= n {
            return Err(PhyloError::IndexOutOfRange { index: j, len: n });
        }
        if n < 3 {
            return Err(PhyloError::invalid_matrix(format!(
                "limb length needs at least 3 taxa, matrix has {}",
                n
            )));
        }
        Ok(limb_length_in(&self.values, n, j))
    }

    /// Average of d[i][j] over i in `c1`, j in `c2`. The clusters must be
    /// disjoint, non-empty, and in range. Used only by UPGMA.
    pub fn cluster_distance(&self, c1: &[usize], c2: &[usize]) -> PhyloResult<f64> {
        let n = self.len();
        if c1.is_empty() || c2.is_empty() {
            return Err(PhyloError::invalid_matrix(
                "cluster distance over an empty cluster",
            ));
        }
        let mut total = 0.0;
        for &i in c1 {
            if i >= n {
                return Err(PhyloError::IndexOutOfRange { index: i, len: n });
            }
            for &j in c2 {
                if j >= n {
                    return Err(PhyloError::IndexOutOfRange { index: j, len: n });
                }
                total += self.values[[i, j]];
            }
        }
        Ok(total / (c1.len() * c2.len()) as f64)
    }
}

/// Limb length over the leading `n x n` block of a working matrix. The
/// additive engine calls this on its shrinking private copy, where only the
/// leading block is live.
pub(crate) fn limb_length_in(mat: &Array2<f64>, n: usize, j: usize) -> f64 {
    let mut min_length = f64::INFINITY;
    for i in 0..n {
        if i == j {
            continue;
        }
        for k in (i + 1)..n {
            if k == j {
                continue;
            }
            let length = (mat[[i, j]] + mat[[j, k]] - mat[[i, k]]) / 2.0;
            if length < min_length {
                min_length = length;
            }
        }
    }
    min_length
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::arr2;
    use pretty_assertions::assert_eq;

    fn additive_4x4() -> Array2<f64> {
        arr2(&[
            [0.0, 13.0, 21.0, 22.0],
            [13.0, 0.0, 12.0, 13.0],
            [21.0, 12.0, 0.0, 13.0],
            [22.0, 13.0, 13.0, 0.0],
        ])
    }

    #[test]
    fn accepts_valid_matrix() {
        let d = DistanceMatrix::new(additive_4x4()).unwrap();
        assert_eq!(d.len(), 4);
        assert_eq!(d.get(0, 2), 21.0);
    }

    #[test]
    fn rejects_asymmetry() {
        let mut m = additive_4x4();
        m[[0, 1]] = 14.0;
        let err = DistanceMatrix::new(m).unwrap_err();
        assert!(matches!(err, PhyloError::InvalidMatrix { .. }), "{err}");
    }

    #[test]
    fn rejects_nonzero_diagonal() {
        let mut m = additive_4x4();
        m[[2, 2]] = 1.0;
        assert!(DistanceMatrix::new(m).is_err());
    }

    #[test]
    fn rejects_negative_entries() {
        let mut m = additive_4x4();
        m[[0, 3]] = -22.0;
        m[[3, 0]] = -22.0;
        assert!(DistanceMatrix::new(m).is_err());
    }

    #[test]
    fn tolerates_tiny_asymmetry() {
        let mut m = additive_4x4();
        m[[0, 1]] += 1e-10;
        assert!(DistanceMatrix::new(m).is_ok());
    }

    #[test]
    fn rejects_ragged_rows() {
        let err = DistanceMatrix::from_rows(vec![vec![0.0, 1.0], vec![1.0]]).unwrap_err();
        assert!(matches!(err, PhyloError::InvalidMatrix { .. }));
    }

    #[test]
    fn limb_length_known_values() {
        // Limb lengths of the classic 4-taxon additive matrix.
        let d = DistanceMatrix::new(additive_4x4()).unwrap();
        assert_eq!(d.limb_length(0).unwrap(), 11.0);
        assert_eq!(d.limb_length(1).unwrap(), 2.0);
        assert_eq!(d.limb_length(2).unwrap(), 6.0);
        assert_eq!(d.limb_length(3).unwrap(), 7.0);
    }

    #[test]
    fn limb_length_nonnegative_on_additive_input() {
        let d = DistanceMatrix::new(additive_4x4()).unwrap();
        for j in 0..4 {
            assert!(d.limb_length(j).unwrap() >= 0.0);
        }
    }

    #[test]
    fn limb_length_invariant_under_relabelling_of_other_taxa() {
        // Swap taxa 0 and 2; limb length of taxon 1 must not change.
        let d = DistanceMatrix::new(additive_4x4()).unwrap();
        let base = d.limb_length(1).unwrap();

        let mut m = additive_4x4();
        m.swap((0, 1), (2, 1));
        m.swap((1, 0), (1, 2));
        m.swap((0, 3), (2, 3));
        m.swap((3, 0), (3, 2));
        let swapped = DistanceMatrix::new(m).unwrap();
        assert_eq!(swapped.limb_length(1).unwrap(), base);
    }

    #[test]
    fn limb_length_rejects_bad_index() {
        let d = DistanceMatrix::new(additive_4x4()).unwrap();
        let err = d.limb_length(4).unwrap_err();
        assert!(matches!(err, PhyloError::IndexOutOfRange { index: 4, len: 4 }));
    }

    #[test]
    fn cluster_distance_averages() {
        let d = DistanceMatrix::new(additive_4x4()).unwrap();
        // ({0}, {1}) -> 13; ({0,1}, {2,3}) -> (21+22+12+13)/4
        assert_eq!(d.cluster_distance(&[0], &[1]).unwrap(), 13.0);
        assert_eq!(d.cluster_distance(&[0, 1], &[2, 3]).unwrap(), 17.0);
    }

    #[test]
    fn cluster_distance_rejects_out_of_range() {
        let d = DistanceMatrix::new(additive_4x4()).unwrap();
        assert!(d.cluster_distance(&[0], &[7]).is_err());
        assert!(d.cluster_distance(&[], &[1]).is_err());
    }
}
