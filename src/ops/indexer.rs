//! Strided indexers for non-contiguous elementwise kernels
//!
//! An indexer turns a flat row-major position into one element offset per
//! operand. Before building one, the iteration space is simplified: unit
//! extents are dropped and adjacent dimensions that are contiguous with
//! each other in every operand are merged, so a sliced-but-dense view is
//! walked with as few divisions as possible.

use crate::tensor::{Shape, Strides};

/// Flat position to per-operand element offsets
///
/// `N` is the number of operands (2 for unary kernels, 3 for binary).
/// Offsets are relative to each operand's first logical element and may be
/// negative for reversed views.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StridedIndexer<const N: usize> {
    shape: Shape,
    strides: [Strides; N],
}

/// Indexer for one input and one output
pub type TwoOffsetsIndexer = StridedIndexer<2>;

/// Indexer for two inputs and one output
pub type ThreeOffsetsIndexer = StridedIndexer<3>;

impl<const N: usize> StridedIndexer<N> {
    /// Build a simplified indexer over `shape` with one stride list per operand
    pub fn new(shape: &[usize], strides: [&[isize]; N]) -> Self {
        simplify_iteration_space(shape, strides)
    }

    /// Simplified extents
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Simplified strides of operand `k`
    pub fn strides(&self, k: usize) -> &[isize] {
        &self.strides[k]
    }

    /// Number of positions
    pub fn nelems(&self) -> usize {
        self.shape.iter().product()
    }

    /// Element offsets of flat position `flat`
    #[inline]
    pub fn offsets(&self, mut flat: usize) -> [isize; N] {
        let mut out = [0isize; N];
        for d in (0..self.shape.len()).rev() {
            let extent = self.shape[d];
            let i = (flat % extent) as isize;
            flat /= extent;
            for (o, s) in out.iter_mut().zip(&self.strides) {
                *o += i * s[d];
            }
        }
        out
    }
}

/// Drop unit dimensions and merge adjacent dimensions that are mutually
/// contiguous in every operand
///
/// The flat row-major enumeration of the result visits positions in the
/// same order as the input space.
pub fn simplify_iteration_space<const N: usize>(
    shape: &[usize],
    strides: [&[isize]; N],
) -> StridedIndexer<N> {
    // Collected innermost first, reversed at the end
    let mut out_shape = Shape::new();
    let mut out_strides: [Strides; N] = std::array::from_fn(|_| Strides::new());

    for d in (0..shape.len()).rev() {
        let extent = shape[d];
        if extent == 1 {
            continue;
        }
        let mergeable = match out_shape.last() {
            Some(&inner) => (0..N).all(|k| {
                let inner_stride = *out_strides[k].last().unwrap_or(&0);
                strides[k][d] == inner_stride * inner as isize
            }),
            None => false,
        };
        if mergeable {
            if let Some(inner) = out_shape.last_mut() {
                *inner *= extent;
            }
        } else {
            out_shape.push(extent);
            for k in 0..N {
                out_strides[k].push(strides[k][d]);
            }
        }
    }

    out_shape.reverse();
    for s in &mut out_strides {
        s.reverse();
    }
    StridedIndexer {
        shape: out_shape,
        strides: out_strides,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_collapses_to_one_dim() {
        let ix = TwoOffsetsIndexer::new(&[2, 3, 4], [&[12, 4, 1], &[12, 4, 1]]);
        assert_eq!(ix.shape(), &[24]);
        assert_eq!(ix.strides(0), &[1]);
    }

    #[test]
    fn test_unit_dims_dropped() {
        let ix = TwoOffsetsIndexer::new(&[1, 5, 1], [&[99, 2, 7], &[5, 1, 1]]);
        assert_eq!(ix.shape(), &[5]);
        assert_eq!(ix.offsets(3), [6, 3]);
    }

    #[test]
    fn test_transposed_operand_blocks_merge() {
        // src is a transposed 3x2 C array, dst is C-contiguous 2x3
        let ix = TwoOffsetsIndexer::new(&[2, 3], [&[1, 2], &[3, 1]]);
        assert_eq!(ix.shape(), &[2, 3]);
        let offs: Vec<[isize; 2]> = (0..6).map(|i| ix.offsets(i)).collect();
        assert_eq!(offs[1], [2, 1]);
        assert_eq!(offs[3], [1, 3]);
        assert_eq!(offs[5], [5, 5]);
    }

    #[test]
    fn test_negative_strides() {
        let ix = ThreeOffsetsIndexer::new(&[4], [&[-1], &[1], &[2]]);
        assert_eq!(ix.offsets(3), [-3, 3, 6]);
        assert_eq!(ix.nelems(), 4);
    }

    #[test]
    fn test_scalar_space() {
        let ix = TwoOffsetsIndexer::new(&[1, 1], [&[3, 1], &[3, 1]]);
        assert!(ix.shape().is_empty());
        assert_eq!(ix.nelems(), 1);
        assert_eq!(ix.offsets(0), [0, 0]);
    }
}
