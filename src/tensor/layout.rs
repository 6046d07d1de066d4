//! Layout: shape, strides, and offset of an array view

use smallvec::SmallVec;
use std::fmt;
use std::ops::Range;

/// Stack allocation threshold for dimensions
/// Most arrays have 4 or fewer dimensions, so we stack-allocate up to 4
const STACK_DIMS: usize = 4;

/// Shape type: extents of an array
pub type Shape = SmallVec<[usize; STACK_DIMS]>;

/// Strides type: element offsets between consecutive elements along each dimension
/// Signed to support negative strides (reversed views)
/// NOTE: Strides are in ELEMENTS, not bytes
pub type Strides = SmallVec<[isize; STACK_DIMS]>;

/// Layout describes how a view's logical elements map onto its storage
///
/// Address of element at indices [i0, i1, ..., in]:
///   offset + i0 * strides[0] + i1 * strides[1] + ... + in * strides[n]
#[derive(Clone, PartialEq, Eq)]
pub struct Layout {
    shape: Shape,
    strides: Strides,
    offset: usize,
}

impl Layout {
    /// Create a C-contiguous (row-major) layout
    ///
    /// # Example
    /// ```
    /// use kdispatch::tensor::Layout;
    /// let layout = Layout::contiguous(&[2, 3, 4]);
    /// assert_eq!(layout.strides(), &[12, 4, 1]);
    /// ```
    pub fn contiguous(shape: &[usize]) -> Self {
        let shape: Shape = shape.iter().copied().collect();
        let strides = c_strides(&shape);
        Self {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Create an F-contiguous (column-major) layout
    pub fn fortran(shape: &[usize]) -> Self {
        let shape: Shape = shape.iter().copied().collect();
        let strides = f_strides(&shape);
        Self {
            shape,
            strides,
            offset: 0,
        }
    }

    /// Create a layout with explicit shape, strides, and offset
    ///
    /// Returns `None` if `shape` and `strides` differ in length.
    pub fn new(shape: &[usize], strides: &[isize], offset: usize) -> Option<Self> {
        if shape.len() != strides.len() {
            return None;
        }
        Some(Self {
            shape: shape.iter().copied().collect(),
            strides: strides.iter().copied().collect(),
            offset,
        })
    }

    /// Get the shape
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Get the strides
    #[inline]
    pub fn strides(&self) -> &[isize] {
        &self.strides
    }

    /// Get the offset (in elements) of the first logical element
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Number of dimensions (rank)
    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    /// Total number of elements
    #[inline]
    pub fn elem_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Check for row-major contiguity
    ///
    /// Dimensions of extent 1 place no constraint on their stride, and an
    /// array without elements is contiguous in every order.
    pub fn is_c_contiguous(&self) -> bool {
        is_dense(self.shape.iter().rev().zip(self.strides.iter().rev()))
    }

    /// Check for column-major contiguity
    pub fn is_f_contiguous(&self) -> bool {
        is_dense(self.shape.iter().zip(self.strides.iter()))
    }

    /// Create a transposed layout (swap two dimensions)
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Option<Self> {
        if dim0 >= self.ndim() || dim1 >= self.ndim() {
            return None;
        }
        let mut layout = self.clone();
        layout.shape.swap(dim0, dim1);
        layout.strides.swap(dim0, dim1);
        Some(layout)
    }

    /// Storage element offset of the element at `indices`
    pub fn index(&self, indices: &[usize]) -> Option<usize> {
        if indices.len() != self.ndim() {
            return None;
        }
        let mut linear = self.offset as isize;
        for ((&idx, &dim), &stride) in indices.iter().zip(&self.shape).zip(&self.strides) {
            if idx >= dim {
                return None;
            }
            linear += idx as isize * stride;
        }
        usize::try_from(linear).ok()
    }

    /// Range of storage elements the layout can touch
    ///
    /// Returns `None` when a negative stride reaches before the start of
    /// storage. Empty arrays touch nothing.
    pub fn extent(&self) -> Option<Range<usize>> {
        if self.elem_count() == 0 {
            return Some(self.offset..self.offset);
        }
        let mut lo = self.offset as isize;
        let mut hi = self.offset as isize;
        for (&dim, &stride) in self.shape.iter().zip(&self.strides) {
            let span = (dim as isize - 1) * stride;
            if span < 0 {
                lo += span;
            } else {
                hi += span;
            }
        }
        let lo = usize::try_from(lo).ok()?;
        Some(lo..hi as usize + 1)
    }
}

fn c_strides(shape: &[usize]) -> Strides {
    let mut strides: Strides = SmallVec::with_capacity(shape.len());
    let mut stride = 1isize;
    for &dim in shape.iter().rev() {
        strides.push(stride);
        stride *= dim.max(1) as isize;
    }
    strides.reverse();
    strides
}

fn f_strides(shape: &[usize]) -> Strides {
    let mut strides: Strides = SmallVec::with_capacity(shape.len());
    let mut stride = 1isize;
    for &dim in shape {
        strides.push(stride);
        stride *= dim.max(1) as isize;
    }
    strides
}

/// Dense check over (extent, stride) pairs, fastest-varying first
fn is_dense<'a>(dims: impl Iterator<Item = (&'a usize, &'a isize)> + Clone) -> bool {
    if dims.clone().any(|(&d, _)| d == 0) {
        return true;
    }
    let mut expected = 1isize;
    for (&dim, &stride) in dims {
        if dim == 1 {
            continue;
        }
        if stride != expected {
            return false;
        }
        expected *= dim as isize;
    }
    true
}

impl fmt::Debug for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Layout")
            .field("shape", &self.shape.as_slice())
            .field("strides", &self.strides.as_slice())
            .field("offset", &self.offset)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contiguous_strides() {
        assert_eq!(Layout::contiguous(&[2, 3, 4]).strides(), &[12, 4, 1]);
        assert_eq!(Layout::fortran(&[2, 3, 4]).strides(), &[1, 2, 6]);
    }

    #[test]
    fn test_contiguity_flags() {
        let c = Layout::contiguous(&[3, 4]);
        assert!(c.is_c_contiguous());
        assert!(!c.is_f_contiguous());

        let t = c.transpose(0, 1).unwrap();
        assert!(t.is_f_contiguous());
        assert!(!t.is_c_contiguous());

        // Unit extents and empty arrays
        let row = Layout::contiguous(&[1, 5]);
        assert!(row.is_c_contiguous());
        let empty = Layout::new(&[0, 3], &[7, 9], 0).unwrap();
        assert!(empty.is_c_contiguous() && empty.is_f_contiguous());

        let stepped = Layout::new(&[4], &[2], 0).unwrap();
        assert!(!stepped.is_c_contiguous());
    }

    #[test]
    fn test_offset_does_not_affect_contiguity() {
        let l = Layout::new(&[2, 2], &[2, 1], 5).unwrap();
        assert!(l.is_c_contiguous());
        assert_eq!(l.index(&[1, 1]), Some(8));
    }

    #[test]
    fn test_extent() {
        assert_eq!(Layout::contiguous(&[2, 3]).extent(), Some(0..6));
        let rev = Layout::new(&[3], &[-1], 2).unwrap();
        assert_eq!(rev.extent(), Some(0..3));
        let bad = Layout::new(&[3], &[-1], 1).unwrap();
        assert_eq!(bad.extent(), None);
        let empty = Layout::contiguous(&[0]);
        assert_eq!(empty.extent(), Some(0..0));
    }
}
