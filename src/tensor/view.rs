//! ArrayView: the per-call descriptor of a caller-owned buffer

use super::{Layout, Storage};
use crate::dtype::{DType, Element, TypeIndex, lookup};
use crate::error::{Error, Result};
use crate::runtime::Queue;
use std::ops::Range;

/// Strided view into a [`Storage`]
///
/// A view never owns memory beyond a shared reference to its storage.
/// Cloning a view is what keeps a buffer alive while a kernel that reads
/// or writes it is still pending.
#[derive(Clone, Debug)]
pub struct ArrayView {
    storage: Storage,
    layout: Layout,
    writable: bool,
}

impl ArrayView {
    /// 1-D writable view over the whole storage
    pub fn new(storage: Storage) -> Self {
        let layout = Layout::contiguous(&[storage.len()]);
        Self {
            storage,
            layout,
            writable: true,
        }
    }

    /// View with an explicit layout
    ///
    /// Fails if the layout reaches outside the storage.
    pub fn with_layout(storage: Storage, layout: Layout) -> Result<Self> {
        let extent = layout
            .extent()
            .ok_or_else(|| Error::invalid_argument("layout", "negative stride reaches before storage start"))?;
        if extent.end > storage.len() && !extent.is_empty() {
            return Err(Error::invalid_argument(
                "layout",
                format!(
                    "layout touches elements up to {} but storage holds {}",
                    extent.end,
                    storage.len()
                ),
            ));
        }
        Ok(Self {
            storage,
            layout,
            writable: true,
        })
    }

    /// Copy `data` into new storage and view it as a C-contiguous array
    pub fn from_slice<T: Element>(data: &[T], shape: &[usize], queue: &Queue) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::shape_mismatch(&[data.len()], shape));
        }
        let storage = Storage::from_slice(data, queue)?;
        Self::with_layout(storage, Layout::contiguous(shape))
    }

    /// Zero-filled C-contiguous array
    pub fn zeros(shape: &[usize], dtype: DType, queue: &Queue) -> Result<Self> {
        let storage = Storage::new(shape.iter().product(), dtype, queue)?;
        Self::with_layout(storage, Layout::contiguous(shape))
    }

    /// Zero-filled F-contiguous array
    pub fn zeros_fortran(shape: &[usize], dtype: DType, queue: &Queue) -> Result<Self> {
        let storage = Storage::new(shape.iter().product(), dtype, queue)?;
        Self::with_layout(storage, Layout::fortran(shape))
    }

    /// Same memory with a different layout
    pub fn relayout(&self, layout: Layout) -> Result<Self> {
        let mut view = Self::with_layout(self.storage.clone(), layout)?;
        view.writable = self.writable;
        Ok(view)
    }

    /// Swap two dimensions without copying
    pub fn transpose(&self, dim0: usize, dim1: usize) -> Result<Self> {
        let layout = self.layout.transpose(dim0, dim1).ok_or_else(|| {
            Error::invalid_argument("dim", format!("transpose({dim0}, {dim1}) on {}-d view", self.ndim()))
        })?;
        Ok(Self {
            storage: self.storage.clone(),
            layout,
            writable: self.writable,
        })
    }

    /// A read-only alias of this view
    pub fn as_read_only(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            layout: self.layout.clone(),
            writable: false,
        }
    }

    /// Backing storage
    #[inline]
    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    /// Layout
    #[inline]
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Extents
    #[inline]
    pub fn shape(&self) -> &[usize] {
        self.layout.shape()
    }

    /// Strides in elements
    #[inline]
    pub fn strides(&self) -> &[isize] {
        self.layout.strides()
    }

    /// Number of dimensions
    #[inline]
    pub fn ndim(&self) -> usize {
        self.layout.ndim()
    }

    /// Number of logical elements
    #[inline]
    pub fn size(&self) -> usize {
        self.layout.elem_count()
    }

    /// Whether kernels may write through this view
    #[inline]
    pub fn is_writable(&self) -> bool {
        self.writable
    }

    /// Row-major contiguity
    #[inline]
    pub fn is_c_contiguous(&self) -> bool {
        self.layout.is_c_contiguous()
    }

    /// Column-major contiguity
    #[inline]
    pub fn is_f_contiguous(&self) -> bool {
        self.layout.is_f_contiguous()
    }

    /// Queue the storage was allocated through
    #[inline]
    pub fn queue(&self) -> &Queue {
        self.storage.queue()
    }

    /// Host type identifier
    #[inline]
    pub fn typenum(&self) -> i32 {
        self.storage.typenum()
    }

    /// Size of one element in bytes
    #[inline]
    pub fn itemsize(&self) -> usize {
        self.storage.itemsize()
    }

    /// Dispatch slot of the element type
    #[inline]
    pub fn type_index(&self) -> TypeIndex {
        lookup(self.storage.typenum())
    }

    /// Element type, if it has a dispatch slot
    #[inline]
    pub fn dtype(&self) -> Option<DType> {
        DType::from_index(self.type_index())
    }

    /// Address of the first logical element
    #[inline]
    pub fn data_ptr(&self) -> u64 {
        self.storage.ptr() + (self.layout.offset() * self.itemsize()) as u64
    }

    /// Byte range of memory the view can touch
    pub fn byte_extent(&self) -> Range<u64> {
        let base = self.storage.ptr();
        let size = self.itemsize() as u64;
        match self.layout.extent() {
            Some(r) => base + r.start as u64 * size..base + r.end as u64 * size,
            None => base..base,
        }
    }

    /// Returns true if the two views can touch a common byte
    pub fn overlaps(&self, other: &ArrayView) -> bool {
        let a = self.byte_extent();
        let b = other.byte_extent();
        !a.is_empty() && !b.is_empty() && a.start < b.end && b.start < a.end
    }

    /// Returns true if both views address exactly the same elements in the
    /// same order
    pub fn same_memory(&self, other: &ArrayView) -> bool {
        self.data_ptr() == other.data_ptr()
            && self.itemsize() == other.itemsize()
            && self.shape() == other.shape()
            && self.strides() == other.strides()
    }

    /// Copy the logical elements to host in row-major order
    ///
    /// Reads race with any kernel still writing the view; wait on its
    /// event first.
    ///
    /// # Panics
    ///
    /// Panics if `T` is not the size of the view's elements.
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Vec<T> {
        assert_eq!(
            std::mem::size_of::<T>(),
            self.itemsize(),
            "to_vec element size does not match the view's item size"
        );
        let n = self.size();
        let mut out = Vec::with_capacity(n);
        let base = self.storage.ptr() as *const T;
        let shape = self.shape();
        let mut idx = vec![0usize; shape.len()];
        for _ in 0..n {
            let mut off = self.layout.offset() as isize;
            for (&i, &s) in idx.iter().zip(self.strides()) {
                off += i as isize * s;
            }
            // SAFETY: with_layout checked the extent against the storage
            out.push(unsafe { std::ptr::read_unaligned(base.offset(off)) });
            for d in (0..shape.len()).rev() {
                idx[d] += 1;
                if idx[d] < shape[d] {
                    break;
                }
                idx[d] = 0;
            }
        }
        out
    }
}
