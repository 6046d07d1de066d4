//! Storage: queue-allocated memory with Arc-based sharing

use crate::dtype::{DType, Element};
use crate::error::{Error, Result};
use crate::runtime::Queue;
use std::alloc::{Layout as AllocLayout, alloc_zeroed, dealloc};
use std::sync::Arc;

/// Alignment of every allocation (AVX-512 width)
const ALIGN: usize = 64;

/// Memory allocated through a queue
///
/// Storage wraps a raw allocation with reference counting so that views
/// and pending tasks can share it. Memory is released when the last
/// reference is dropped, which for memory handed to an asynchronous kernel
/// is no earlier than the kernel's lifetime guard completing.
pub struct Storage {
    inner: Arc<StorageInner>,
}

struct StorageInner {
    /// Raw pointer cast to u64
    ptr: u64,
    /// Number of elements (not bytes)
    len: usize,
    /// Host type identifier
    typenum: i32,
    /// Size of one element in bytes
    itemsize: usize,
    /// Queue the memory was allocated through
    queue: Queue,
}

impl Storage {
    /// Allocate `len` zeroed elements of `dtype` through `queue`
    pub fn new(len: usize, dtype: DType, queue: &Queue) -> Result<Self> {
        Self::with_typenum(len, dtype.typenum(), dtype.size_in_bytes(), queue)
    }

    /// Allocate `len` zeroed elements of an arbitrary host type
    ///
    /// `typenum` need not be known to the registry; kernels reject such
    /// storage with [`Error::UnsupportedType`].
    pub fn with_typenum(len: usize, typenum: i32, itemsize: usize, queue: &Queue) -> Result<Self> {
        let size_bytes = len
            .checked_mul(itemsize)
            .ok_or(Error::AllocationFailure { size: usize::MAX })?;
        let ptr = allocate(size_bytes)?;
        Ok(Self {
            inner: Arc::new(StorageInner {
                ptr,
                len,
                typenum,
                itemsize,
                queue: queue.clone(),
            }),
        })
    }

    /// Allocate storage holding a copy of `data`
    pub fn from_slice<T: Element>(data: &[T], queue: &Queue) -> Result<Self> {
        let storage = Self::new(data.len(), T::DTYPE, queue)?;
        let bytes: &[u8] = bytemuck::cast_slice(data);
        if !bytes.is_empty() {
            // SAFETY: freshly allocated with exactly bytes.len() bytes
            unsafe {
                std::ptr::copy_nonoverlapping(bytes.as_ptr(), storage.ptr() as *mut u8, bytes.len());
            }
        }
        Ok(storage)
    }

    /// Allocate boolean storage holding a copy of `data`
    pub fn from_bools(data: &[bool], queue: &Queue) -> Result<Self> {
        let storage = Self::new(data.len(), DType::Bool, queue)?;
        for (i, &b) in data.iter().enumerate() {
            // SAFETY: i < len and itemsize is 1
            unsafe { *(storage.ptr() as *mut u8).add(i) = b as u8 };
        }
        Ok(storage)
    }

    /// Get the raw pointer
    #[inline]
    pub fn ptr(&self) -> u64 {
        self.inner.ptr
    }

    /// Get the number of elements
    #[inline]
    pub fn len(&self) -> usize {
        self.inner.len
    }

    /// Check if storage is empty
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.inner.len == 0
    }

    /// Host type identifier of the elements
    #[inline]
    pub fn typenum(&self) -> i32 {
        self.inner.typenum
    }

    /// Size of one element in bytes
    #[inline]
    pub fn itemsize(&self) -> usize {
        self.inner.itemsize
    }

    /// Get size in bytes
    #[inline]
    pub fn size_in_bytes(&self) -> usize {
        self.inner.len * self.inner.itemsize
    }

    /// Queue the memory was allocated through
    #[inline]
    pub fn queue(&self) -> &Queue {
        &self.inner.queue
    }

    /// Get the reference count
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    /// Copy the whole buffer to host as elements of `T`
    ///
    /// Trailing bytes that do not fill a whole `T` are ignored.
    pub fn to_vec<T: bytemuck::Pod>(&self) -> Vec<T> {
        let count = match std::mem::size_of::<T>() {
            0 => 0,
            size => self.size_in_bytes() / size,
        };
        let mut result = vec![T::zeroed(); count];
        let bytes: &mut [u8] = bytemuck::cast_slice_mut(&mut result);
        if !bytes.is_empty() {
            // SAFETY: bytes.len() <= size_in_bytes()
            unsafe {
                std::ptr::copy_nonoverlapping(self.ptr() as *const u8, bytes.as_mut_ptr(), bytes.len());
            }
        }
        result
    }
}

fn allocate(size_bytes: usize) -> Result<u64> {
    if size_bytes == 0 {
        return Ok(0);
    }
    let layout = AllocLayout::from_size_align(size_bytes, ALIGN)
        .map_err(|_| Error::AllocationFailure { size: size_bytes })?;
    // SAFETY: layout has non-zero size
    let ptr = unsafe { alloc_zeroed(layout) };
    if ptr.is_null() {
        return Err(Error::AllocationFailure { size: size_bytes });
    }
    Ok(ptr as u64)
}

impl Clone for Storage {
    /// Clone increments the reference count (zero-copy)
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Drop for StorageInner {
    fn drop(&mut self) {
        let size_bytes = self.len * self.itemsize;
        if self.ptr == 0 || size_bytes == 0 {
            return;
        }
        if let Ok(layout) = AllocLayout::from_size_align(size_bytes, ALIGN) {
            // SAFETY: allocated in `allocate` with the same layout
            unsafe { dealloc(self.ptr as *mut u8, layout) };
        }
    }
}

impl std::fmt::Debug for Storage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Storage")
            .field("ptr", &format!("0x{:x}", self.inner.ptr))
            .field("len", &self.inner.len)
            .field("typenum", &self.inner.typenum)
            .field("queue", &self.inner.queue.id())
            .field("refs", &Arc::strong_count(&self.inner))
            .finish()
    }
}
