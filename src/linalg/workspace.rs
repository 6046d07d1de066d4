//! Fallible scratch allocation for factorization routines

use bytemuck::Zeroable;
use crate::error::{Error, Result};

/// Zero-initialised scratch memory owned by one asynchronous call
///
/// The executor moves the workspace into the kernel task, which drops it on
/// the worker once the routine has returned.
#[derive(Debug)]
pub struct Workspace<T> {
    data: Vec<T>,
}

impl<T: Zeroable + Copy> Workspace<T> {
    /// Allocate `len` elements, reporting failure instead of aborting
    pub fn try_new(len: usize) -> Result<Self> {
        let size = len.saturating_mul(std::mem::size_of::<T>());
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| Error::AllocationFailure { size })?;
        data.resize(len, T::zeroed());
        log::trace!("workspace: {len} elements ({size} bytes)");
        Ok(Self { data })
    }

    /// Number of elements
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// True when the workspace holds no elements
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Scratch memory for the native routine
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.data
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zeroed() {
        let mut ws = Workspace::<f64>::try_new(5).unwrap();
        assert_eq!(ws.len(), 5);
        assert!(ws.as_mut_slice().iter().all(|&x| x == 0.0));

        let mut pivots = Workspace::<usize>::try_new(3).unwrap();
        assert_eq!(pivots.as_mut_slice(), &[0, 0, 0]);
    }

    #[test]
    fn test_oversized_request_fails() {
        let err = Workspace::<f64>::try_new(usize::MAX / 4).unwrap_err();
        assert!(matches!(err, Error::AllocationFailure { .. }));
    }
}
