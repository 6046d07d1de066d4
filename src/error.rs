//! Error types for kdispatch

use crate::dtype::DType;
use thiserror::Error;

/// Result type alias using kdispatch's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while scheduling or executing kernels
///
/// Every variant except the numerical failures is raised synchronously by
/// the scheduling call. `NotPositiveDefinite`, `Singular` and their batch
/// forms are only known once the device task has run, so they are delivered
/// through [`Event::wait`](crate::runtime::Event::wait) on the kernel handle.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// No compiled kernel exists for the element type of an operand
    #[error("Unsupported element type (typenum {typenum}) for operation '{op}'")]
    UnsupportedType {
        /// Host type identifier of the offending array
        typenum: i32,
        /// The operation name
        op: &'static str,
    },

    /// Dimensionality or extents do not match the operation's contract
    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        /// Expected shape
        expected: Vec<usize>,
        /// Actual shape
        got: Vec<usize>,
    },

    /// The memory layout is not one the operation has a kernel for
    #[error("Layout not supported by '{op}': {reason}")]
    LayoutUnsupported {
        /// The operation name
        op: &'static str,
        /// Which layout requirement failed
        reason: &'static str,
    },

    /// The output array is backed by read-only memory
    #[error("Output array is read-only")]
    NotWritable,

    /// An array was allocated on a queue whose device or context differs
    /// from the execution queue
    #[error("Execution queue is not compatible with allocation queue")]
    IncompatibleQueue,

    /// Destination element type differs from the type the kernel produces
    #[error("DType mismatch: expected {expected}, got {got}")]
    DTypeMismatch {
        /// Element type the kernel writes
        expected: DType,
        /// Element type of the destination array
        got: DType,
    },

    /// Input and output index overlapping but distinct memory segments
    #[error("Arrays index overlapping segments of memory")]
    MemoryOverlap,

    /// Cholesky factorization hit a leading minor that is not positive definite
    #[error("Matrix is not positive definite (leading minor of order {minor})")]
    NotPositiveDefinite {
        /// 1-based order of the failing leading minor
        minor: usize,
    },

    /// Some matrices of a batched factorization are not positive definite
    #[error(
        "Batched factorization failed: not positive definite: {}",
        format_failures(.failures, "leading minor of order")
    )]
    NotPositiveDefiniteBatch {
        /// Failed items; every other matrix in the batch holds a valid factor
        failures: Vec<BatchFailure>,
    },

    /// LU factorization met an exactly zero pivot, so the system has no
    /// unique solution
    #[error("Matrix is singular (U[{index}, {index}] is exactly zero, 1-based)")]
    Singular {
        /// 1-based position of the zero diagonal element of `U`
        index: usize,
    },

    /// Some systems of a batched solve are singular
    #[error("Batched solve failed: singular: {}", format_failures(.failures, "zero pivot at"))]
    SingularBatch {
        /// Failed items; every other system in the batch is solved
        failures: Vec<BatchFailure>,
    },

    /// Workspace or scratch memory could not be obtained
    #[error("Allocation failure: could not obtain {size} bytes")]
    AllocationFailure {
        /// Requested size in bytes
        size: usize,
    },

    /// Invalid scalar argument provided to an operation
    #[error("Invalid argument '{arg}': {reason}")]
    InvalidArgument {
        /// The argument name
        arg: &'static str,
        /// Reason for invalidity
        reason: String,
    },

    /// Generic internal error (vendor status codes, panicking kernels)
    #[error("Internal error: {0}")]
    Internal(String),
}

/// One failed item of a batched routine
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct BatchFailure {
    /// Position of the matrix in the batch
    pub batch_index: usize,
    /// Positive `info` status of the item: the 1-based order of the failing
    /// leading minor (Cholesky) or of the zero pivot (LU)
    pub info: usize,
}

fn format_failures(failures: &[BatchFailure], what: &str) -> String {
    let items: Vec<String> = failures
        .iter()
        .map(|f| format!("matrix {} ({what} {})", f.batch_index, f.info))
        .collect();
    items.join(", ")
}

impl Error {
    /// Create a shape mismatch error
    pub fn shape_mismatch(expected: &[usize], got: &[usize]) -> Self {
        Self::ShapeMismatch {
            expected: expected.to_vec(),
            got: got.to_vec(),
        }
    }

    /// Create an unsupported element type error
    pub fn unsupported_type(typenum: i32, op: &'static str) -> Self {
        Self::UnsupportedType { typenum, op }
    }

    /// Create a layout error
    pub fn layout_unsupported(op: &'static str, reason: &'static str) -> Self {
        Self::LayoutUnsupported { op, reason }
    }

    /// Create an invalid argument error
    pub fn invalid_argument(arg: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            arg,
            reason: reason.into(),
        }
    }

    /// Returns true for failures that are reported through the asynchronous
    /// result channel rather than at scheduling time
    pub fn is_numerical(&self) -> bool {
        matches!(
            self,
            Self::NotPositiveDefinite { .. }
                | Self::NotPositiveDefiniteBatch { .. }
                | Self::Singular { .. }
                | Self::SingularBatch { .. }
        )
    }

    /// Failed batch items, sorted by batch index
    ///
    /// A single-matrix failure is reported as batch index 0.
    pub fn batch_failures(&self) -> Vec<BatchFailure> {
        match self {
            Self::NotPositiveDefinite { minor: info } | Self::Singular { index: info } => vec![BatchFailure {
                batch_index: 0,
                info: *info,
            }],
            Self::NotPositiveDefiniteBatch { failures } | Self::SingularBatch { failures } => {
                let mut failures = failures.clone();
                failures.sort_by_key(|f| f.batch_index);
                failures
            }
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_failure_display() {
        let err = Error::NotPositiveDefiniteBatch {
            failures: vec![BatchFailure {
                batch_index: 1,
                info: 3,
            }],
        };
        let msg = err.to_string();
        assert!(msg.contains("matrix 1"));
        assert!(msg.contains("order 3"));
        assert!(err.is_numerical());
    }

    #[test]
    fn test_batch_failures_sorted() {
        let err = Error::NotPositiveDefiniteBatch {
            failures: vec![
                BatchFailure {
                    batch_index: 4,
                    info: 1,
                },
                BatchFailure {
                    batch_index: 2,
                    info: 2,
                },
            ],
        };
        let indices: Vec<usize> = err.batch_failures().iter().map(|f| f.batch_index).collect();
        assert_eq!(indices, vec![2, 4]);
        assert!(Error::NotWritable.batch_failures().is_empty());
    }

    #[test]
    fn test_singular_batch_display() {
        let err = Error::SingularBatch {
            failures: vec![BatchFailure {
                batch_index: 2,
                info: 1,
            }],
        };
        assert!(err.to_string().contains("matrix 2 (zero pivot at 1)"));
        assert!(err.is_numerical());
        assert_eq!(
            Error::Singular { index: 4 }.batch_failures(),
            vec![BatchFailure {
                batch_index: 0,
                info: 4
            }]
        );
    }
}
