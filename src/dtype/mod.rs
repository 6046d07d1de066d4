//! Element type system for kdispatch
//!
//! This module provides the `DType` enum naming every element type a kernel
//! can be compiled for, the `TypeIndex` used to address dispatch table slots,
//! and the registry that maps host type identifiers (numpy-style typenums)
//! onto those indices.

pub mod complex;
mod element;
mod registry;

pub use complex::{Complex64, Complex128};
pub use element::{ComplexElement, Element, FieldElement, IntElement, NanMinMax, RealElement};
pub use registry::{TypeRegistry, lookup, lookup_dtype, registry, typenum};

use std::fmt;

/// Number of element types with a dispatch table slot
pub const NUM_TYPES: usize = 14;

// ============================================================================
// DType Enum
// ============================================================================

/// Element types supported by the dispatch tables
///
/// # Discriminant Values
///
/// The discriminant of each variant is its dispatch table slot, in the
/// lookup order used by the host array library:
/// bool, the integer types from narrowest to widest (signed before
/// unsigned), then half, single and double precision reals, then the two
/// complex types.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum DType {
    /// Boolean (one byte, 0 or 1)
    Bool = 0,
    /// 8-bit signed integer
    I8 = 1,
    /// 8-bit unsigned integer
    U8 = 2,
    /// 16-bit signed integer
    I16 = 3,
    /// 16-bit unsigned integer
    U16 = 4,
    /// 32-bit signed integer
    I32 = 5,
    /// 32-bit unsigned integer
    U32 = 6,
    /// 64-bit signed integer
    I64 = 7,
    /// 64-bit unsigned integer
    U64 = 8,
    /// 16-bit floating point (IEEE 754)
    F16 = 9,
    /// 32-bit floating point
    F32 = 10,
    /// 64-bit floating point
    F64 = 11,
    /// 64-bit complex (two f32: re, im)
    Complex64 = 12,
    /// 128-bit complex (two f64: re, im)
    Complex128 = 13,
}

impl DType {
    /// Every dtype, ordered by table slot
    pub const ALL: [DType; NUM_TYPES] = [
        Self::Bool,
        Self::I8,
        Self::U8,
        Self::I16,
        Self::U16,
        Self::I32,
        Self::U32,
        Self::I64,
        Self::U64,
        Self::F16,
        Self::F32,
        Self::F64,
        Self::Complex64,
        Self::Complex128,
    ];

    /// Dispatch table slot of this dtype
    #[inline]
    pub const fn index(self) -> TypeIndex {
        TypeIndex(self as u8)
    }

    /// Dtype stored in a table slot, or `None` for the unknown index
    #[inline]
    pub const fn from_index(index: TypeIndex) -> Option<Self> {
        if (index.0 as usize) < NUM_TYPES {
            Some(Self::ALL[index.0 as usize])
        } else {
            None
        }
    }

    /// Size of one element in bytes
    #[inline]
    pub const fn size_in_bytes(self) -> usize {
        match self {
            Self::Complex128 => 16,
            Self::F64 | Self::I64 | Self::U64 | Self::Complex64 => 8,
            Self::F32 | Self::I32 | Self::U32 => 4,
            Self::F16 | Self::I16 | Self::U16 => 2,
            Self::I8 | Self::U8 | Self::Bool => 1,
        }
    }

    /// Canonical host typenum for this dtype
    ///
    /// 64-bit integers report `LONGLONG`/`ULONGLONG`; on platforms where C
    /// `long` is 8 bytes the `LONG`/`ULONG` typenums map to the same dtype.
    pub const fn typenum(self) -> i32 {
        match self {
            Self::Bool => typenum::BOOL,
            Self::I8 => typenum::BYTE,
            Self::U8 => typenum::UBYTE,
            Self::I16 => typenum::SHORT,
            Self::U16 => typenum::USHORT,
            Self::I32 => typenum::INT,
            Self::U32 => typenum::UINT,
            Self::I64 => typenum::LONGLONG,
            Self::U64 => typenum::ULONGLONG,
            Self::F16 => typenum::HALF,
            Self::F32 => typenum::FLOAT,
            Self::F64 => typenum::DOUBLE,
            Self::Complex64 => typenum::CFLOAT,
            Self::Complex128 => typenum::CDOUBLE,
        }
    }

    /// Short name for display (e.g., "f32", "i64")
    pub const fn short_name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F16 => "f16",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::Complex64 => "c64",
            Self::Complex128 => "c128",
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.short_name())
    }
}

// ============================================================================
// TypeIndex
// ============================================================================

/// Dispatch table slot index
///
/// Valid indices lie in `[0, NUM_TYPES)`. [`TypeIndex::UNKNOWN`] is the
/// reserved index for identifiers the registry does not recognise; table
/// lookups with it always miss.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeIndex(u8);

impl TypeIndex {
    /// Reserved index for unrecognised type identifiers
    pub const UNKNOWN: Self = Self(NUM_TYPES as u8);

    /// Slot position, or `None` for [`TypeIndex::UNKNOWN`]
    #[inline]
    pub const fn get(self) -> Option<usize> {
        if (self.0 as usize) < NUM_TYPES {
            Some(self.0 as usize)
        } else {
            None
        }
    }

    /// Returns true for the reserved unknown index
    #[inline]
    pub const fn is_unknown(self) -> bool {
        self.0 as usize >= NUM_TYPES
    }
}

impl From<DType> for TypeIndex {
    fn from(dtype: DType) -> Self {
        dtype.index()
    }
}

impl fmt::Display for TypeIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match DType::from_index(*self) {
            Some(dtype) => write!(f, "{}({})", self.0, dtype),
            None => write!(f, "unknown"),
        }
    }
}

// ============================================================================
// DTypeSet
// ============================================================================

/// Set of dtypes for efficient membership testing
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct DTypeSet {
    bits: u16,
}

impl DTypeSet {
    /// Empty set
    pub const EMPTY: Self = Self { bits: 0 };

    /// Real floating point types
    pub const FLOATS: Self = Self {
        bits: (1 << DType::F16 as u8) | (1 << DType::F32 as u8) | (1 << DType::F64 as u8),
    };

    /// All integer types
    pub const INTS: Self = Self {
        bits: (1 << DType::I8 as u8)
            | (1 << DType::U8 as u8)
            | (1 << DType::I16 as u8)
            | (1 << DType::U16 as u8)
            | (1 << DType::I32 as u8)
            | (1 << DType::U32 as u8)
            | (1 << DType::I64 as u8)
            | (1 << DType::U64 as u8),
    };

    /// All complex types
    pub const COMPLEX: Self = Self {
        bits: (1 << DType::Complex64 as u8) | (1 << DType::Complex128 as u8),
    };

    /// Types accepted by the LAPACK-style routines
    pub const LINALG: Self = Self {
        bits: (1 << DType::F32 as u8) | (1 << DType::F64 as u8) | Self::COMPLEX.bits,
    };

    /// Create a set containing a single dtype
    #[inline]
    pub const fn single(dtype: DType) -> Self {
        Self {
            bits: 1 << dtype as u8,
        }
    }

    /// Check if the set contains a dtype
    #[inline]
    pub const fn contains(self, dtype: DType) -> bool {
        self.bits & (1 << dtype as u8) != 0
    }

    /// Union of two sets
    #[inline]
    pub const fn union(self, other: Self) -> Self {
        Self {
            bits: self.bits | other.bits,
        }
    }

    /// Number of dtypes in the set
    #[inline]
    pub const fn len(self) -> usize {
        self.bits.count_ones() as usize
    }

    /// Check if set is empty
    #[inline]
    pub const fn is_empty(self) -> bool {
        self.bits == 0
    }

    /// Iterate over members in slot order
    pub fn iter(self) -> impl Iterator<Item = DType> {
        DType::ALL.into_iter().filter(move |d| self.contains(*d))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dtype_size() {
        assert_eq!(DType::F64.size_in_bytes(), 8);
        assert_eq!(DType::F16.size_in_bytes(), 2);
        assert_eq!(DType::Bool.size_in_bytes(), 1);
        assert_eq!(DType::Complex128.size_in_bytes(), 16);
    }

    #[test]
    fn test_slot_order() {
        for (i, dtype) in DType::ALL.iter().enumerate() {
            assert_eq!(dtype.index().get(), Some(i));
            assert_eq!(DType::from_index(dtype.index()), Some(*dtype));
        }
        assert!(TypeIndex::UNKNOWN.is_unknown());
        assert_eq!(DType::from_index(TypeIndex::UNKNOWN), None);
    }

    #[test]
    fn test_dtype_set() {
        assert!(DTypeSet::FLOATS.contains(DType::F16));
        assert!(!DTypeSet::FLOATS.contains(DType::Complex64));
        assert!(DTypeSet::LINALG.contains(DType::Complex128));
        assert!(!DTypeSet::LINALG.contains(DType::F16));
        assert_eq!(DTypeSet::INTS.len(), 8);
        let floats: Vec<DType> = DTypeSet::FLOATS.iter().collect();
        assert_eq!(floats, vec![DType::F16, DType::F32, DType::F64]);
    }
}
