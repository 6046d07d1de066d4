//! Host type identifier registry
//!
//! The host array library names element types with numpy-style integer
//! typenums. The registry resolves a typenum to the [`TypeIndex`] of the
//! matching dispatch slot once, at first use, and answers every later
//! lookup from an immutable table.

use super::{DType, TypeIndex};
use std::sync::OnceLock;

/// Numpy-style host type identifiers
pub mod typenum {
    /// `bool`
    pub const BOOL: i32 = 0;
    /// `signed char`
    pub const BYTE: i32 = 1;
    /// `unsigned char`
    pub const UBYTE: i32 = 2;
    /// `short`
    pub const SHORT: i32 = 3;
    /// `unsigned short`
    pub const USHORT: i32 = 4;
    /// `int`
    pub const INT: i32 = 5;
    /// `unsigned int`
    pub const UINT: i32 = 6;
    /// `long`
    pub const LONG: i32 = 7;
    /// `unsigned long`
    pub const ULONG: i32 = 8;
    /// `long long`
    pub const LONGLONG: i32 = 9;
    /// `unsigned long long`
    pub const ULONGLONG: i32 = 10;
    /// `float`
    pub const FLOAT: i32 = 11;
    /// `double`
    pub const DOUBLE: i32 = 12;
    /// `long double` (no kernels)
    pub const LONGDOUBLE: i32 = 13;
    /// `complex float`
    pub const CFLOAT: i32 = 14;
    /// `complex double`
    pub const CDOUBLE: i32 = 15;
    /// `complex long double` (no kernels)
    pub const CLONGDOUBLE: i32 = 16;
    /// Python object (no kernels)
    pub const OBJECT: i32 = 17;
    /// Half precision float
    pub const HALF: i32 = 23;
}

const TABLE_LEN: usize = 24;

/// Process-wide map from typenum to dispatch slot
#[derive(Debug)]
pub struct TypeRegistry {
    slots: [TypeIndex; TABLE_LEN],
}

impl TypeRegistry {
    fn build() -> Self {
        // C `long` is 32 bits on LLP64 targets
        let long_is_64 = std::mem::size_of::<std::ffi::c_long>() == 8;
        let (long, ulong) = if long_is_64 {
            (DType::I64, DType::U64)
        } else {
            (DType::I32, DType::U32)
        };

        let mut slots = [TypeIndex::UNKNOWN; TABLE_LEN];
        let known = [
            (typenum::BOOL, DType::Bool),
            (typenum::BYTE, DType::I8),
            (typenum::UBYTE, DType::U8),
            (typenum::SHORT, DType::I16),
            (typenum::USHORT, DType::U16),
            (typenum::INT, DType::I32),
            (typenum::UINT, DType::U32),
            (typenum::LONG, long),
            (typenum::ULONG, ulong),
            (typenum::LONGLONG, DType::I64),
            (typenum::ULONGLONG, DType::U64),
            (typenum::FLOAT, DType::F32),
            (typenum::DOUBLE, DType::F64),
            (typenum::CFLOAT, DType::Complex64),
            (typenum::CDOUBLE, DType::Complex128),
            (typenum::HALF, DType::F16),
        ];
        for (num, dtype) in known {
            slots[num as usize] = dtype.index();
        }

        log::debug!(
            "type registry initialised ({} typenums, c_long is {} bits)",
            known.len(),
            if long_is_64 { 64 } else { 32 }
        );
        Self { slots }
    }

    /// Resolve a typenum; unrecognised values give [`TypeIndex::UNKNOWN`]
    #[inline]
    pub fn lookup(&self, type_identifier: i32) -> TypeIndex {
        usize::try_from(type_identifier)
            .ok()
            .and_then(|i| self.slots.get(i).copied())
            .unwrap_or(TypeIndex::UNKNOWN)
    }
}

static REGISTRY: OnceLock<TypeRegistry> = OnceLock::new();

/// The process-wide registry, built on first call
pub fn registry() -> &'static TypeRegistry {
    REGISTRY.get_or_init(TypeRegistry::build)
}

/// Resolve a host typenum to its dispatch slot
pub fn lookup(type_identifier: i32) -> TypeIndex {
    registry().lookup(type_identifier)
}

/// Resolve a host typenum to a dtype, if it has a slot
pub fn lookup_dtype(type_identifier: i32) -> Option<DType> {
    DType::from_index(lookup(type_identifier))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_typenums() {
        assert_eq!(lookup_dtype(typenum::BOOL), Some(DType::Bool));
        assert_eq!(lookup_dtype(typenum::FLOAT), Some(DType::F32));
        assert_eq!(lookup_dtype(typenum::CDOUBLE), Some(DType::Complex128));
        assert_eq!(lookup_dtype(typenum::HALF), Some(DType::F16));
        assert_eq!(lookup_dtype(typenum::LONGLONG), Some(DType::I64));
    }

    #[test]
    fn test_long_follows_platform() {
        let expected = if std::mem::size_of::<std::ffi::c_long>() == 8 {
            DType::I64
        } else {
            DType::I32
        };
        assert_eq!(lookup_dtype(typenum::LONG), Some(expected));
    }

    #[test]
    fn test_unknown_typenums() {
        for num in [
            typenum::LONGDOUBLE,
            typenum::CLONGDOUBLE,
            typenum::OBJECT,
            -1,
            22,
            24,
            i32::MAX,
        ] {
            assert!(lookup(num).is_unknown(), "typenum {num}");
        }
    }

    #[test]
    fn test_canonical_typenum_round_trip() {
        for dtype in DType::ALL {
            assert_eq!(lookup_dtype(dtype.typenum()), Some(dtype));
        }
    }

    #[test]
    fn test_registry_is_shared() {
        assert!(std::ptr::eq(registry(), registry()));
    }
}
