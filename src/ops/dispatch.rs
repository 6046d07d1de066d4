//! Dispatch tables: runtime type index to compiled kernel
//!
//! Each operation defines one [`KernelFactory`] per execution strategy. The
//! factory has one method per element type category, generic over the
//! category's element trait, so a single kernel body is instantiated for
//! every dtype of the category. A factory declines a category by keeping the
//! default method, which leaves those slots unsupported.
//!
//! ```text
//! DType::ALL ──► DispatchTable::build::<F>()
//!   Bool        F::boolean()
//!   I8..U64     F::integer::<T>()
//!   F16         F::half()
//!   F32, F64    F::real::<T>()
//!   C64, C128   F::complex::<T>()
//! ```
//!
//! Tables are built once per process, are never mutated afterwards, and
//! are read without locks.

use crate::dtype::{
    Complex64, Complex128, ComplexElement, DType, DTypeSet, IntElement, NUM_TYPES, RealElement,
    TypeIndex,
};
use std::fmt;

/// Produces the kernel entry point for each element type category
pub trait KernelFactory {
    /// Slot payload: usually a function pointer, or a [`DType`] for
    /// output-type tables
    type Kernel: Copy + Send + Sync + 'static;

    /// Table name used in log messages
    const NAME: &'static str;

    /// Kernel for `bool` elements
    fn boolean() -> Option<Self::Kernel> {
        None
    }

    /// Kernel for integer elements
    fn integer<T: IntElement>() -> Option<Self::Kernel> {
        None
    }

    /// Kernel for half precision elements
    #[cfg(feature = "f16")]
    fn half() -> Option<Self::Kernel> {
        None
    }

    /// Kernel for real floating point elements (f32, f64)
    fn real<T: RealElement>() -> Option<Self::Kernel> {
        None
    }

    /// Kernel for complex elements
    fn complex<T: ComplexElement>() -> Option<Self::Kernel> {
        None
    }
}

/// Ask `F` for the kernel of one dtype
pub fn produce<F: KernelFactory>(dtype: DType) -> Option<F::Kernel> {
    match dtype {
        DType::Bool => F::boolean(),
        DType::I8 => F::integer::<i8>(),
        DType::U8 => F::integer::<u8>(),
        DType::I16 => F::integer::<i16>(),
        DType::U16 => F::integer::<u16>(),
        DType::I32 => F::integer::<i32>(),
        DType::U32 => F::integer::<u32>(),
        DType::I64 => F::integer::<i64>(),
        DType::U64 => F::integer::<u64>(),
        DType::F16 => produce_half::<F>(),
        DType::F32 => F::real::<f32>(),
        DType::F64 => F::real::<f64>(),
        DType::Complex64 => F::complex::<Complex64>(),
        DType::Complex128 => F::complex::<Complex128>(),
    }
}

#[cfg(feature = "f16")]
fn produce_half<F: KernelFactory>() -> Option<F::Kernel> {
    F::half()
}

#[cfg(not(feature = "f16"))]
fn produce_half<F: KernelFactory>() -> Option<F::Kernel> {
    None
}

// ============================================================================
// One-dimensional tables
// ============================================================================

/// Kernel table indexed by [`TypeIndex`]
#[derive(Clone)]
pub struct DispatchTable<K> {
    name: &'static str,
    slots: [Option<K>; NUM_TYPES],
}

impl<K: Copy + Send + Sync + 'static> DispatchTable<K> {
    /// Populate every slot from factory `F`
    pub fn build<F: KernelFactory<Kernel = K>>() -> Self {
        let slots = DType::ALL.map(produce::<F>);
        let table = Self {
            name: F::NAME,
            slots,
        };
        log::debug!(
            "dispatch table '{}' populated: {}/{} slots [{}]",
            table.name,
            table.supported().len(),
            NUM_TYPES,
            table.supported().iter().map(DType::short_name).collect::<Vec<_>>().join(", ")
        );
        table
    }

    /// Kernel for `index`, or `None` if unsupported or unknown
    #[inline]
    pub fn get(&self, index: TypeIndex) -> Option<K> {
        index.get().and_then(|i| self.slots[i])
    }

    /// Kernel for `dtype`
    #[inline]
    pub fn get_dtype(&self, dtype: DType) -> Option<K> {
        self.get(dtype.index())
    }

    /// Set of dtypes with a kernel
    pub fn supported(&self) -> DTypeSet {
        DType::ALL
            .into_iter()
            .filter(|&d| self.slots[d as usize].is_some())
            .fold(DTypeSet::EMPTY, |set, d| set.union(DTypeSet::single(d)))
    }

    /// Table name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<K> fmt::Debug for DispatchTable<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let populated: Vec<&str> = DType::ALL
            .iter()
            .zip(&self.slots)
            .filter(|(_, k)| k.is_some())
            .map(|(d, _)| d.short_name())
            .collect();
        f.debug_struct("DispatchTable")
            .field("name", &self.name)
            .field("populated", &populated)
            .finish()
    }
}

// ============================================================================
// Two-dimensional tables (binary operations)
// ============================================================================

/// Kernel table indexed by a pair of [`TypeIndex`] values
#[derive(Clone)]
pub struct DispatchTable2D<K> {
    name: &'static str,
    slots: [[Option<K>; NUM_TYPES]; NUM_TYPES],
}

impl<K: Copy + Send + Sync + 'static> DispatchTable2D<K> {
    /// Populate the same-type diagonal from factory `F`
    ///
    /// Mixed-type pairs stay unsupported; type promotion belongs to the
    /// host layer.
    pub fn build_diagonal<F: KernelFactory<Kernel = K>>() -> Self {
        let mut slots = [[None; NUM_TYPES]; NUM_TYPES];
        for (i, dtype) in DType::ALL.into_iter().enumerate() {
            slots[i][i] = produce::<F>(dtype);
        }
        let table = Self {
            name: F::NAME,
            slots,
        };
        log::debug!(
            "dispatch table '{}' populated: {} type pairs",
            table.name,
            table.populated()
        );
        table
    }

    /// Kernel for `(lhs, rhs)`, or `None` if unsupported or unknown
    #[inline]
    pub fn get(&self, lhs: TypeIndex, rhs: TypeIndex) -> Option<K> {
        match (lhs.get(), rhs.get()) {
            (Some(i), Some(j)) => self.slots[i][j],
            _ => None,
        }
    }

    /// Number of populated pairs
    pub fn populated(&self) -> usize {
        self.slots.iter().flatten().filter(|k| k.is_some()).count()
    }

    /// Table name
    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl<K> fmt::Debug for DispatchTable2D<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchTable2D")
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

// ============================================================================
// Output-type factories
// ============================================================================

/// Output-type table where every real floating type maps to itself
pub struct SameFloatType;

impl KernelFactory for SameFloatType {
    type Kernel = DType;
    const NAME: &'static str = "same_float_type";

    #[cfg(feature = "f16")]
    fn half() -> Option<DType> {
        Some(DType::F16)
    }

    fn real<T: RealElement>() -> Option<DType> {
        Some(T::DTYPE)
    }
}

/// Output-type table where every real type (bool, integers, floats) maps
/// to itself
pub struct SameRealType;

impl KernelFactory for SameRealType {
    type Kernel = DType;
    const NAME: &'static str = "same_real_type";

    fn boolean() -> Option<DType> {
        Some(DType::Bool)
    }

    fn integer<T: IntElement>() -> Option<DType> {
        Some(T::DTYPE)
    }

    #[cfg(feature = "f16")]
    fn half() -> Option<DType> {
        Some(DType::F16)
    }

    fn real<T: RealElement>() -> Option<DType> {
        Some(T::DTYPE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::{Element, lookup, typenum};

    type SizeFn = fn() -> usize;

    fn size_of_elem<T: Element>() -> usize {
        std::mem::size_of::<T>()
    }

    struct ComplexOnly;

    impl KernelFactory for ComplexOnly {
        type Kernel = SizeFn;
        const NAME: &'static str = "complex_only";

        fn complex<T: ComplexElement>() -> Option<SizeFn> {
            Some(size_of_elem::<T>)
        }
    }

    #[test]
    fn test_declined_categories_stay_empty() {
        let table = DispatchTable::build::<ComplexOnly>();
        assert_eq!(table.supported(), DTypeSet::COMPLEX);
        assert!(table.get_dtype(DType::F64).is_none());
        assert_eq!(table.get_dtype(DType::Complex128).map(|f| f()), Some(16));
        assert!(table.get(TypeIndex::UNKNOWN).is_none());
        assert!(table.get(lookup(typenum::LONGDOUBLE)).is_none());
    }

    #[test]
    fn test_output_type_tables() {
        let floats = DispatchTable::build::<SameFloatType>();
        assert_eq!(floats.get_dtype(DType::F32), Some(DType::F32));
        assert_eq!(floats.get_dtype(DType::I32), None);
        #[cfg(feature = "f16")]
        assert_eq!(floats.get_dtype(DType::F16), Some(DType::F16));

        let reals = DispatchTable::build::<SameRealType>();
        assert_eq!(reals.get_dtype(DType::Bool), Some(DType::Bool));
        assert_eq!(reals.get_dtype(DType::U16), Some(DType::U16));
        assert_eq!(reals.get_dtype(DType::Complex64), None);
    }

    #[test]
    fn test_diagonal_table() {
        let table = DispatchTable2D::build_diagonal::<SameRealType>();
        let f32_idx = DType::F32.index();
        let i32_idx = DType::I32.index();
        assert_eq!(table.get(f32_idx, f32_idx), Some(DType::F32));
        assert_eq!(table.get(f32_idx, i32_idx), None);
        assert_eq!(table.get(TypeIndex::UNKNOWN, f32_idx), None);
        assert_eq!(table.populated(), table_size_expected());
    }

    fn table_size_expected() -> usize {
        if cfg!(feature = "f16") { 12 } else { 11 }
    }
}
