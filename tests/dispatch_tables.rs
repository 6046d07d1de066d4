//! Integration tests for the type registry and dispatch tables

mod common;

use common::create_queue;
use kdispatch::dtype::{DType, DTypeSet, RealElement, TypeIndex, lookup, lookup_dtype, typenum};
use kdispatch::linalg::{potrf_batch_table, potrf_table};
use kdispatch::ops::ufunc::{FMAX_UFUNC, I0_UFUNC};
use kdispatch::ops::window::HAMMING;
use kdispatch::ops::{DispatchTable, KernelFactory};
use kdispatch::runtime::{Event, Queue};

type ScaleFn = fn(&Queue, u64, usize, &[Event]) -> Event;

fn scale_kernel<T: RealElement>(queue: &Queue, ptr: u64, n: usize, depends: &[Event]) -> Event {
    queue.submit(depends, move || {
        for i in 0..n {
            // SAFETY: test-only buffer of `n` elements
            unsafe {
                let p = (ptr as *mut T).add(i);
                *p = *p + *p;
            }
        }
        Ok(())
    })
}

struct ScaleFactory;

impl KernelFactory for ScaleFactory {
    type Kernel = ScaleFn;
    const NAME: &'static str = "scale";

    fn real<T: RealElement>() -> Option<ScaleFn> {
        Some(scale_kernel::<T>)
    }
}

#[test]
fn test_registry_lookup() {
    kdispatch::init();
    assert_eq!(lookup(typenum::DOUBLE), DType::F64.index());
    assert_eq!(lookup(typenum::FLOAT), DType::F32.index());
    assert_eq!(lookup(typenum::CDOUBLE), DType::Complex128.index());
    assert_eq!(lookup(typenum::HALF), DType::F16.index());
    assert_eq!(lookup_dtype(typenum::LONGLONG), Some(DType::I64));
    assert_eq!(lookup_dtype(typenum::BOOL), Some(DType::Bool));

    for unknown in [typenum::LONGDOUBLE, typenum::CLONGDOUBLE, typenum::OBJECT, -1, 1000] {
        assert_eq!(lookup(unknown), TypeIndex::UNKNOWN, "typenum {unknown}");
    }
}

#[test]
fn test_registry_round_trips_every_dtype() {
    for dtype in DType::ALL {
        assert_eq!(lookup_dtype(dtype.typenum()), Some(dtype));
    }
}

#[test]
fn test_rebuild_is_idempotent() {
    let first = DispatchTable::build::<ScaleFactory>();
    let second = DispatchTable::build::<ScaleFactory>();

    assert_eq!(first.supported(), second.supported());
    for dtype in DType::ALL {
        let a = first.get_dtype(dtype).map(|f| f as usize);
        let b = second.get_dtype(dtype).map(|f| f as usize);
        assert_eq!(a, b, "{dtype:?}");
    }
    assert_eq!(first.get(TypeIndex::UNKNOWN).map(|f| f as usize), None);
}

#[test]
fn test_custom_factory_schedules_kernel() {
    let q = create_queue();
    let table = DispatchTable::build::<ScaleFactory>();
    assert_eq!(table.supported(), DTypeSet::single(DType::F32).union(DTypeSet::single(DType::F64)));

    let view = kdispatch::tensor::ArrayView::from_slice(&[1.5f64, -2.0], &[2], &q).unwrap();
    let f = table.get(view.type_index()).unwrap();
    f(&q, view.data_ptr(), 2, &[]).wait().unwrap();
    assert_eq!(view.to_vec::<f64>(), vec![3.0, -4.0]);
}

#[test]
fn test_process_wide_tables_are_built_once() {
    kdispatch::init();
    kdispatch::init();

    assert!(std::ptr::eq(I0_UFUNC.tables(), I0_UFUNC.tables()));
    assert!(std::ptr::eq(FMAX_UFUNC.tables(), FMAX_UFUNC.tables()));
    assert!(std::ptr::eq(HAMMING.table(), HAMMING.table()));
    assert!(std::ptr::eq(potrf_table(), potrf_table()));

    let handles: Vec<_> = (0..8)
        .map(|_| std::thread::spawn(|| potrf_batch_table() as *const _ as usize))
        .collect();
    let addrs: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    assert!(addrs.windows(2).all(|w| w[0] == w[1]));
}

#[test]
fn test_supported_sets() {
    let i0 = &I0_UFUNC.tables().contig;
    assert!(i0.supported().contains(DType::F32));
    assert!(!i0.supported().contains(DType::Bool));

    assert_eq!(potrf_table().supported(), DTypeSet::LINALG);

    let fmax = &FMAX_UFUNC.tables().contig;
    assert!(fmax.get(DType::I8.index(), DType::I8.index()).is_some());
    assert!(fmax.get(DType::I8.index(), DType::I16.index()).is_none());
}
