//! Caller-side array model
//!
//! Arrays are owned by the host layer. The dispatch core only ever sees
//! [`ArrayView`] descriptors: a shared reference to [`Storage`], a
//! [`Layout`] and a writability flag.

mod layout;
mod storage;
mod view;

pub use layout::{Layout, Shape, Strides};
pub use storage::Storage;
pub use view::ArrayView;
