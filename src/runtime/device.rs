//! Devices and contexts
//!
//! A queue executes on one device inside one context. Memory allocated
//! through a queue may be used by any other queue that shares both.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

/// A compute device
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Device {
    id: usize,
    name: String,
}

impl Device {
    /// Create a device descriptor
    pub fn new(id: usize, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// The host CPU (there's only one)
    pub fn host() -> Self {
        Self::new(0, "cpu")
    }

    /// Unique identifier for this device
    #[inline]
    pub fn id(&self) -> usize {
        self.id
    }

    /// Human-readable name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Check if two descriptors name the same device
    #[inline]
    pub fn is_same(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::host()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.id)
    }
}

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

/// A set of devices sharing one memory space
///
/// Contexts compare by identity: two contexts created separately are never
/// equal, even over the same devices.
#[derive(Clone)]
pub struct Context {
    inner: Arc<ContextInner>,
}

struct ContextInner {
    id: u64,
    devices: Vec<Device>,
}

impl Context {
    /// Create a new context over `devices`
    pub fn new(devices: Vec<Device>) -> Self {
        Self {
            inner: Arc::new(ContextInner {
                id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
                devices,
            }),
        }
    }

    /// The process-wide default context holding the host device
    pub fn default_host() -> Self {
        static DEFAULT: OnceLock<Context> = OnceLock::new();
        DEFAULT
            .get_or_init(|| Context::new(vec![Device::host()]))
            .clone()
    }

    /// Unique identifier for this context
    #[inline]
    pub fn id(&self) -> u64 {
        self.inner.id
    }

    /// Devices in this context
    pub fn devices(&self) -> &[Device] {
        &self.inner.devices
    }

    /// Check whether `device` belongs to this context
    pub fn contains(&self, device: &Device) -> bool {
        self.inner.devices.iter().any(|d| d.is_same(device))
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for Context {}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.inner.id)
            .field("devices", &self.inner.devices)
            .finish()
    }
}
