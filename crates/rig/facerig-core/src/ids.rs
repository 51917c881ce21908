//! Identifiers for host-side entities the pipeline refers to but does not own.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Opaque handle of a deformer node in a mesh's deformation stack.
#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeformerHandle(pub String);

impl DeformerHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeformerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Handle of a frozen QA proxy produced during capture.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ProxyId(pub u32);

/// Monotonic allocator for host-side handles.
#[derive(Default, Debug, Clone, Serialize, Deserialize)]
pub struct IdAllocator {
    next_proxy: u32,
    next_deformer: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_proxy(&mut self) -> ProxyId {
        let id = ProxyId(self.next_proxy);
        self.next_proxy = self.next_proxy.wrapping_add(1);
        id
    }

    /// Next numeric suffix for deformer nodes that need a unique name.
    #[inline]
    pub fn alloc_deformer_suffix(&mut self) -> u32 {
        let n = self.next_deformer;
        self.next_deformer = self.next_deformer.wrapping_add(1);
        n
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
