//! Guarded accessor for the injected capability surface.
//!
//! Everything above this layer reaches the host exclusively through the
//! gateway. `get` returns `None` while nothing is installed — the stable
//! "unavailable" sentinel — and never panics, including when the backing
//! lock is poisoned.

use std::sync::{Arc, RwLock};

use super::CapabilitySet;

#[derive(Clone, Default)]
pub struct CapabilityGateway {
    slot: Arc<RwLock<Option<Arc<CapabilitySet>>>>,
}

impl CapabilityGateway {
    /// An empty gateway; `get` yields the unavailable sentinel until
    /// capabilities are installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Convenience constructor for a gateway born with capabilities.
    pub fn with(caps: Arc<CapabilitySet>) -> Self {
        let gateway = Self::new();
        gateway.install(caps);
        gateway
    }

    /// Makes `caps` visible to every clone of this gateway.
    pub fn install(&self, caps: Arc<CapabilitySet>) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(caps);
        }
    }

    /// Removes the installed capabilities; `get` returns the sentinel again.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }

    /// The installed capability set, or `None` — the unavailable sentinel.
    pub fn get(&self) -> Option<Arc<CapabilitySet>> {
        self.slot.read().ok().and_then(|slot| slot.clone())
    }

    pub fn is_available(&self) -> bool {
        self.get().is_some()
    }
}
