use std::sync::atomic::{AtomicU64, Ordering};

/// Token captured by a load when it starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct LoadToken(u64);

impl LoadToken {
    pub fn generation(self) -> u64 {
        self.0
    }
}

/// Detects results of superseded bulk loads.
///
/// Loads are superseded by issue order, not by target board: reloading the
/// same board twice still invalidates the first request.
#[derive(Debug, Default)]
pub struct RequestGenerationGuard {
    current: AtomicU64,
}

impl RequestGenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a load, superseding every load issued before it.
    pub fn begin_load(&self) -> LoadToken {
        LoadToken(self.current.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Invalidate in-flight loads without starting a new one.
    pub fn supersede(&self) {
        self.current.fetch_add(1, Ordering::SeqCst);
    }

    pub fn is_current(&self, token: LoadToken) -> bool {
        self.current.load(Ordering::SeqCst) == token.0
    }
}
