use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::info;

use scraping_common::Version;

/// Tracks whether the miner should stop taking work and exit so a newer
/// release can be deployed.
#[derive(Debug, Clone)]
pub struct UpdateMonitor {
    auto_update: bool,
    scheduled: Arc<AtomicBool>,
}

impl UpdateMonitor {
    pub fn new(auto_update: bool) -> Self {
        Self {
            auto_update,
            scheduled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Schedule an update when auto-update is on and `remote` is newer than
    /// this build. Returns whether an update is scheduled.
    pub fn observe(&self, remote: &Version) -> bool {
        if self.auto_update && remote.is_newer_than(&Version::current()) {
            if !self.scheduled.swap(true, Ordering::SeqCst) {
                info!(
                    remote = %remote,
                    local = %Version::current(),
                    "Validator runs a newer version, scheduling update"
                );
            }
        }
        self.is_scheduled()
    }

    /// Stop accepting work regardless of version (used on shutdown).
    pub fn schedule(&self) {
        self.scheduled.store(true, Ordering::SeqCst);
    }

    pub fn is_scheduled(&self) -> bool {
        self.scheduled.load(Ordering::SeqCst)
    }
}
