//! Active-backup tracking.
//!
//! An explicit per-process registry (injected, never ambient) exposing
//! which backup runs are currently in flight. Entries are held by RAII
//! guards so a run that errors out still deregisters itself.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Registry of in-flight backup runs.
#[derive(Debug, Default)]
pub struct ActiveBackups {
    inner: Mutex<HashMap<Uuid, DateTime<Utc>>>,
}

impl ActiveBackups {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a run; the returned guard deregisters it on drop.
    pub fn begin(self: &Arc<Self>, backup_id: Uuid) -> ActiveBackupGuard {
        self.lock().insert(backup_id, Utc::now());
        ActiveBackupGuard {
            registry: Arc::clone(self),
            backup_id,
        }
    }

    /// Whether a run is currently in flight.
    pub fn is_active(&self, backup_id: Uuid) -> bool {
        self.lock().contains_key(&backup_id)
    }

    /// Snapshot of in-flight runs and their start times.
    pub fn active(&self) -> Vec<(Uuid, DateTime<Utc>)> {
        self.lock().iter().map(|(id, at)| (*id, *at)).collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Uuid, DateTime<Utc>>> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// RAII registration of one backup run.
#[derive(Debug)]
pub struct ActiveBackupGuard {
    registry: Arc<ActiveBackups>,
    backup_id: Uuid,
}

impl Drop for ActiveBackupGuard {
    fn drop(&mut self) {
        self.registry.lock().remove(&self.backup_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_guard_deregisters() {
        let registry = Arc::new(ActiveBackups::new());
        let id = Uuid::new_v4();
        {
            let _guard = registry.begin(id);
            assert!(registry.is_active(id));
            assert_eq!(registry.active().len(), 1);
        }
        assert!(!registry.is_active(id));
        assert!(registry.active().is_empty());
    }
}
