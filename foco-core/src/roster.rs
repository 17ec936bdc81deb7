//! Shared, read-mostly device roster.
//!
//! Readers take an `Arc<[DeviceAddress]>` snapshot; updates swap the whole
//! list, so a snapshot held by in-flight work never changes underneath it.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::info;

use crate::intent::DeviceAddress;

#[derive(Clone, Default)]
pub struct DeviceRoster {
    inner: Arc<RwLock<Arc<[DeviceAddress]>>>,
}

impl DeviceRoster {
    pub fn new(addresses: Vec<DeviceAddress>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(addresses.into())),
        }
    }

    /// Current list, positions 1..=len map to indexes 0..len.
    pub fn snapshot(&self) -> Arc<[DeviceAddress]> {
        Arc::clone(&self.inner.read())
    }

    /// Replace the roster. Existing snapshots are unaffected.
    pub fn update(&self, addresses: Vec<DeviceAddress>) {
        let count = addresses.len();
        *self.inner.write() = addresses.into();
        info!(devices = count, "device roster updated");
    }

    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for DeviceRoster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.snapshot().iter()).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_survives_update() {
        let roster = DeviceRoster::new(vec!["a".into(), "b".into()]);
        let before = roster.snapshot();
        roster.update(vec!["c".into()]);
        assert_eq!(&*before, &["a".to_string(), "b".to_string()]);
        assert_eq!(&*roster.snapshot(), &["c".to_string()]);
        assert_eq!(roster.len(), 1);
    }

    #[test]
    fn clones_share_state() {
        let roster = DeviceRoster::default();
        let clone = roster.clone();
        assert!(clone.is_empty());
        roster.update(vec!["x".into()]);
        assert_eq!(clone.len(), 1);
    }
}
