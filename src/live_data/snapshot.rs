//! Latest published refresh result, shared between the refresh loop and every
//! reader. Values are replaced whole behind an `Arc`, so a reader always sees
//! matches and standings from the same cycle.

use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::models::RefreshResult;

#[derive(Clone)]
pub struct SnapshotStore {
    inner: Arc<RwLock<Arc<RefreshResult>>>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        SnapshotStore {
            inner: Arc::new(RwLock::new(Arc::new(RefreshResult::empty()))),
        }
    }

    /// Replace the current value. The previous one is dropped once its last
    /// reader lets go of it.
    pub async fn publish(&self, result: Arc<RefreshResult>) {
        let mut current = self.inner.write().await;
        debug!(
            "Snapshot published: {} matches, {} standings rows (fetched {})",
            result.matches.len(),
            result.standings.standings.len(),
            result.fetched_at
        );
        *current = result;
    }

    pub async fn current(&self) -> Arc<RefreshResult> {
        Arc::clone(&*self.inner.read().await)
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}
