//! Fan-out of published snapshots to connected viewers.
//!
//! Every viewer owns a small bounded queue. Delivery uses `try_send`, so a
//! viewer that stops reading only loses pushes (only-latest semantics: it
//! will catch up on the next one) and never stalls the refresh loop or the
//! other viewers.
//!
//! ```text
//!  publish(result) ──▶ SnapshotStore (replace)
//!                  └─▶ copy of registry ──try_send──▶ viewer queues
//!  subscribe()     ──▶ queue seeded with SnapshotStore::current()
//! ```

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::snapshot::SnapshotStore;
use crate::models::RefreshResult;

#[derive(Clone)]
struct ViewerHandle {
    id: u64,
    tx: mpsc::Sender<Arc<RefreshResult>>,
}

/// Receiving side held by one viewer connection.
pub struct Viewer {
    pub id: u64,
    rx: mpsc::Receiver<Arc<RefreshResult>>,
}

impl Viewer {
    /// Next snapshot for this viewer; `None` once the broadcaster is closed.
    pub async fn recv(&mut self) -> Option<Arc<RefreshResult>> {
        self.rx.recv().await
    }
}

#[derive(Clone)]
pub struct Broadcaster {
    store: SnapshotStore,
    viewers: Arc<Mutex<Vec<ViewerHandle>>>,
    /// Keeps concurrent publishes from reaching viewers out of order
    publish_lock: Arc<Mutex<()>>,
    next_id: Arc<AtomicU64>,
    closed: Arc<AtomicBool>,
    buffer: usize,
}

impl Broadcaster {
    pub fn new(store: SnapshotStore, buffer: usize) -> Self {
        Broadcaster {
            store,
            viewers: Arc::new(Mutex::new(Vec::new())),
            publish_lock: Arc::new(Mutex::new(())),
            next_id: Arc::new(AtomicU64::new(1)),
            closed: Arc::new(AtomicBool::new(false)),
            buffer: buffer.max(1),
        }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Register a viewer. Its queue starts with the current snapshot.
    pub async fn subscribe(&self) -> Viewer {
        let (tx, rx) = mpsc::channel(self.buffer);
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);

        // Holding the registry lock while reading the store means a
        // concurrent publish lands either in the catch-up value or as a
        // push, never both.
        let mut viewers = self.viewers.lock().await;
        let current = self.store.current().await;
        let _ = tx.try_send(current);
        if !self.closed.load(Ordering::SeqCst) {
            viewers.push(ViewerHandle { id, tx });
            debug!("Viewer {} subscribed ({} connected)", id, viewers.len());
        }

        Viewer { id, rx }
    }

    /// Store `result` as the current snapshot, then push it to every viewer
    /// registered at that moment. Returns the number of viewers it reached.
    pub async fn publish(&self, result: Arc<RefreshResult>) -> usize {
        let _ordered = self.publish_lock.lock().await;

        let targets = {
            let viewers = self.viewers.lock().await;
            self.store.publish(Arc::clone(&result)).await;
            viewers.clone()
        };

        let mut delivered = 0;
        let mut gone = Vec::new();
        for viewer in &targets {
            match viewer.tx.try_send(Arc::clone(&result)) {
                Ok(()) => delivered += 1,
                Err(TrySendError::Full(_)) => {
                    warn!("Viewer {} is not keeping up, push dropped", viewer.id);
                }
                Err(TrySendError::Closed(_)) => gone.push(viewer.id),
            }
        }

        if !gone.is_empty() {
            let mut viewers = self.viewers.lock().await;
            viewers.retain(|v| !gone.contains(&v.id));
            debug!("Pruned {} disconnected viewer(s)", gone.len());
        }

        delivered
    }

    /// Drop a viewer's registration explicitly (e.g. on socket close).
    pub async fn unsubscribe(&self, id: u64) {
        let mut viewers = self.viewers.lock().await;
        viewers.retain(|v| v.id != id);
    }

    #[cfg(test)]
    pub async fn viewer_count(&self) -> usize {
        self.viewers.lock().await.len()
    }

    /// Disconnect every viewer. Later subscribers get the catch-up value and
    /// then end immediately.
    pub async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
        let mut viewers = self.viewers.lock().await;
        info!("Closing broadcaster ({} viewer(s) connected)", viewers.len());
        viewers.clear();
    }
}
