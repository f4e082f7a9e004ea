//! Materialized snapshot cache.
//!
//! Written only by the registry's cache loop; read by consumers. The list
//! behind the lock is an immutable `Arc`, so a read is a pointer clone and
//! never observes a partially built refresh.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::types::ScoredRow;

#[derive(Default)]
pub struct SnapshotCache {
    rows: Mutex<Arc<Vec<ScoredRow>>>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically replace the whole view.
    pub async fn publish(&self, rows: Vec<ScoredRow>) {
        *self.rows.lock().await = Arc::new(rows);
    }

    /// Latest full view. Cheap: clones the `Arc`, not the rows.
    pub async fn read(&self) -> Arc<Vec<ScoredRow>> {
        Arc::clone(&*self.rows.lock().await)
    }
}
