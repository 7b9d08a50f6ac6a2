use chrono::Utc;
use std::sync::Arc;
use tokio::sync::{Mutex, MutexGuard, RwLock};

use crate::consensus;
use crate::models::{GlobalSnapshot, PoolRecord};

/// Holder of the current snapshot.
///
/// Readers clone an `Arc` to an immutable snapshot. Writers must hold the
/// [`WriteGuard`] for the whole read-modify-publish cycle, which keeps the
/// poll loop and the descriptor loop from interleaving.
pub struct SnapshotStore {
    current: RwLock<Arc<GlobalSnapshot>>,
    writer: Mutex<()>,
}

pub struct WriteGuard<'a> {
    store: &'a SnapshotStore,
    _lock: MutexGuard<'a, ()>,
}

impl SnapshotStore {
    pub fn new() -> Self {
        SnapshotStore {
            current: RwLock::new(Arc::new(GlobalSnapshot::empty(Utc::now()))),
            writer: Mutex::new(()),
        }
    }

    pub async fn snapshot(&self) -> Arc<GlobalSnapshot> {
        self.current.read().await.clone()
    }

    pub async fn write(&self) -> WriteGuard<'_> {
        WriteGuard {
            store: self,
            _lock: self.writer.lock().await,
        }
    }
}

impl Default for SnapshotStore {
    fn default() -> Self {
        Self::new()
    }
}

impl WriteGuard<'_> {
    pub async fn snapshot(&self) -> Arc<GlobalSnapshot> {
        self.store.snapshot().await
    }

    /// Recomputes consensus over `records` and swaps the result in whole.
    pub async fn publish(&self, records: Vec<PoolRecord>) -> Arc<GlobalSnapshot> {
        let previous = self.store.snapshot().await;
        let next = Arc::new(consensus::recompute(records, &previous, Utc::now()));
        *self.store.current.write().await = next.clone();
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{PoolDescriptor, ResponseShape};
    use std::time::Duration;

    fn record(name: &str, height: u64) -> PoolRecord {
        PoolRecord {
            descriptor: PoolDescriptor {
                display_name: name.to_string(),
                api_base: format!("https://{}/", name),
                shape: ResponseShape::NodeJs,
            },
            height,
            last_block_found_at: None,
            hashrate: 0,
            difficulty: 0,
        }
    }

    #[tokio::test]
    async fn starts_empty() {
        let store = SnapshotStore::new();
        let snap = store.snapshot().await;
        assert!(snap.pools.is_empty());
        assert_eq!(snap.consensus_height, 0);
    }

    #[tokio::test]
    async fn readers_keep_their_snapshot() {
        let store = SnapshotStore::new();
        store.write().await.publish(vec![record("a", 10)]).await;
        let held = store.snapshot().await;

        store
            .write()
            .await
            .publish(vec![record("a", 11), record("b", 11)])
            .await;

        assert_eq!(held.pools.len(), 1);
        assert_eq!(held.consensus_height, 10);
        let now = store.snapshot().await;
        assert_eq!(now.pools.len(), 2);
        assert_eq!(now.consensus_height, 11);
    }

    #[tokio::test]
    async fn writers_are_serialized() {
        let store = Arc::new(SnapshotStore::new());
        let guard = store.write().await;

        let other = store.clone();
        let second = tokio::spawn(async move {
            other.write().await.publish(vec![record("late", 2)]).await;
        });

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!second.is_finished());
        guard.publish(vec![record("first", 1)]).await;
        drop(guard);

        second.await.unwrap();
        assert_eq!(store.snapshot().await.pools[0].name(), "late");
    }
}
