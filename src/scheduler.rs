use futures::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use tokio::task::{self, JoinHandle};
use tracing::{error, info, warn};

use crate::collector::{self, collect};
use crate::config::PoolsConfig;
use crate::consensus::merge_descriptors;
use crate::descriptor::fetch_descriptors;
use crate::error::PoolError;
use crate::models::PoolRecord;
use crate::state::SnapshotStore;

/// Drives the poll cycle and the descriptor cycle against one store.
pub struct Monitor {
    pool_client: Client,
    descriptor_client: Client,
    store: Arc<SnapshotStore>,
    config: PoolsConfig,
}

impl Monitor {
    pub fn new(config: PoolsConfig, store: Arc<SnapshotStore>) -> Result<Self, PoolError> {
        Ok(Monitor {
            pool_client: collector::pool_client(config.request_timeout())?,
            descriptor_client: collector::descriptor_client(config.request_timeout())?,
            store,
            config,
        })
    }

    /// Fetches descriptors and runs one full poll before anything is served.
    pub async fn bootstrap(&self) -> Result<(), PoolError> {
        let descriptors =
            fetch_descriptors(&self.descriptor_client, &self.config.descriptor_url).await?;
        let guard = self.store.write().await;
        let current = guard.snapshot().await;
        let records = merge_descriptors(&current.pools, descriptors);
        let records = collect_all(&self.pool_client, records).await;
        let snapshot = guard.publish(records).await;
        info!(
            "Got initial heights: {} pools, consensus height {}",
            snapshot.pools.len(),
            snapshot.consensus_height
        );
        Ok(())
    }

    /// One poll cycle: every pool, concurrently, then a single publish.
    pub async fn poll_once(&self) {
        let guard = self.store.write().await;
        let current = guard.snapshot().await;
        let records = collect_all(&self.pool_client, current.pools.clone()).await;
        let snapshot = guard.publish(records).await;
        let unreachable = snapshot.pools.iter().filter(|r| r.is_unreachable()).count();
        info!(
            "Polled {} pools ({} unreachable), consensus height {}",
            snapshot.pools.len(),
            unreachable,
            snapshot.consensus_height
        );
    }

    /// Re-fetches the pool list and merges it into the current records.
    pub async fn refresh_descriptors_once(&self) -> Result<(), PoolError> {
        let descriptors =
            fetch_descriptors(&self.descriptor_client, &self.config.descriptor_url).await?;
        let guard = self.store.write().await;
        let current = guard.snapshot().await;
        let records = merge_descriptors(&current.pools, descriptors);
        guard.publish(records).await;
        Ok(())
    }

    pub fn spawn_poll_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.config.poll_interval()).await;
                self.poll_once().await;
            }
        })
    }

    /// Ends after the first failed refresh when `stop_on_descriptor_failure`
    /// is set; otherwise retries on the next interval.
    pub fn spawn_descriptor_loop(self: Arc<Self>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                tokio::time::sleep(self.config.descriptor_refresh()).await;
                if let Err(e) = self.refresh_descriptors_once().await {
                    error!("Failed to update pools info: {}", e);
                    if self.config.stop_on_descriptor_failure {
                        error!("Descriptor refresh stopped; serving the last known pool list");
                        return;
                    }
                    warn!(
                        "Retrying descriptor refresh in {}s",
                        self.config.descriptor_refresh().as_secs()
                    );
                }
            }
        })
    }
}

/// Polls every record on its own task and joins on all of them. Order is
/// preserved. A panicked task keeps the record it was given.
async fn collect_all(client: &Client, records: Vec<PoolRecord>) -> Vec<PoolRecord> {
    let tasks: Vec<_> = records
        .iter()
        .cloned()
        .map(|previous| {
            let client = client.clone();
            task::spawn(
                async move { collect(&client, &previous.descriptor, Some(&previous)).await },
            )
        })
        .collect();

    join_all(tasks)
        .await
        .into_iter()
        .zip(records)
        .map(|(result, previous)| match result {
            Ok(record) => record,
            Err(e) => {
                error!("[{}] collector task failed: {}", previous.name(), e);
                previous
            }
        })
        .collect()
}
