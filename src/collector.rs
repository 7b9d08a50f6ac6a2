use chrono::{DateTime, TimeZone, Utc};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::encoding;
use crate::error::PoolError;
use crate::extract;
use crate::models::{PoolDescriptor, PoolRecord, ResponseShape};

/// Client for pool stats endpoints.
///
/// Certificate validation is OFF here: many pool operators serve self-signed
/// or expired certificates, and these endpoints only feed read-only
/// telemetry. Do not reuse this client for anything else.
pub fn pool_client(timeout: Duration) -> reqwest::Result<Client> {
    reqwest::ClientBuilder::new()
        .danger_accept_invalid_certs(true)
        .pool_idle_timeout(Duration::from_secs(300))
        .pool_max_idle_per_host(4)
        .timeout(timeout)
        .connect_timeout(timeout)
        .tcp_keepalive(Duration::from_secs(30))
        .user_agent(concat!("pool-watch/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Client for the descriptor document. Keeps normal TLS validation.
pub fn descriptor_client(timeout: Duration) -> reqwest::Result<Client> {
    reqwest::ClientBuilder::new()
        .timeout(timeout)
        .connect_timeout(timeout)
        .user_agent(concat!("pool-watch/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Fields read from one successful poll.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolStats {
    pub height: u64,
    pub last_block_found_at: Option<DateTime<Utc>>,
    pub hashrate: u64,
    pub difficulty: u64,
}

/// Polls one pool. Never fails: on any error the record drops to the
/// unreachable sentinel, with hashrate, difficulty and last-found cleared.
pub async fn collect(
    client: &Client,
    descriptor: &PoolDescriptor,
    previous: Option<&PoolRecord>,
) -> PoolRecord {
    match fetch_stats(client, descriptor).await {
        Ok(stats) => {
            debug!(
                "[{}] height={} difficulty={} hashrate={}",
                descriptor.display_name, stats.height, stats.difficulty, stats.hashrate
            );
            PoolRecord {
                descriptor: descriptor.clone(),
                height: stats.height,
                last_block_found_at: stats.last_block_found_at,
                hashrate: stats.hashrate,
                difficulty: stats.difficulty,
            }
        }
        Err(e) => {
            match previous {
                Some(p) if !p.is_unreachable() => warn!(
                    "[{}] stats poll failed ({}), was at height {}: {}",
                    descriptor.display_name,
                    e.kind(),
                    p.height,
                    e
                ),
                _ => warn!(
                    "[{}] unreachable ({}): {}",
                    descriptor.display_name,
                    e.kind(),
                    e
                ),
            }
            PoolRecord::unreachable(descriptor.clone())
        }
    }
}

pub async fn fetch_stats(
    client: &Client,
    descriptor: &PoolDescriptor,
) -> Result<PoolStats, PoolError> {
    match &descriptor.shape {
        ResponseShape::LegacyForknote => {
            let body = get_text(client, &format!("{}stats", descriptor.api_base)).await?;
            let stats = extract::legacy_stats(&body);
            Ok(PoolStats {
                height: require_height(stats.height)?,
                last_block_found_at: to_datetime(require(
                    stats.last_block_found,
                    "lastBlockFound",
                )?),
                hashrate: require(stats.hashrate, "hashrate")?,
                difficulty: require(stats.difficulty, "network.difficulty")?,
            })
        }
        ResponseShape::NodeJs => {
            let network_url = format!("{}network/stats", descriptor.api_base);
            let pool_url = format!("{}pool/stats", descriptor.api_base);
            let (network_body, pool_body) =
                tokio::join!(get_text(client, &network_url), get_text(client, &pool_url));

            let network = extract::nodejs_network_stats(&network_body?);
            let pool = extract::nodejs_pool_stats(&pool_body?);
            let last_found = require(pool.last_block_found, "lastBlockFoundTime")?;
            Ok(PoolStats {
                height: require_height(network.height)?,
                // zero means the pool has not found a block yet
                last_block_found_at: Some(last_found)
                    .filter(|&t| t > 0)
                    .and_then(to_datetime),
                hashrate: require(pool.hashrate, "hashRate")?,
                difficulty: require(network.difficulty, "difficulty")?,
            })
        }
        ResponseShape::Other(tag) => Err(PoolError::UnsupportedPoolType(tag.clone())),
    }
}

fn require_height(height: Option<u64>) -> Result<u64, PoolError> {
    match height {
        Some(h) if h > 0 => Ok(h),
        Some(_) => Err(PoolError::parse("height is zero")),
        None => Err(PoolError::parse("couldn't parse height")),
    }
}

fn require<T>(value: Option<T>, field: &str) -> Result<T, PoolError> {
    value.ok_or_else(|| PoolError::parse(format!("couldn't parse {}", field)))
}

fn to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// GET that decodes the body from the response's own Content-Encoding.
pub async fn get_text(client: &Client, url: &str) -> Result<String, PoolError> {
    let response = client.get(url).send().await?;
    if !response.status().is_success() {
        return Err(PoolError::Status(response.status()));
    }
    let headers = response.headers().clone();
    let raw = response.bytes().await?;
    let body = encoding::decode_body(&headers, &raw)?;
    Ok(String::from_utf8_lossy(&body).into_owned())
}
