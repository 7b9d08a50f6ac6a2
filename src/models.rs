use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Stats API layout a pool's software exposes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResponseShape {
    /// Single `<api>stats` endpoint.
    LegacyForknote,
    /// `<api>network/stats` plus `<api>pool/stats`.
    NodeJs,
    /// Unknown tag, kept so discovery never fails on it.
    Other(String),
}

impl ResponseShape {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "forknote" => ResponseShape::LegacyForknote,
            "node.js" | "nodejs" => ResponseShape::NodeJs,
            _ => ResponseShape::Other(tag.to_string()),
        }
    }
}

impl<'de> Deserialize<'de> for ResponseShape {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let tag = String::deserialize(deserializer)?;
        Ok(ResponseShape::from_tag(&tag))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDescriptor {
    /// Advertised URL without scheme or trailing slash. Identity key.
    pub display_name: String,
    /// API base, always ending in `/`.
    pub api_base: String,
    pub shape: ResponseShape,
}

/// Latest telemetry for one pool.
///
/// `height == 0` with no `last_block_found_at` means the pool could not be
/// read on the last poll, not that it sits at genesis.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolRecord {
    pub descriptor: PoolDescriptor,
    pub height: u64,
    pub last_block_found_at: Option<DateTime<Utc>>,
    pub hashrate: u64,
    pub difficulty: u64,
}

impl PoolRecord {
    pub fn unreachable(descriptor: PoolDescriptor) -> Self {
        PoolRecord {
            descriptor,
            height: 0,
            last_block_found_at: None,
            hashrate: 0,
            difficulty: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.display_name
    }

    pub fn is_unreachable(&self) -> bool {
        self.height == 0
    }
}

/// Published consensus view. Never mutated after publication.
#[derive(Debug, Clone)]
pub struct GlobalSnapshot {
    pub pools: Vec<PoolRecord>,
    pub consensus_height: u64,
    pub consensus_difficulty: u64,
    pub consensus_updated_at: DateTime<Utc>,
}

impl GlobalSnapshot {
    pub fn empty(now: DateTime<Utc>) -> Self {
        GlobalSnapshot {
            pools: Vec::new(),
            consensus_height: 0,
            consensus_difficulty: 0,
            consensus_updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ForkReason {
    /// Height outside the tolerance window.
    Forked,
    /// Stats API unreachable or unparsable.
    Api,
}

// ── Wire shapes for the query surface ───────────────────────────────────────

#[derive(Debug, Serialize, PartialEq)]
pub struct HeightResponse {
    pub height: u64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct PoolHeight {
    pub pool: String,
    pub height: u64,
    pub mode: u64,
    pub last_found: u64,
    pub estimated_solve_time: u64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct HeightsResponse {
    pub pools: Vec<PoolHeight>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct LastFoundResponse {
    #[serde(rename = "mins-since-last-block")]
    pub mins_since_last_block: i64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ForkedPool {
    pub pool: String,
    pub reason: ForkReason,
    pub height: u64,
    pub mode: u64,
}

#[derive(Debug, Serialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ForkedResponse {
    pub pools: Vec<ForkedPool>,
}
