//! Tolerant scalar extraction from pool stats bodies.
//!
//! Third-party stats bodies are often broken somewhere outside the handful of
//! fields we need, so fields are located by pattern instead of a full parse.
//! Each extractor returns one `Option` per field; the collector decides which
//! ones are mandatory.

use once_cell::sync::Lazy;
use regex::Regex;

fn field_pattern(field: &str) -> Regex {
    let pattern = format!(
        r#""{}"\s*:\s*"?(-?[0-9]+(?:\.[0-9]+)?(?:[eE][+-]?[0-9]+)?)"?"#,
        regex::escape(field)
    );
    Regex::new(&pattern).expect("field pattern is valid")
}

static HEIGHT: Lazy<Regex> = Lazy::new(|| field_pattern("height"));
static DIFFICULTY: Lazy<Regex> = Lazy::new(|| field_pattern("difficulty"));
static HASHRATE: Lazy<Regex> = Lazy::new(|| field_pattern("hashrate"));
static HASH_RATE: Lazy<Regex> = Lazy::new(|| field_pattern("hashRate"));
static LAST_BLOCK_FOUND: Lazy<Regex> = Lazy::new(|| field_pattern("lastBlockFound"));
static LAST_BLOCK_FOUND_TIME: Lazy<Regex> = Lazy::new(|| field_pattern("lastBlockFoundTime"));

/// Fields a legacy forknote `stats` body yields.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LegacyStats {
    pub height: Option<u64>,
    /// Unix seconds.
    pub last_block_found: Option<i64>,
    pub hashrate: Option<u64>,
    pub difficulty: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct NetworkStats {
    pub height: Option<u64>,
    pub difficulty: Option<u64>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PoolSideStats {
    pub hashrate: Option<u64>,
    /// Unix seconds.
    pub last_block_found: Option<i64>,
}

pub fn legacy_stats(body: &str) -> LegacyStats {
    let network = scope(body, "network");
    let pool = scope(body, "pool");
    LegacyStats {
        height: network
            .and_then(|n| find_u64(&HEIGHT, n))
            .or_else(|| find_u64(&HEIGHT, body)),
        last_block_found: find_raw(&LAST_BLOCK_FOUND, body).and_then(truncate_millis),
        hashrate: pool
            .and_then(|p| find_u64(&HASHRATE, p))
            .or_else(|| find_u64(&HASHRATE, body)),
        difficulty: network.and_then(|n| find_u64(&DIFFICULTY, n)),
    }
}

pub fn nodejs_network_stats(body: &str) -> NetworkStats {
    NetworkStats {
        height: find_u64(&HEIGHT, body),
        difficulty: find_u64(&DIFFICULTY, body),
    }
}

pub fn nodejs_pool_stats(body: &str) -> PoolSideStats {
    PoolSideStats {
        hashrate: find_u64(&HASH_RATE, body).or_else(|| find_u64(&HASHRATE, body)),
        last_block_found: find_raw(&LAST_BLOCK_FOUND_TIME, body).and_then(|s| s.parse().ok()),
    }
}

/// Drops the last three digits of a millisecond timestamp.
///
/// The digits are cut, not divided, so malformed inputs fail the same way
/// the upstream pools' own dashboards do.
pub fn truncate_millis(raw: &str) -> Option<i64> {
    if raw.len() <= 3 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw[..raw.len() - 3].parse().ok().filter(|&t: &i64| t > 0)
}

/// Body text from `"name":` onwards, if the key is present.
fn scope<'a>(body: &'a str, name: &str) -> Option<&'a str> {
    let key = format!("\"{}\"", name);
    let mut offset = 0;
    while let Some(pos) = body[offset..].find(&key) {
        let start = offset + pos + key.len();
        let rest = body[start..].trim_start();
        if let Some(inner) = rest.strip_prefix(':') {
            if inner.trim_start().starts_with('{') {
                return Some(inner);
            }
        }
        offset = start;
    }
    None
}

fn find_raw<'a>(re: &Regex, body: &'a str) -> Option<&'a str> {
    re.captures(body)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

fn find_u64(re: &Regex, body: &str) -> Option<u64> {
    find_raw(re, body).and_then(parse_u64)
}

/// Integers parse exactly; floats are truncated to whole units.
fn parse_u64(s: &str) -> Option<u64> {
    if let Ok(v) = s.parse::<u64>() {
        return Some(v);
    }
    let f = s.parse::<f64>().ok()?;
    if f.is_finite() && f >= 0.0 {
        Some(f as u64)
    } else {
        None
    }
}
