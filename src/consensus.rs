use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};

use crate::models::{ForkReason, ForkedPool, GlobalSnapshot, PoolDescriptor, PoolRecord};

/// Returned where a duration is unknown or unbounded.
pub const SENTINEL_MAX: u64 = u64::MAX;

/// Most frequent value. Equal counts resolve to the largest value.
///
/// Returns `None` only for an empty input.
pub fn mode<I>(values: I) -> Option<u64>
where
    I: IntoIterator<Item = u64>,
{
    let mut counts: BTreeMap<u64, usize> = BTreeMap::new();
    for v in values {
        *counts.entry(v).or_insert(0) += 1;
    }
    // BTreeMap iterates ascending and max_by_key keeps the last maximum.
    counts
        .into_iter()
        .max_by_key(|&(_, count)| count)
        .map(|(value, _)| value)
}

/// Builds the next snapshot from a complete record set.
///
/// `consensus_updated_at` moves to `now` only if the consensus height changed.
pub fn recompute(
    records: Vec<PoolRecord>,
    previous: &GlobalSnapshot,
    now: DateTime<Utc>,
) -> GlobalSnapshot {
    let consensus_height = mode(records.iter().map(|r| r.height)).unwrap_or(0);
    let consensus_difficulty = mode(records.iter().map(|r| r.difficulty)).unwrap_or(0);

    let consensus_updated_at = if consensus_height != previous.consensus_height {
        now
    } else {
        previous.consensus_updated_at
    };

    GlobalSnapshot {
        pools: records,
        consensus_height,
        consensus_difficulty,
        consensus_updated_at,
    }
}

/// Why `record` should be reported, if at all.
pub fn fork_reason(
    record: &PoolRecord,
    consensus_height: u64,
    max_divergence: u64,
) -> Option<ForkReason> {
    if record.is_unreachable() {
        return Some(ForkReason::Api);
    }
    if record.height.abs_diff(consensus_height) > max_divergence {
        Some(ForkReason::Forked)
    } else {
        None
    }
}

/// Pools that are unreachable or outside the divergence window.
pub fn forked_pools(snapshot: &GlobalSnapshot, max_divergence: u64) -> Vec<ForkedPool> {
    snapshot
        .pools
        .iter()
        .filter_map(|r| {
            fork_reason(r, snapshot.consensus_height, max_divergence).map(|reason| ForkedPool {
                pool: r.name().to_string(),
                reason,
                height: r.height,
                mode: snapshot.consensus_height,
            })
        })
        .collect()
}

/// Expected seconds for `hashrate` to solve a block at `difficulty`.
pub fn estimated_solve_time(difficulty: u64, hashrate: u64) -> u64 {
    if hashrate == 0 {
        SENTINEL_MAX
    } else {
        difficulty / hashrate
    }
}

/// Seconds since the pool last found a block.
pub fn seconds_since(found_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> u64 {
    match found_at {
        Some(t) => u64::try_from((now - t).num_seconds()).unwrap_or(0),
        None => SENTINEL_MAX,
    }
}

/// Rebuilds the record list for a fresh descriptor set.
///
/// Pools already known by display name keep their telemetry; new pools start
/// unreachable; pools missing from `descriptors` are dropped.
pub fn merge_descriptors(
    existing: &[PoolRecord],
    descriptors: Vec<PoolDescriptor>,
) -> Vec<PoolRecord> {
    let known: HashMap<&str, &PoolRecord> = existing.iter().map(|r| (r.name(), r)).collect();

    descriptors
        .into_iter()
        .map(|descriptor| match known.get(descriptor.display_name.as_str()) {
            Some(old) => PoolRecord {
                descriptor,
                height: old.height,
                last_block_found_at: old.last_block_found_at,
                hashrate: old.hashrate,
                difficulty: old.difficulty,
            },
            None => PoolRecord::unreachable(descriptor),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ResponseShape;
    use chrono::{Duration, TimeZone};

    fn record(name: &str, height: u64) -> PoolRecord {
        PoolRecord {
            descriptor: PoolDescriptor {
                display_name: name.to_string(),
                api_base: format!("https://{}/", name),
                shape: ResponseShape::LegacyForknote,
            },
            height,
            last_block_found_at: None,
            hashrate: 0,
            difficulty: 0,
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.timestamp_opt(1_600_000_000, 0).unwrap()
    }

    #[test]
    fn mode_picks_most_frequent() {
        assert_eq!(mode([100, 100, 101, 100, 0]), Some(100));
        assert_eq!(mode([7]), Some(7));
        assert_eq!(mode(Vec::<u64>::new()), None);
    }

    #[test]
    fn mode_tie_break_is_largest_value() {
        assert_eq!(mode([0, 0, 100, 100]), Some(100));
        assert_eq!(mode([3, 1, 2]), Some(3));
        assert_eq!(mode([2, 3, 1]), Some(3));
    }

    #[test]
    fn mode_is_always_an_observed_value() {
        let inputs: [&[u64]; 4] = [&[5, 9], &[1, 2, 2, 3, 3], &[0], &[10, 20, 30, 20]];
        for input in inputs {
            let m = mode(input.iter().copied()).unwrap();
            assert!(input.contains(&m));
            assert_eq!(mode(input.iter().copied()), Some(m));
        }
    }

    #[test]
    fn scenario_mixed_heights() {
        let records: Vec<_> = [100, 100, 101, 100, 0]
            .iter()
            .enumerate()
            .map(|(i, &h)| record(&format!("p{}", i), h))
            .collect();
        let snapshot = recompute(records, &GlobalSnapshot::empty(t0()), t0());
        assert_eq!(snapshot.consensus_height, 100);

        let forked = forked_pools(&snapshot, 5);
        assert_eq!(forked.len(), 1);
        assert_eq!(forked[0].pool, "p4");
        assert_eq!(forked[0].reason, ForkReason::Api);
        assert_eq!(forked[0].mode, 100);
    }

    #[test]
    fn divergence_window_is_inclusive() {
        let records = vec![
            record("a", 100),
            record("b", 100),
            record("c", 100),
            record("low-edge", 95),
            record("high-edge", 105),
            record("behind", 94),
            record("ahead", 106),
        ];
        let snapshot = recompute(records, &GlobalSnapshot::empty(t0()), t0());
        let forked = forked_pools(&snapshot, 5);
        let names: Vec<_> = forked.iter().map(|f| f.pool.as_str()).collect();
        assert_eq!(names, vec!["behind", "ahead"]);
        assert!(forked.iter().all(|f| f.reason == ForkReason::Forked));
    }

    #[test]
    fn updated_at_moves_only_on_height_change() {
        let start = GlobalSnapshot::empty(t0());
        let t1 = t0() + Duration::seconds(30);
        let t2 = t0() + Duration::seconds(60);
        let t3 = t0() + Duration::seconds(90);

        let s1 = recompute(vec![record("a", 10), record("b", 10)], &start, t1);
        assert_eq!(s1.consensus_updated_at, t1);

        // b flickers, the mode does not change
        let s2 = recompute(vec![record("a", 10), record("b", 0), record("c", 10)], &s1, t2);
        assert_eq!(s2.consensus_height, 10);
        assert_eq!(s2.consensus_updated_at, t1);

        let s3 = recompute(vec![record("a", 11), record("b", 11)], &s2, t3);
        assert_eq!(s3.consensus_updated_at, t3);
    }

    #[test]
    fn consensus_difficulty_is_mode() {
        let mut records = vec![record("a", 1), record("b", 1), record("c", 1)];
        records[0].difficulty = 500;
        records[1].difficulty = 500;
        records[2].difficulty = 900;
        let s = recompute(records, &GlobalSnapshot::empty(t0()), t0());
        assert_eq!(s.consensus_difficulty, 500);
    }

    #[test]
    fn solve_time_never_divides_by_zero() {
        assert_eq!(estimated_solve_time(1000, 0), SENTINEL_MAX);
        assert_eq!(estimated_solve_time(0, 0), SENTINEL_MAX);
        assert_eq!(estimated_solve_time(1000, 10), 100);
        assert_eq!(estimated_solve_time(0, 10), 0);
    }

    #[test]
    fn seconds_since_handles_absent_and_future() {
        assert_eq!(seconds_since(None, t0()), SENTINEL_MAX);
        assert_eq!(seconds_since(Some(t0() - Duration::seconds(42)), t0()), 42);
        assert_eq!(seconds_since(Some(t0() + Duration::seconds(5)), t0()), 0);
    }

    #[test]
    fn merge_preserves_known_and_drops_missing() {
        let mut kept = record("kept", 123);
        kept.hashrate = 55;
        kept.difficulty = 66;
        kept.last_block_found_at = Some(t0());
        let existing = vec![kept.clone(), record("dropped", 50)];

        let mut relisted = kept.descriptor.clone();
        relisted.api_base = "https://kept/v2/".to_string();
        let added = record("added", 0).descriptor;

        let merged = merge_descriptors(&existing, vec![added.clone(), relisted.clone()]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0], PoolRecord::unreachable(added));
        assert_eq!(merged[1].descriptor, relisted);
        assert_eq!(merged[1].height, 123);
        assert_eq!(merged[1].hashrate, 55);
        assert_eq!(merged[1].difficulty, 66);
        assert_eq!(merged[1].last_block_found_at, Some(t0()));
        assert!(merged.iter().all(|r| r.name() != "dropped"));
    }
}
