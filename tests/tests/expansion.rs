//! Property-style checks pinning the clamp rules and the positional
//! distribution across a wide range of counts.

use etl_core::expand::{expand_clicks, expand_impressions};
use etl_core::rules::normalize;
use etl_core::{NormalizedFact, RawAggregate};
use integration_tests::fixtures::date;

fn raw(demand: i64, impressions: i64, clicks: i64, position: f64) -> RawAggregate {
    RawAggregate {
        id: 1,
        date: date("2024-01-01"),
        page_path: "/p".into(),
        query: "q".into(),
        device: "desktop".into(),
        demand,
        impressions,
        clicks,
        position,
    }
}

fn fact(impressions: i64, clicks: i64, position: f64) -> NormalizedFact {
    NormalizedFact {
        date: date("2024-01-01"),
        page_path: "/p".into(),
        query: "q".into(),
        device: "desktop".into(),
        demand: impressions,
        impressions,
        clicks,
        position,
    }
}

#[test]
fn event_cardinality_equals_clamped_counts_end_to_end() {
    for demand in [0, 1, 7, 25, 120] {
        for impressions in [0, 1, 8, 25, 119, 200] {
            for clicks in [0, 1, 9, 30, 250] {
                let fact = normalize(&raw(demand, impressions, clicks, 4.2)).unwrap();
                let positions = expand_impressions(&fact);
                let click_events = expand_clicks(&fact);

                assert_eq!(positions.len() as i64, fact.impressions);
                assert_eq!(click_events.len() as i64, fact.clicks);
                assert!(fact.impressions <= demand);
                assert!(fact.clicks <= fact.impressions);
            }
        }
    }
}

#[test]
fn sequence_indices_are_gapless_for_every_count() {
    for n in 0..=120i64 {
        let positions = expand_impressions(&fact(n, n, 5.0));
        let seqs: Vec<i32> = positions.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (1..=n as i32).collect::<Vec<i32>>(), "n={n}");

        let clicks = expand_clicks(&fact(n, n, 5.0));
        let seqs: Vec<i32> = clicks.iter().map(|e| e.seq).collect();
        assert_eq!(seqs, (1..=n as i32).collect::<Vec<i32>>(), "n={n}");
    }
}

#[test]
fn impression_buckets_stay_adjacent_to_base_in_segment_order() {
    for n in 1..=120i64 {
        let buckets: Vec<i32> = expand_impressions(&fact(n, 0, 5.0))
            .iter()
            .map(|e| e.position_bucket)
            .collect();

        // base run, then the better rank, then the worse rank
        let first_better = buckets.iter().position(|&b| b == 4);
        let first_worse = buckets.iter().position(|&b| b == 6);
        assert!(buckets.iter().all(|&b| (4..=6).contains(&b)), "n={n}");
        if let (Some(better), Some(worse)) = (first_better, first_worse) {
            assert!(better < worse, "n={n}");
        }
        for window in buckets.windows(2) {
            // segments never interleave: 5* 4* 6*
            let order = |b: i32| match b {
                5 => 0,
                4 => 1,
                _ => 2,
            };
            assert!(order(window[0]) <= order(window[1]), "n={n}");
        }
    }
}

#[test]
fn click_buckets_split_between_base_and_better_rank() {
    for n in 1..=120i64 {
        let buckets: Vec<i32> = expand_clicks(&fact(n, n, 5.0))
            .iter()
            .map(|e| e.position_bucket)
            .collect();

        assert!(buckets.iter().all(|&b| b == 5 || b == 4), "n={n}");
        // 80% cutoff: the base segment is ceil(0.8 n) long
        let on_base = buckets.iter().filter(|&&b| b == 5).count() as u64;
        assert_eq!(on_base, (80 * n as u64).div_ceil(100), "n={n}");
    }
}

#[test]
fn buckets_are_always_within_rank_bounds() {
    for position in [0.0, 0.3, 1.0, 2.7, 9.4, 10.0, 10.9, 14.2] {
        for n in [1i64, 10, 33] {
            for bucket in expand_impressions(&fact(n, n, position))
                .iter()
                .map(|e| e.position_bucket)
            {
                assert!(bucket >= 1, "position={position} n={n}");
            }
            for bucket in expand_clicks(&fact(n, n, position))
                .iter()
                .map(|e| e.position_bucket)
            {
                assert!(bucket >= 1, "position={position} n={n}");
            }
        }
    }

    // the worse-rank branch is capped at rank 10
    let buckets: Vec<i32> = expand_impressions(&fact(20, 0, 10.6))
        .iter()
        .map(|e| e.position_bucket)
        .collect();
    assert!(buckets.iter().all(|&b| b <= 10));
}

#[test]
fn expansion_is_deterministic() {
    let a = expand_impressions(&fact(57, 31, 6.8));
    let b = expand_impressions(&fact(57, 31, 6.8));
    assert_eq!(a, b);

    let a = expand_clicks(&fact(57, 31, 6.8));
    let b = expand_clicks(&fact(57, 31, 6.8));
    assert_eq!(a, b);
}
