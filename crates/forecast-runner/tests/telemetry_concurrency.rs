//! Integration tests for the shared telemetry aggregate.
//!
//! # Test Coverage
//!
//! - Concurrent updates from many threads are neither lost nor torn
//! - Rendering after a known success shows the expected table rows
//! - Bucket counts sum to the number of recorded values
//! - The final aggregate does not depend on reporting order
//! - The process-wide instance is shared

use std::sync::Arc;
use std::thread;

use forecast_runner::telemetry::{TIME_EDGES_MS, find_cut_index};
use forecast_runner::{ResultCode, SuccessMetrics, TelemetryAccumulator};
use proptest::prelude::*;

fn reference_metrics() -> SuccessMetrics {
    SuccessMetrics {
        total_time: Some(65_000),
        fit_time: Some(30_000),
        sim_time: Some(35_000),
        fit_memory: Some(500_000_000),
        sim_memory: Some(1_200_000_000),
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_two_threads_identical_success() {
    let acc = Arc::new(TelemetryAccumulator::new());
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let acc = Arc::clone(&acc);
            thread::spawn(move || acc.accum_success(ResultCode::Success, reference_metrics()))
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let snapshot = acc.snapshot();
    assert_eq!(snapshot.success_count, 2);
    assert_eq!(snapshot.per_code["SUCCESS"], 2);
    let cell = find_cut_index(TIME_EDGES_MS, 65_000);
    assert_eq!(snapshot.total_time_ms.counts[cell], 2);
}

#[test]
fn test_many_threads_mixed_updates() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 250;

    let acc = Arc::new(TelemetryAccumulator::new());
    thread::scope(|scope| {
        for t in 0..THREADS {
            let acc = &acc;
            scope.spawn(move || {
                for i in 0..PER_THREAD {
                    if (t + i) % 2 == 0 {
                        acc.accum_success(ResultCode::Success, reference_metrics());
                    } else {
                        acc.accum_failure(ResultCode::FitConvergence);
                    }
                    if i % 50 == 0 {
                        let _ = acc.render();
                    }
                }
            });
        }
    });

    let snapshot = acc.snapshot();
    assert_eq!(snapshot.success_count + snapshot.failure_count, THREADS * PER_THREAD);
    assert_eq!(snapshot.success_count, THREADS * PER_THREAD / 2);
    assert_eq!(snapshot.per_code["FIT_CONVERGENCE"], snapshot.failure_count);
    assert_eq!(
        snapshot.fit_memory_bytes.counts.iter().sum::<u64>(),
        snapshot.success_count
    );
}

#[test]
fn test_render_after_reference_success() {
    let acc = TelemetryAccumulator::new();
    acc.accum_success(ResultCode::Success, reference_metrics());
    let text = acc.render();

    assert!(text.starts_with("Successes: 1\n"));
    // Total time 65 s falls in the 90 s bucket.
    assert!(text.contains("\n90            1    0    0\n"));
    // Fit memory 500 MB falls in the 500 MB bucket.
    assert!(text.contains("\n500            1     0\n"));
}

#[test]
fn test_global_instance_is_shared() {
    let a = TelemetryAccumulator::global();
    let b = TelemetryAccumulator::global();
    assert!(std::ptr::eq(a, b));
}

// ============================================================================
// Properties
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Report {
    Success(u64),
    Failure(i32),
}

fn report_strategy() -> impl Strategy<Value = Report> {
    prop_oneof![
        (0u64..5_000_000).prop_map(Report::Success),
        (-20i32..30).prop_map(Report::Failure),
    ]
}

fn apply(acc: &TelemetryAccumulator, report: Report) {
    match report {
        Report::Success(ms) => acc.accum_success(
            ResultCode::Success,
            SuccessMetrics {
                total_time: Some(ms),
                ..SuccessMetrics::default()
            },
        ),
        Report::Failure(raw) => acc.accum_failure_raw(raw),
    }
}

proptest! {
    #[test]
    fn bucket_counts_sum_to_successes(times in prop::collection::vec(0u64..5_000_000, 0..64)) {
        let acc = TelemetryAccumulator::new();
        for &ms in &times {
            acc.accum_success(
                ResultCode::Success,
                SuccessMetrics { total_time: Some(ms), ..SuccessMetrics::default() },
            );
        }
        let snapshot = acc.snapshot();
        prop_assert_eq!(snapshot.total_time_ms.counts.iter().sum::<u64>(), times.len() as u64);
        prop_assert_eq!(snapshot.total_time_ms.max, times.iter().copied().max());
    }

    #[test]
    fn aggregate_is_order_independent(reports in prop::collection::vec(report_strategy(), 0..48)) {
        let forward = TelemetryAccumulator::new();
        for &report in &reports {
            apply(&forward, report);
        }
        let backward = TelemetryAccumulator::new();
        for &report in reports.iter().rev() {
            apply(&backward, report);
        }
        prop_assert_eq!(forward.snapshot(), backward.snapshot());
        prop_assert_eq!(forward.render(), backward.render());
    }

    #[test]
    fn clear_restores_initial_rendering(reports in prop::collection::vec(report_strategy(), 1..32)) {
        let initial = TelemetryAccumulator::new().render();
        let acc = TelemetryAccumulator::new();
        for &report in &reports {
            apply(&acc, report);
        }
        acc.clear();
        prop_assert_eq!(acc.render(), initial);
    }
}
