//! End-to-end tests driving the registry the way a benchmark driver would:
//! many worker threads recording into shared operation names, then one
//! export at the end.

use std::sync::Arc;
use std::thread;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use bench_metrics::{
    MeasurementConfig, Measurements, StrategyKind, TextMeasurementsExporter, TrackingMode,
};

fn export(metrics: &Measurements) -> String {
    let mut exporter = TextMeasurementsExporter::new();
    metrics.export_measurements(&mut exporter).unwrap();
    exporter.buf().to_owned()
}

fn extract(buf: &str, metric: &str, label: &str) -> f64 {
    let prefix = format!("[{}], {}, ", metric, label);
    buf.lines()
        .find_map(|line| line.strip_prefix(&prefix))
        .unwrap_or_else(|| panic!("no `{}` line in:\n{}", prefix, buf))
        .parse()
        .unwrap()
}

fn all_strategies() -> [StrategyKind; 3] {
    [
        StrategyKind::Raw,
        StrategyKind::Histogram,
        StrategyKind::HdrHistogram,
    ]
}

// ─── Lost updates ────────────────────────────────────────────────

#[test]
fn concurrent_recording_loses_no_samples() {
    const THREADS: u64 = 8;
    const SAMPLES: u64 = 10_000;

    for strategy in all_strategies() {
        let metrics = Arc::new(Measurements::new(MeasurementConfig {
            strategy,
            ..MeasurementConfig::default()
        }));

        let handles: Vec<_> = (0..THREADS)
            .map(|worker| {
                let metrics = Arc::clone(&metrics);
                thread::spawn(move || {
                    let mut rng = StdRng::seed_from_u64(1000 + worker);
                    for _ in 0..SAMPLES {
                        let latency = rng.gen_range(1..=100_000u64);
                        metrics.measure("READ", latency).unwrap();
                        metrics.report_status("READ", 0).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let buf = export(&metrics);
        assert_eq!(
            extract(&buf, "READ", "Operations") as u64,
            THREADS * SAMPLES,
            "strategy {:?} lost samples",
            strategy
        );
        assert_eq!(
            extract(&buf, "READ", "Return=0") as u64,
            THREADS * SAMPLES,
            "strategy {:?} lost status reports",
            strategy
        );
    }
}

// ─── First-access races ──────────────────────────────────────────

#[test]
fn racing_first_access_creates_one_series() {
    // Every thread hammers a brand-new operation name simultaneously; if
    // the registry ever created two series, one side's samples would be
    // overwritten and the exported count would come up short.
    const THREADS: u64 = 16;
    const SAMPLES: u64 = 500;

    let metrics = Arc::new(Measurements::new(MeasurementConfig::default()));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let metrics = Arc::clone(&metrics);
            thread::spawn(move || {
                for i in 0..SAMPLES {
                    metrics.measure("INSERT", i + 1).unwrap();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let buf = export(&metrics);
    assert_eq!(
        extract(&buf, "INSERT", "Operations") as u64,
        THREADS * SAMPLES
    );
    // Exactly one series exported.
    assert_eq!(
        buf.lines()
            .filter(|l| l.starts_with("[INSERT], Operations,"))
            .count(),
        1
    );
}

// ─── Percentile ordering ─────────────────────────────────────────

#[test]
fn hdr_percentiles_are_monotonic() {
    let config = MeasurementConfig::default()
        .with_percentiles("50,90,99,99.9")
        .unwrap();
    let metrics = Measurements::new(config);

    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..50_000 {
        metrics.measure("READ", rng.gen_range(1..=1_000_000u64)).unwrap();
    }

    let buf = export(&metrics);
    let p50 = extract(&buf, "READ", "50thPercentileLatency(us)");
    let p90 = extract(&buf, "READ", "90thPercentileLatency(us)");
    let p99 = extract(&buf, "READ", "99thPercentileLatency(us)");
    let p999 = extract(&buf, "READ", "99.9PercentileLatency(us)");

    assert!(p50 <= p90, "p50={} p90={}", p50, p90);
    assert!(p90 <= p99, "p90={} p99={}", p90, p99);
    assert!(p99 <= p999, "p99={} p99.9={}", p99, p999);
}

#[test]
fn bucketed_percentiles_are_monotonic() {
    let metrics = Measurements::new(MeasurementConfig {
        strategy: StrategyKind::Histogram,
        ..MeasurementConfig::default()
    });

    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..50_000 {
        metrics.measure("READ", rng.gen_range(1..=500_000u64)).unwrap();
    }

    let buf = export(&metrics);
    let p95 = extract(&buf, "READ", "95thPercentileLatency(us)");
    let p99 = extract(&buf, "READ", "99thPercentileLatency(us)");
    assert!(p95 <= p99, "p95={} p99={}", p95, p99);
}

// ─── Exact-sample statistics ─────────────────────────────────────

#[test]
fn raw_statistics_are_exact() {
    let metrics = Measurements::new(MeasurementConfig {
        strategy: StrategyKind::Raw,
        ..MeasurementConfig::default()
    });

    let mut rng = StdRng::seed_from_u64(3);
    let samples: Vec<u64> = (0..10_000).map(|_| rng.gen_range(1..=250_000)).collect();
    for &latency in &samples {
        metrics.measure("UPDATE", latency).unwrap();
    }

    let buf = export(&metrics);
    let min = *samples.iter().min().unwrap();
    let max = *samples.iter().max().unwrap();
    let mean = samples.iter().sum::<u64>() as f64 / samples.len() as f64;

    assert_eq!(extract(&buf, "UPDATE", "MinLatency(us)") as u64, min);
    assert_eq!(extract(&buf, "UPDATE", "MaxLatency(us)") as u64, max);
    assert!((extract(&buf, "UPDATE", "AverageLatency(us)") - mean).abs() <= 1e-9);
}

// ─── Status codes ────────────────────────────────────────────────

#[test]
fn status_lines_sum_to_report_calls() {
    let metrics = Measurements::new(MeasurementConfig::default());
    for _ in 0..80 {
        metrics.report_status("READ", 0).unwrap();
    }
    for _ in 0..20 {
        metrics.report_status("READ", 4).unwrap();
    }

    let buf = export(&metrics);
    assert_eq!(extract(&buf, "READ", "Return=0") as u64, 80);
    assert_eq!(extract(&buf, "READ", "Return=4") as u64, 20);
}

// ─── Actual vs. intended ─────────────────────────────────────────

#[test]
fn both_mode_tracks_two_series_simultaneously() {
    let metrics = Arc::new(Measurements::new(MeasurementConfig {
        tracking: TrackingMode::Both,
        ..MeasurementConfig::default()
    }));

    // Simulate a generator that fell behind schedule: intended latencies
    // include the queueing delay, actual ones do not.
    let handles: Vec<_> = (0..4u64)
        .map(|worker| {
            let metrics = Arc::clone(&metrics);
            thread::spawn(move || {
                let mut rng = StdRng::seed_from_u64(worker);
                let mut intended = metrics.intended_start_time();
                for _ in 0..1000 {
                    let scheduled_ns = 1_000_000 * rng.gen_range(1..=100u64);
                    intended.set(scheduled_ns);

                    let service_us = rng.gen_range(50..=500u64);
                    let queue_us = rng.gen_range(0..=2_000u64);
                    metrics.measure("UPDATE", service_us).unwrap();
                    assert!(intended.get() > 0);
                    metrics
                        .measure_intended("UPDATE", service_us + queue_us)
                        .unwrap();
                    intended.clear();
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }

    let buf = export(&metrics);
    assert_eq!(extract(&buf, "UPDATE", "Operations") as u64, 4000);
    assert_eq!(extract(&buf, "Intended-UPDATE", "Operations") as u64, 4000);
    // Queueing delay only ever inflates the intended side.
    assert!(
        extract(&buf, "Intended-UPDATE", "AverageLatency(us)")
            >= extract(&buf, "UPDATE", "AverageLatency(us)")
    );
}
