use parking_lot::Mutex;

use crate::config::MeasurementConfig;
use crate::error::MetricsError;
use crate::exporter::MeasurementsExporter;

use super::series::ReturnCodeTracker;

// ─── Bucketed-histogram strategy ─────────────────────────────────

/// Fixed array of 1 ms buckets plus an overflow counter. Constant memory
/// and O(1) recording; exported percentiles are approximations bounded to
/// the bucket width, found by scanning the cumulative counts.
///
/// All fields move together under one per-series lock so min/max and the
/// running sums can never tear against each other (the lock is scoped to
/// the series, not the registry map, so unrelated operations don't
/// serialize on it).
pub struct HistogramMeasurement {
    name: String,
    verbose: bool,
    inner: Mutex<Inner>,
}

struct Inner {
    buckets: Vec<u64>,
    /// Samples at or beyond `buckets.len()` milliseconds.
    overflow: u64,

    operations: u64,
    total_latency: u64,
    total_squared_latency: f64,
    /// Valid only when `operations > 0`; the first sample sets both.
    min: u64,
    max: u64,

    window_ops: u64,
    window_latency: u64,
}

impl HistogramMeasurement {
    pub(crate) fn new(name: &str, config: &MeasurementConfig) -> Self {
        Self {
            name: name.to_owned(),
            verbose: config.verbose,
            inner: Mutex::new(Inner {
                buckets: vec![0; config.histogram_buckets],
                overflow: 0,
                operations: 0,
                total_latency: 0,
                total_squared_latency: 0.0,
                min: 0,
                max: 0,
                window_ops: 0,
                window_latency: 0,
            }),
        }
    }

    pub fn measure(&self, latency_us: u64) {
        let mut inner = self.inner.lock();

        let bucket = (latency_us / 1000) as usize;
        if bucket >= inner.buckets.len() {
            inner.overflow += 1;
        } else {
            inner.buckets[bucket] += 1;
        }

        if inner.operations == 0 {
            inner.min = latency_us;
            inner.max = latency_us;
        } else {
            inner.min = inner.min.min(latency_us);
            inner.max = inner.max.max(latency_us);
        }

        inner.operations += 1;
        inner.total_latency += latency_us;
        inner.total_squared_latency += (latency_us as f64) * (latency_us as f64);
        inner.window_ops += 1;
        inner.window_latency += latency_us;
    }

    pub fn summary(&self) -> String {
        let mut inner = self.inner.lock();
        if inner.window_ops == 0 {
            return String::new();
        }
        let avg = inner.window_latency as f64 / inner.window_ops as f64;
        let line = format!(
            "{} count: {}, average latency(us): {:.2}",
            self.name, inner.window_ops, avg
        );
        inner.window_ops = 0;
        inner.window_latency = 0;
        line
    }

    pub fn export_measurements(
        &self,
        exporter: &mut dyn MeasurementsExporter,
        codes: &ReturnCodeTracker,
    ) -> Result<(), MetricsError> {
        let inner = self.inner.lock();

        exporter.write(&self.name, "Operations", inner.operations.into());

        if inner.operations > 0 {
            let mean = inner.total_latency as f64 / inner.operations as f64;
            let variance = inner.total_squared_latency / inner.operations as f64 - mean * mean;
            exporter.write(&self.name, "AverageLatency(us)", mean.into());
            exporter.write(&self.name, "LatencyVariance(us)", variance.into());
            exporter.write(&self.name, "MinLatency(us)", inner.min.into());
            exporter.write(&self.name, "MaxLatency(us)", inner.max.into());

            // Cumulative scan: report the first bucket where the running
            // fraction reaches the target. Precision is the 1 ms bucket
            // width, so these are approximations, not exact percentiles.
            let mut seen = 0u64;
            let mut done_95th = false;
            for (i, count) in inner.buckets.iter().enumerate() {
                seen += count;
                let fraction = seen as f64 / inner.operations as f64;
                if !done_95th && fraction >= 0.95 {
                    exporter.write(
                        &self.name,
                        "95thPercentileLatency(us)",
                        (i as u64 * 1000).into(),
                    );
                    done_95th = true;
                }
                if fraction >= 0.99 {
                    exporter.write(
                        &self.name,
                        "99thPercentileLatency(us)",
                        (i as u64 * 1000).into(),
                    );
                    break;
                }
            }
        }

        codes.export_counts(&self.name, exporter);

        if self.verbose {
            for (i, count) in inner.buckets.iter().enumerate() {
                exporter.write(&self.name, &i.to_string(), (*count).into());
            }
            exporter.write(
                &self.name,
                &format!(">{}", inner.buckets.len()),
                inner.overflow.into(),
            );
        }

        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────
