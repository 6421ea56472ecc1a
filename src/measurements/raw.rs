use std::fs::File;
use std::io::{BufWriter, Write};

use chrono::Utc;
use parking_lot::Mutex;

use crate::config::MeasurementConfig;
use crate::error::MetricsError;
use crate::exporter::MeasurementsExporter;

use super::series::ReturnCodeTracker;

// ─── Exact-sample strategy ───────────────────────────────────────

/// One timestamped observation, in arrival order.
#[derive(Debug, Clone, Copy)]
pub struct RawDataPoint {
    pub timestamp_ms: i64,
    pub latency_us: u64,
}

/// Keeps every sample. Percentiles come out exact (computed from a sorted
/// copy at export time) at the cost of unbounded memory, so this strategy
/// suits shorter runs or post-hoc analysis of the raw rows.
pub struct RawMeasurement {
    name: String,
    no_summary: bool,
    inner: Mutex<Inner>,
}

struct Inner {
    /// Sink for the raw rows, opened at construction so a bad path fails
    /// the run immediately. `None` routes rows through the exporter.
    sink: Option<BufWriter<File>>,
    samples: Vec<RawDataPoint>,
    total_latency: u64,

    // Window since the previous summary() call.
    window_ops: u64,
    window_latency: u64,
}

impl RawMeasurement {
    pub(crate) fn new(name: &str, config: &MeasurementConfig) -> Result<Self, MetricsError> {
        let sink = match &config.raw_output_path {
            Some(path) => {
                let file = File::create(path).map_err(|source| MetricsError::Sink {
                    path: path.clone(),
                    source,
                })?;
                Some(BufWriter::new(file))
            }
            None => None,
        };

        Ok(Self {
            name: name.to_owned(),
            no_summary: config.raw_no_summary,
            inner: Mutex::new(Inner {
                sink,
                samples: Vec::new(),
                total_latency: 0,
                window_ops: 0,
                window_latency: 0,
            }),
        })
    }

    /// Append one timestamped sample. The per-series lock makes the append
    /// atomic; arrival order is preserved across concurrent callers.
    pub fn measure(&self, latency_us: u64) {
        let timestamp_ms = Utc::now().timestamp_millis();

        let mut inner = self.inner.lock();
        inner.total_latency += latency_us;
        inner.window_ops += 1;
        inner.window_latency += latency_us;
        inner.samples.push(RawDataPoint {
            timestamp_ms,
            latency_us,
        });
    }

    /// One-line count/mean of the window since the previous call, then
    /// reset the window. Empty window renders as the empty string.
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
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let total_ops = inner.samples.len();

        // Raw rows: op, timestamp(ms), latency(us).
        match inner.sink.as_mut() {
            Some(sink) => {
                writeln!(
                    sink,
                    "{} latency raw data: op, timestamp(ms), latency(us)",
                    self.name
                )?;
                for point in &inner.samples {
                    writeln!(sink, "{},{},{}", self.name, point.timestamp_ms, point.latency_us)?;
                }
                sink.flush()?;
            }
            None => {
                for point in &inner.samples {
                    exporter.write(
                        &self.name,
                        &point.timestamp_ms.to_string(),
                        point.latency_us.into(),
                    );
                }
            }
        }

        exporter.write(&self.name, "Operations", total_ops.into());

        if total_ops > 0 && !self.no_summary {
            let mean = inner.total_latency as f64 / total_ops as f64;
            exporter.write(&self.name, "AverageLatency(us)", mean.into());

            // Sort a copy; recording order stays untouched.
            let mut sorted = inner.samples.clone();
            sorted.sort_by_key(|point| point.latency_us);

            exporter.write(&self.name, "MinLatency(us)", sorted[0].latency_us.into());
            exporter.write(
                &self.name,
                "MaxLatency(us)",
                sorted[total_ops - 1].latency_us.into(),
            );

            // Index floor(count * p) into the ascending sort, no interpolation.
            let points: [(&str, f64); 8] = [
                ("p1", 0.01),
                ("p5", 0.05),
                ("p50", 0.5),
                ("p90", 0.9),
                ("p95", 0.95),
                ("p99", 0.99),
                ("p99.9", 0.999),
                ("p99.99", 0.9999),
            ];
            for (label, p) in points {
                let idx = (total_ops as f64 * p) as usize;
                exporter.write(&self.name, label, sorted[idx].latency_us.into());
            }
        }

        codes.export_counts(&self.name, exporter);
        Ok(())
    }
}

// ─── Tests ───────────────────────────────────────────────────────
