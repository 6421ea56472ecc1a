use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::mem;
use std::time::{Duration, Instant, SystemTime};

use hdrhistogram::serialization::interval_log::IntervalLogWriterBuilder;
use hdrhistogram::serialization::V2Serializer;
use hdrhistogram::Histogram;
use parking_lot::Mutex;

use crate::config::MeasurementConfig;
use crate::error::MetricsError;
use crate::exporter::MeasurementsExporter;

use super::series::ReturnCodeTracker;

// ─── Dynamic-range strategy ──────────────────────────────────────

/// Log-scale histogram with bounded relative error across the whole
/// trackable range. Recording goes into an interval histogram that is
/// periodically swapped out for a fresh one and merged into a running
/// lifetime total; increments racing the swap simply land in the next
/// interval.
pub struct HdrMeasurement {
    name: String,
    verbose: bool,
    percentiles: Vec<f64>,
    inner: Mutex<Inner>,
}

struct Inner {
    interval: Histogram<u64>,
    total: Histogram<u64>,
    log: Option<IntervalLog>,
}

/// Structured interval log: header once at construction, one record per
/// snapshot, all offsets relative to the base timestamp established here.
struct IntervalLog {
    file: BufWriter<File>,
    base: Instant,
    last_snapshot: Duration,
}

impl HdrMeasurement {
    pub(crate) fn new(name: &str, config: &MeasurementConfig) -> Result<Self, MetricsError> {
        let interval = Histogram::new_with_bounds(1, config.hdr_max_value_us, config.hdr_sigfigs)?;
        let total = Histogram::new_from(&interval);

        let log = match &config.hdr_log_dir {
            Some(dir) => {
                let path = dir.join(format!("{}.hdr", name));
                let file = File::create(&path).map_err(|source| MetricsError::Sink {
                    path: path.clone(),
                    source,
                })?;
                let mut log = IntervalLog {
                    file: BufWriter::new(file),
                    base: Instant::now(),
                    last_snapshot: Duration::ZERO,
                };
                log.write_header(name)?;
                Some(log)
            }
            None => None,
        };

        Ok(Self {
            name: name.to_owned(),
            verbose: config.verbose,
            percentiles: config.percentiles.clone(),
            inner: Mutex::new(Inner {
                interval,
                total,
                log,
            }),
        })
    }

    /// Record one latency. Values are clamped to the trackable range; the
    /// critical section is a single histogram increment.
    pub fn measure(&self, latency_us: u64) {
        let mut inner = self.inner.lock();
        inner.interval.saturating_record(latency_us.max(1));
    }

    /// Swap the interval histogram for a fresh one, fold the sampled
    /// interval into the lifetime total and append it to the log when one
    /// is configured. Returns the sampled interval.
    fn snapshot_and_accumulate(inner: &mut Inner) -> Histogram<u64> {
        let fresh = Histogram::new_from(&inner.interval);
        let interval = mem::replace(&mut inner.interval, fresh);

        // Identical bounds, so the merge cannot fail.
        inner
            .total
            .add(&interval)
            .expect("interval and total share bounds");

        if let Some(log) = inner.log.as_mut() {
            // Log appends are best-effort; a full disk must not take the
            // in-memory statistics down with it.
            let _ = log.append(&interval);
        }

        interval
    }

    /// Compact one-line rendering of the just-sampled interval (not the
    /// lifetime total).
    pub fn summary(&self) -> String {
        let mut inner = self.inner.lock();
        let interval = Self::snapshot_and_accumulate(&mut inner);
        format!(
            "[{}: Count={}, Max={}, Min={}, Avg={:.2}, 90={}, 99={}, 99.9={}, 99.99={}]",
            self.name,
            interval.len(),
            interval.max(),
            interval.min(),
            interval.mean(),
            interval.value_at_percentile(90.0),
            interval.value_at_percentile(99.0),
            interval.value_at_percentile(99.9),
            interval.value_at_percentile(99.99),
        )
    }

    pub fn export_measurements(
        &self,
        exporter: &mut dyn MeasurementsExporter,
        codes: &ReturnCodeTracker,
    ) -> Result<(), MetricsError> {
        let mut inner = self.inner.lock();
        Self::snapshot_and_accumulate(&mut inner);
        let total = &inner.total;

        exporter.write(&self.name, "Operations", total.len().into());
        exporter.write(&self.name, "AverageLatency(us)", total.mean().into());
        exporter.write(&self.name, "MinLatency(us)", total.min().into());
        exporter.write(&self.name, "MaxLatency(us)", total.max().into());

        for &p in &self.percentiles {
            exporter.write(
                &self.name,
                &format!("{}PercentileLatency(us)", ordinal(p)),
                total.value_at_percentile(p).into(),
            );
        }

        codes.export_counts(&self.name, exporter);

        if self.verbose {
            // Sparse iteration over values actually recorded.
            for v in total.iter_recorded() {
                exporter.write(
                    &self.name,
                    &v.value_iterated_to().to_string(),
                    (v.count_at_value() as f64).into(),
                );
            }
        }

        Ok(())
    }
}

impl IntervalLog {
    fn write_header(&mut self, name: &str) -> io::Result<()> {
        let mut serializer = V2Serializer::new();
        let mut builder = IntervalLogWriterBuilder::new();
        builder
            .add_comment(&format!("Logging for: {}", name))
            .with_start_time(SystemTime::now())
            .with_base_time(SystemTime::now());
        builder
            .begin_log_with(&mut self.file, &mut serializer)
            .map(|_| ())?;
        self.file.flush()
    }

    fn append(&mut self, interval: &Histogram<u64>) -> io::Result<()> {
        let now = self.base.elapsed();
        let start = self.last_snapshot;
        self.last_snapshot = now;

        let mut serializer = V2Serializer::new();
        let mut writer = IntervalLogWriterBuilder::new()
            .begin_log_with(&mut self.file, &mut serializer)?;
        writer
            .write_histogram(interval, start, now - start, None)
            .map_err(|e| io::Error::new(io::ErrorKind::Other, format!("{:?}", e)))?;
        drop(writer);
        self.file.flush()
    }
}

/// Render a percentile point with its ordinal suffix: 1st, 2nd, 3rd, 4th,
/// with 11th/12th/13th as the irregular-teen exception. Non-integer points
/// render as the bare number.
pub(crate) fn ordinal(p: f64) -> String {
    if p.fract() != 0.0 {
        return format!("{}", p);
    }
    let n = p as i64;
    let suffix = match n % 100 {
        11 | 12 | 13 => "th",
        _ => match n % 10 {
            1 => "st",
            2 => "nd",
            3 => "rd",
            _ => "th",
        },
    };
    format!("{}{}", n, suffix)
}

// ─── Tests ───────────────────────────────────────────────────────
