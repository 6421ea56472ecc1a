use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::config::{MeasurementConfig, StrategyKind};
use crate::error::MetricsError;
use crate::exporter::MeasurementsExporter;

use super::bucketed::HistogramMeasurement;
use super::hdr::HdrMeasurement;
use super::raw::RawMeasurement;

// ─── Return codes ────────────────────────────────────────────────

/// Concurrent counter of outcome codes for one operation. Guarded
/// independently from the latency state of the same series, so status
/// reporting never contends with latency recording.
#[derive(Debug, Default)]
pub struct ReturnCodeTracker {
    counts: RwLock<HashMap<i32, AtomicU64>>,
}

impl ReturnCodeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one occurrence of `status`. Fast path is a shared lock plus an
    /// atomic increment; only the first occurrence of a new code upgrades
    /// to the write lock (re-checked there, so racing first reporters
    /// settle on a single counter with no lost increments).
    pub fn report(&self, status: i32) {
        {
            let counts = self.counts.read();
            if let Some(counter) = counts.get(&status) {
                counter.fetch_add(1, Ordering::Relaxed);
                return;
            }
        }
        let mut counts = self.counts.write();
        counts
            .entry(status)
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(1, Ordering::Relaxed);
    }

    /// One `Return=<code>` line per distinct code.
    pub fn export_counts(&self, name: &str, exporter: &mut dyn MeasurementsExporter) {
        let counts = self.counts.read();
        for (status, count) in counts.iter() {
            exporter.write(
                name,
                &format!("Return={}", status),
                count.load(Ordering::Relaxed).into(),
            );
        }
    }
}

// ─── Per-operation series ────────────────────────────────────────

/// The aggregation strategy backing one series. Exactly three variants,
/// chosen once from configuration and fixed for the run.
pub enum SeriesStats {
    Raw(RawMeasurement),
    Histogram(HistogramMeasurement),
    HdrHistogram(HdrMeasurement),
}

/// Everything tracked for one operation name: latency statistics plus the
/// outcome-code counters. Created at most once per (map, name) pair and
/// kept for the lifetime of the registry.
pub struct MeasurementSeries {
    stats: SeriesStats,
    codes: ReturnCodeTracker,
}

impl MeasurementSeries {
    pub(crate) fn new(name: &str, config: &MeasurementConfig) -> Result<Self, MetricsError> {
        let stats = match config.strategy {
            StrategyKind::Raw => SeriesStats::Raw(RawMeasurement::new(name, config)?),
            StrategyKind::Histogram => {
                SeriesStats::Histogram(HistogramMeasurement::new(name, config))
            }
            StrategyKind::HdrHistogram => {
                SeriesStats::HdrHistogram(HdrMeasurement::new(name, config)?)
            }
        };
        Ok(Self {
            stats,
            codes: ReturnCodeTracker::new(),
        })
    }

    pub fn measure(&self, latency_us: u64) {
        match &self.stats {
            SeriesStats::Raw(m) => m.measure(latency_us),
            SeriesStats::Histogram(m) => m.measure(latency_us),
            SeriesStats::HdrHistogram(m) => m.measure(latency_us),
        }
    }

    pub fn report_status(&self, status: i32) {
        self.codes.report(status);
    }

    pub fn summary(&self) -> String {
        match &self.stats {
            SeriesStats::Raw(m) => m.summary(),
            SeriesStats::Histogram(m) => m.summary(),
            SeriesStats::HdrHistogram(m) => m.summary(),
        }
    }

    pub fn export_measurements(
        &self,
        exporter: &mut dyn MeasurementsExporter,
    ) -> Result<(), MetricsError> {
        match &self.stats {
            SeriesStats::Raw(m) => m.export_measurements(exporter, &self.codes),
            SeriesStats::Histogram(m) => m.export_measurements(exporter, &self.codes),
            SeriesStats::HdrHistogram(m) => m.export_measurements(exporter, &self.codes),
        }
    }
}

// ─── Tests ───────────────────────────────────────────────────────
