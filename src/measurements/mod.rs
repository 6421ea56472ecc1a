pub mod bucketed;
pub mod hdr;
pub mod raw;
pub mod series;

pub use series::{MeasurementSeries, ReturnCodeTracker, SeriesStats};

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::config::{MeasurementConfig, TrackingMode};
use crate::error::MetricsError;
use crate::exporter::MeasurementsExporter;

// ─── Registry ────────────────────────────────────────────────────

type SeriesMap = RwLock<HashMap<String, Arc<MeasurementSeries>>>;

/// The measurement registry for one benchmark run. Constructed once at run
/// start and passed by reference to every worker and to the driver — there
/// is no ambient global state.
///
/// Two independent maps key operation names to their series: "actual"
/// latencies (measured from the real dispatch instant) and "intended"
/// latencies (measured from the originally scheduled dispatch instant,
/// which is what exposes queueing delay under saturation).
pub struct Measurements {
    config: MeasurementConfig,
    actual: SeriesMap,
    intended: SeriesMap,
}

impl Measurements {
    pub fn new(config: MeasurementConfig) -> Self {
        Self {
            config,
            actual: RwLock::new(HashMap::new()),
            intended: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    /// Hand out the per-worker scheduled-dispatch holder. Workers own one
    /// each and thread it through their call chain; when intended tracking
    /// is disabled it degrades to a no-op.
    pub fn intended_start_time(&self) -> IntendedStartTime {
        IntendedStartTime {
            enabled: self.config.tracking != TrackingMode::ActualOnly,
            time_ns: 0,
        }
    }

    /// Record one "actual" latency sample. No-op when only intended
    /// latencies are tracked. Fails only if this is the first sample for
    /// `operation` and the series' configured sink cannot be opened.
    pub fn measure(&self, operation: &str, latency_us: u64) -> Result<(), MetricsError> {
        if self.config.tracking == TrackingMode::IntendedOnly {
            return Ok(());
        }
        self.series_for(&self.actual, operation, operation)?
            .measure(latency_us);
        Ok(())
    }

    /// Record one queueing-corrected latency sample. No-op when only actual
    /// latencies are tracked.
    pub fn measure_intended(&self, operation: &str, latency_us: u64) -> Result<(), MetricsError> {
        if self.config.tracking == TrackingMode::ActualOnly {
            return Ok(());
        }
        // When both sides are tracked the intended series gets a prefixed
        // name so the export tells them apart; intended-only reuses the
        // bare operation name.
        let series = match self.config.tracking {
            TrackingMode::IntendedOnly => self.series_for(&self.intended, operation, operation)?,
            _ => {
                let name = format!("Intended-{}", operation);
                self.series_for(&self.intended, operation, &name)?
            }
        };
        series.measure(latency_us);
        Ok(())
    }

    /// Count one outcome code for `operation`, routed to whichever map is
    /// the primary one under the current tracking mode.
    pub fn report_status(&self, operation: &str, status: i32) -> Result<(), MetricsError> {
        let series = if self.config.tracking == TrackingMode::IntendedOnly {
            self.series_for(&self.intended, operation, operation)?
        } else {
            self.series_for(&self.actual, operation, operation)?
        };
        series.report_status(status);
        Ok(())
    }

    /// Look up the series for `key`, creating it under `name` on first use.
    /// Shared-lock fast path; a miss upgrades to the write lock and
    /// re-checks, so racing first recorders settle on exactly one series.
    fn series_for(
        &self,
        map: &SeriesMap,
        key: &str,
        name: &str,
    ) -> Result<Arc<MeasurementSeries>, MetricsError> {
        if let Some(series) = map.read().get(key) {
            return Ok(Arc::clone(series));
        }

        let mut map = map.write();
        if let Some(series) = map.get(key) {
            return Ok(Arc::clone(series));
        }
        let series = Arc::new(MeasurementSeries::new(name, &self.config)?);
        map.insert(key.to_owned(), Arc::clone(&series));
        Ok(series)
    }

    /// Fan export out over every series in both maps. Holds each map's
    /// shared lock for the duration, which blocks creation of new operation
    /// names but never recording into existing series.
    pub fn export_measurements(
        &self,
        exporter: &mut dyn MeasurementsExporter,
    ) -> Result<(), MetricsError> {
        for series in self.actual.read().values() {
            series.export_measurements(exporter)?;
        }
        for series in self.intended.read().values() {
            series.export_measurements(exporter)?;
        }
        Ok(())
    }

    /// One-line progress summary across every series. Resets each series'
    /// windowed counters as a side effect.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for map in [&self.actual, &self.intended] {
            for series in map.read().values() {
                let line = series.summary();
                if line.is_empty() {
                    continue;
                }
                if !out.is_empty() {
                    out.push(' ');
                }
                out.push_str(&line);
            }
        }
        out
    }
}

// ─── Intended-start context ──────────────────────────────────────

/// Per-worker scheduled-dispatch timestamp. The driver sets it before
/// issuing each operation and reads it back on completion to compute the
/// intended (queueing-corrected) latency. Zero means no correction applies
/// to the current call.
///
/// Owned by the worker and passed along explicitly — deliberately not a
/// thread-local.
#[derive(Debug, Clone, Copy)]
pub struct IntendedStartTime {
    enabled: bool,
    time_ns: u64,
}

impl IntendedStartTime {
    pub fn set(&mut self, time_ns: u64) {
        if self.enabled {
            self.time_ns = time_ns;
        }
    }

    pub fn get(&self) -> u64 {
        if self.enabled {
            self.time_ns
        } else {
            0
        }
    }

    pub fn clear(&mut self) {
        self.time_ns = 0;
    }
}

// ─── Tests ───────────────────────────────────────────────────────
