use std::path::PathBuf;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MetricsError;

// ─── Strategy / tracking selection ───────────────────────────────

/// Which aggregation strategy backs every series. Selected once at run
/// start and applied uniformly to each operation name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Keep every sample; exact percentiles, unbounded memory.
    Raw,
    /// Fixed 1 ms buckets; cheap, percentiles rounded to bucket width.
    Histogram,
    /// Log-scale histogram with bounded relative error.
    #[default]
    HdrHistogram,
}

impl FromStr for StrategyKind {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "raw" => Ok(StrategyKind::Raw),
            "histogram" => Ok(StrategyKind::Histogram),
            "hdrhistogram" => Ok(StrategyKind::HdrHistogram),
            other => Err(MetricsError::UnknownStrategy(other.to_owned())),
        }
    }
}

/// Whether latencies are recorded against the real dispatch time ("op"),
/// the originally scheduled dispatch time ("intended"), or both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TrackingMode {
    #[default]
    #[serde(rename = "op")]
    ActualOnly,
    #[serde(rename = "intended")]
    IntendedOnly,
    #[serde(rename = "both")]
    Both,
}

impl FromStr for TrackingMode {
    type Err = MetricsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "op" => Ok(TrackingMode::ActualOnly),
            "intended" => Ok(TrackingMode::IntendedOnly),
            "both" => Ok(TrackingMode::Both),
            other => Err(MetricsError::UnknownTrackingMode(other.to_owned())),
        }
    }
}

// ─── Configuration ───────────────────────────────────────────────

/// Everything the measurement core needs to know, fixed for the lifetime
/// of a run. The driver builds one of these (typically deserialized from
/// its properties blob) and hands it to [`Measurements::new`].
///
/// [`Measurements::new`]: crate::measurements::Measurements::new
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MeasurementConfig {
    pub strategy: StrategyKind,
    pub tracking: TrackingMode,

    /// Bucket count for the bucketed histogram; 1 ms per bucket, so the
    /// default covers one second of latency before overflow.
    pub histogram_buckets: usize,

    /// Percentile points exported by the dynamic-range histogram.
    pub percentiles: Vec<f64>,

    /// Additionally export raw bucket counts (bucketed histogram) or every
    /// recorded value/count pair (dynamic-range histogram).
    pub verbose: bool,

    /// Where the raw strategy writes its sample rows; `None` routes them
    /// through the exporter instead.
    pub raw_output_path: Option<PathBuf>,

    /// Suppress the raw strategy's summary statistics. Useful when it is
    /// chained behind a histogram strategy that already emits approximate
    /// summaries and is kept only for the raw rows.
    pub raw_no_summary: bool,

    /// Directory for the dynamic-range histogram's interval log
    /// (`{dir}/{operation}.hdr`); `None` disables the log.
    pub hdr_log_dir: Option<PathBuf>,

    /// Highest trackable latency and significant-figure precision of the
    /// dynamic-range histogram. Fixed once the first series is built.
    pub hdr_max_value_us: u64,
    pub hdr_sigfigs: u8,
}

impl Default for MeasurementConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::default(),
            tracking: TrackingMode::default(),
            histogram_buckets: 1000,
            percentiles: vec![95.0, 99.0],
            verbose: false,
            raw_output_path: None,
            raw_no_summary: false,
            hdr_log_dir: None,
            hdr_max_value_us: 60_000_000,
            hdr_sigfigs: 3,
        }
    }
}

impl MeasurementConfig {
    /// Replace the percentile list from its textual form, e.g. `"95,99.9"`.
    /// Fails before any recording begins if the list is malformed.
    pub fn with_percentiles(mut self, list: &str) -> Result<Self, MetricsError> {
        self.percentiles = parse_percentiles(list)?;
        Ok(self)
    }
}

/// Parse a comma-separated list of percentile points. Every token must be
/// a number in `(0, 100]`; an empty list or a garbage token is rejected.
pub fn parse_percentiles(list: &str) -> Result<Vec<f64>, MetricsError> {
    let malformed = || MetricsError::Percentiles {
        input: list.to_owned(),
    };

    let mut points = Vec::new();
    for token in list.split(',') {
        let p: f64 = token.trim().parse().map_err(|_| malformed())?;
        if !p.is_finite() || p <= 0.0 || p > 100.0 {
            return Err(malformed());
        }
        points.push(p);
    }
    if points.is_empty() {
        return Err(malformed());
    }
    Ok(points)
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_percentile_lists() {
        assert_eq!(parse_percentiles("95,99").unwrap(), vec![95.0, 99.0]);
        assert_eq!(
            parse_percentiles("50, 90, 99.9, 99.99").unwrap(),
            vec![50.0, 90.0, 99.9, 99.99]
        );
    }

    #[test]
    fn rejects_malformed_percentile_lists() {
        assert!(parse_percentiles("").is_err());
        assert!(parse_percentiles("95,,99").is_err());
        assert!(parse_percentiles("ninety-five").is_err());
        assert!(parse_percentiles("0").is_err());
        assert!(parse_percentiles("101").is_err());
        assert!(parse_percentiles("-5").is_err());
    }

    #[test]
    fn strategy_and_tracking_from_str() {
        assert_eq!("raw".parse::<StrategyKind>().unwrap(), StrategyKind::Raw);
        assert_eq!(
            "hdrhistogram".parse::<StrategyKind>().unwrap(),
            StrategyKind::HdrHistogram
        );
        assert!("timeseries".parse::<StrategyKind>().is_err());

        assert_eq!("op".parse::<TrackingMode>().unwrap(), TrackingMode::ActualOnly);
        assert_eq!(
            "both".parse::<TrackingMode>().unwrap(),
            TrackingMode::Both
        );
        assert!("sometimes".parse::<TrackingMode>().is_err());
    }

    #[test]
    fn config_deserializes_from_json() {
        let config: MeasurementConfig = serde_json::from_str(
            r#"{
                "strategy": "histogram",
                "tracking": "both",
                "histogram_buckets": 500,
                "verbose": true
            }"#,
        )
        .unwrap();

        assert_eq!(config.strategy, StrategyKind::Histogram);
        assert_eq!(config.tracking, TrackingMode::Both);
        assert_eq!(config.histogram_buckets, 500);
        assert!(config.verbose);
        // Untouched fields fall back to defaults.
        assert_eq!(config.percentiles, vec![95.0, 99.0]);
        assert_eq!(config.hdr_sigfigs, 3);
    }
}
