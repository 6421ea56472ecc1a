//! Benchmark measurement core: workers record per-operation latency samples
//! and outcome codes, the registry aggregates them (three interchangeable
//! strategies with different memory/precision trade-offs) and exports the
//! result through an exporter interface.
//!
//! The workload driver and the backend adapters live outside this crate;
//! they talk to the core through three calls:
//!
//! ```
//! use bench_metrics::{MeasurementConfig, Measurements, TextMeasurementsExporter};
//!
//! let metrics = Measurements::new(MeasurementConfig::default());
//!
//! // From a worker, after each operation completes:
//! metrics.measure("READ", 250).unwrap();
//! metrics.report_status("READ", 0).unwrap();
//!
//! // From the driver, at report time:
//! let mut exporter = TextMeasurementsExporter::new();
//! metrics.export_measurements(&mut exporter).unwrap();
//! assert!(exporter.buf().contains("[READ], Operations, 1"));
//! ```
//!
//! Intended vs. actual: under backpressure a slow operation delays the
//! dispatch of the next one, so latency measured from the real dispatch
//! instant silently hides queueing delay (coordinated omission). Workers
//! carry an [`IntendedStartTime`] holding the originally scheduled dispatch
//! timestamp and record the corrected latency via
//! [`Measurements::measure_intended`].

pub mod config;
pub mod error;
pub mod exporter;
pub mod measurements;

pub use config::{parse_percentiles, MeasurementConfig, StrategyKind, TrackingMode};
pub use error::MetricsError;
pub use exporter::{MeasurementsExporter, MetricValue, TextMeasurementsExporter};
pub use measurements::{IntendedStartTime, MeasurementSeries, Measurements, ReturnCodeTracker};
