use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced by the measurement core. Everything here is either a
/// configuration problem (caught before any recording begins) or a sink
/// failure (caught when the owning series is constructed or exported).
#[derive(Debug, Error)]
pub enum MetricsError {
    /// A configured output sink could not be opened. Raised from the first
    /// recording call that lazily constructs the series, never deferred to
    /// the first write.
    #[error("failed to open measurement sink {}", path.display())]
    Sink {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Writing raw rows or interval-log records to an already-open sink
    /// failed during export.
    #[error("failed to write to measurement sink")]
    SinkWrite(#[from] io::Error),

    /// The comma-separated percentile list did not parse.
    #[error("invalid percentile list {input:?}")]
    Percentiles { input: String },

    /// Unknown aggregation strategy name in configuration.
    #[error("unknown measurement strategy {0:?}")]
    UnknownStrategy(String),

    /// Unknown tracking-mode name in configuration.
    #[error("unknown tracking mode {0:?}")]
    UnknownTrackingMode(String),

    /// The dynamic-range histogram could not be built from the configured
    /// value range / precision.
    #[error("invalid histogram parameters")]
    Histogram(#[from] hdrhistogram::CreationError),
}
