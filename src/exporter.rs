use std::fmt;

// ─── Exported values ─────────────────────────────────────────────

/// One exported measurement value. The exporter interface is fed a mix of
/// counters, latencies and means, so the value keeps its original numeric
/// flavour instead of forcing everything through `f64`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MetricValue {
    Signed(i64),
    Unsigned(u64),
    Float(f64),
}

impl fmt::Display for MetricValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetricValue::Signed(v) => write!(f, "{}", v),
            MetricValue::Unsigned(v) => write!(f, "{}", v),
            MetricValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<i32> for MetricValue {
    fn from(v: i32) -> Self {
        MetricValue::Signed(v as i64)
    }
}

impl From<i64> for MetricValue {
    fn from(v: i64) -> Self {
        MetricValue::Signed(v)
    }
}

impl From<u32> for MetricValue {
    fn from(v: u32) -> Self {
        MetricValue::Unsigned(v as u64)
    }
}

impl From<u64> for MetricValue {
    fn from(v: u64) -> Self {
        MetricValue::Unsigned(v)
    }
}

impl From<usize> for MetricValue {
    fn from(v: usize) -> Self {
        MetricValue::Unsigned(v as u64)
    }
}

impl From<f64> for MetricValue {
    fn from(v: f64) -> Self {
        MetricValue::Float(v)
    }
}

// ─── Exporter interface ──────────────────────────────────────────

/// Sink for aggregated statistics. The registry fans export out to every
/// series, and each series emits `(metric, label, value)` triples — e.g.
/// `("READ", "99thPercentileLatency(us)", 1250)`.
///
/// Any failure while persisting is the implementation's responsibility to
/// report; the aggregation core treats writes as fire-and-forget.
pub trait MeasurementsExporter {
    fn write(&mut self, metric: &str, label: &str, value: MetricValue);
}

/// Reference exporter: accumulates `[metric], label, value` lines into an
/// in-memory buffer for printing at the end of a run.
#[derive(Debug, Default)]
pub struct TextMeasurementsExporter {
    buf: String,
}

impl TextMeasurementsExporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buf(&self) -> &str {
        &self.buf
    }

    pub fn print(&self) {
        println!("{}", self.buf);
    }
}

impl MeasurementsExporter for TextMeasurementsExporter {
    fn write(&mut self, metric: &str, label: &str, value: MetricValue) {
        self.buf
            .push_str(&format!("[{}], {}, {}\n", metric, label, value));
    }
}

// ─── Tests ───────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_exporter_formats_lines() {
        let mut exporter = TextMeasurementsExporter::new();
        exporter.write("READ", "Operations", 100u64.into());
        exporter.write("READ", "AverageLatency(us)", 50.5.into());
        exporter.write("READ", "Status", (-1i32).into());

        assert_eq!(
            exporter.buf(),
            "[READ], Operations, 100\n\
             [READ], AverageLatency(us), 50.5\n\
             [READ], Status, -1\n"
        );
    }

    #[test]
    fn value_display_keeps_numeric_flavour() {
        assert_eq!(MetricValue::from(42u64).to_string(), "42");
        assert_eq!(MetricValue::from(-7i64).to_string(), "-7");
        assert_eq!(MetricValue::from(0.25f64).to_string(), "0.25");
    }
}
