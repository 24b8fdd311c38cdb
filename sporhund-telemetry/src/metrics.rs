//! Prometheus metrics for scan runs.

use prometheus::{Counter, Histogram, HistogramOpts, Registry};

#[derive(Debug, Clone)]
pub struct MetricsRecorder {
    pub registry: Registry,
    pub lines_scanned: Counter,
    pub prefilter_hits: Counter,
    pub matches_total: Counter,
    pub alarms_total: Counter,
    pub scan_seconds: Histogram,
}

impl Default for MetricsRecorder {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsRecorder {
    pub fn new() -> Self {
        let registry = Registry::new();
        let lines_scanned =
            Counter::new("sporhund_lines_scanned_total", "Lines scanned").unwrap();
        let prefilter_hits = Counter::new(
            "sporhund_prefilter_hits_total",
            "Prefilter automaton hits before verification",
        )
        .unwrap();
        let matches_total =
            Counter::new("sporhund_matches_total", "Verified signature matches").unwrap();
        let alarms_total = Counter::new("sporhund_alarms_total", "Alarms raised").unwrap();
        let scan_seconds = Histogram::with_opts(
            HistogramOpts::new("sporhund_scan_seconds", "Detection time per scanned line")
                .buckets(vec![1e-6, 1e-5, 1e-4, 1e-3, 1e-2]),
        )
        .unwrap();

        registry.register(Box::new(lines_scanned.clone())).unwrap();
        registry.register(Box::new(prefilter_hits.clone())).unwrap();
        registry.register(Box::new(matches_total.clone())).unwrap();
        registry.register(Box::new(alarms_total.clone())).unwrap();
        registry.register(Box::new(scan_seconds.clone())).unwrap();

        Self {
            registry,
            lines_scanned,
            prefilter_hits,
            matches_total,
            alarms_total,
            scan_seconds,
        }
    }

    pub fn gather(&self) -> Result<String, prometheus::Error> {
        use prometheus::Encoder;
        let encoder = prometheus::TextEncoder::new();
        let mut buffer = Vec::<u8>::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_show_up_in_export() {
        let metrics = MetricsRecorder::new();
        metrics.lines_scanned.inc();
        metrics.prefilter_hits.inc_by(2.0);
        metrics.matches_total.inc_by(3.0);
        let text = metrics.gather().unwrap();
        assert!(text.contains("sporhund_lines_scanned_total 1"));
        assert!(text.contains("sporhund_prefilter_hits_total 2"));
        assert!(text.contains("sporhund_matches_total 3"));
    }
}
