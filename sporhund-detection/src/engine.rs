//! The matching engine: prefilter scan, per-signature verification.

use std::collections::BTreeSet;
use std::io::BufRead;
use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, warn};

use sporhund_signatures::{ScanFilter, SigId, SignatureSet, Verdict};
use sporhund_telemetry::MetricsRecorder;

use crate::cache::PrefilterCache;
use crate::error::ScanError;
use crate::prefilter::PrefilterIndex;

/// Minimum prefilter length admitted into the automaton. Shorter prefilters
/// produce catastrophic candidate counts on ordinary log data.
pub const MIN_PREFILTER_LEN: usize = 3;

/// A verified occurrence of a signature in a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    pub start: usize,
    pub stop: usize,
    pub sig: SigId,
}

/// All verified matches of one line, with the line they index into.
#[derive(Debug, Clone)]
pub struct LineMatches {
    pub line: String,
    pub matches: Vec<Match>,
}

impl LineMatches {
    /// The matched substring of `m`.
    pub fn matched(&self, m: &Match) -> &str {
        &self.line[m.start..m.stop]
    }
}

/// Two-stage scanner over one signature set.
pub struct MatchingEngine {
    set: Arc<SignatureSet>,
    filter: ScanFilter,
    index: PrefilterIndex,
    refused: Vec<String>,
    metrics: Option<MetricsRecorder>,
}

impl MatchingEngine {
    /// Build an engine with the default scan filter and minimum prefilter
    /// length.
    pub fn new(set: Arc<SignatureSet>) -> Result<Self, ScanError> {
        Self::with_options(set, ScanFilter::default(), MIN_PREFILTER_LEN)
    }

    pub fn with_options(
        set: Arc<SignatureSet>,
        filter: ScanFilter,
        min_prefilter_len: usize,
    ) -> Result<Self, ScanError> {
        let prefilters = set.prefilters(filter);
        Self::from_prefilters(set, filter, min_prefilter_len, prefilters)
    }

    /// Build an engine, reusing a cached prefilter list when one exists for
    /// the set's current cache tag, and writing one when it does not.
    pub fn with_cache(
        set: Arc<SignatureSet>,
        filter: ScanFilter,
        min_prefilter_len: usize,
        cache: &PrefilterCache,
    ) -> Result<Self, ScanError> {
        let tag = set.cache_tag();
        if let Some(prefilters) = cache.load(&tag)? {
            debug!(%tag, "using cached prefilter list");
            return Self::from_prefilters(
                set,
                filter,
                min_prefilter_len,
                prefilters.into_iter().collect(),
            );
        }
        let prefilters = set.prefilters(filter);
        cache.store(&tag, &prefilters)?;
        Self::from_prefilters(set, filter, min_prefilter_len, prefilters)
    }

    fn from_prefilters(
        set: Arc<SignatureSet>,
        filter: ScanFilter,
        min_prefilter_len: usize,
        prefilters: BTreeSet<String>,
    ) -> Result<Self, ScanError> {
        let started = Instant::now();
        let mut admitted = Vec::with_capacity(prefilters.len());
        let mut refused = Vec::new();
        for prefilter in prefilters {
            if prefilter.len() >= min_prefilter_len {
                admitted.push(prefilter);
            } else {
                warn!(
                    prefilter,
                    min = min_prefilter_len,
                    "refusing signature: prefilter shorter than minimum"
                );
                refused.push(prefilter);
            }
        }
        let index = PrefilterIndex::build(admitted)?;
        debug!(
            prefilters = index.len(),
            elapsed = ?started.elapsed(),
            "prefilter index built"
        );
        Ok(Self {
            set,
            filter,
            index,
            refused,
            metrics: None,
        })
    }

    /// Record scan counters and per-line latency on `metrics`.
    pub fn with_metrics(mut self, metrics: MetricsRecorder) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn set(&self) -> &SignatureSet {
        &self.set
    }

    /// Prefilters refused at build time for being shorter than the minimum.
    pub fn refused_prefilters(&self) -> &[String] {
        &self.refused
    }

    /// Scan one line, returning every verified match.
    ///
    /// Matches are ordered left-to-right by start offset, ties broken by
    /// signature id. Distinct signatures accepting the same span are all
    /// reported.
    pub fn scan_line(&self, line: &str) -> Vec<Match> {
        let started = Instant::now();
        let mut hits = 0u64;
        let mut matches = Vec::new();
        for hit in self.index.find_all(line) {
            hits += 1;
            for sig in self.set.get_by_prefilter(hit.pattern) {
                if !self.filter.admits(sig) {
                    continue;
                }
                if let Verdict::Accept { start, stop } = sig.verify(hit.start, hit.stop, line) {
                    matches.push(Match {
                        start,
                        stop,
                        sig: sig.id(),
                    });
                }
            }
        }
        matches.sort_by(|a, b| a.start.cmp(&b.start).then_with(|| a.sig.cmp(&b.sig)));

        if let Some(metrics) = &self.metrics {
            metrics.lines_scanned.inc();
            metrics.prefilter_hits.inc_by(hits as f64);
            metrics.matches_total.inc_by(matches.len() as f64);
            metrics.scan_seconds.observe(started.elapsed().as_secs_f64());
        }
        matches
    }

    /// Scan a line stream lazily, yielding one batch per matching line.
    ///
    /// Lines without matches are dropped. I/O errors surface once and
    /// terminate the iterator.
    pub fn scan_stream<R: BufRead>(&self, reader: R) -> ScanStream<'_, R> {
        ScanStream {
            engine: self,
            reader,
            done: false,
        }
    }
}

pub struct ScanStream<'e, R> {
    engine: &'e MatchingEngine,
    reader: R,
    done: bool,
}

impl<R: BufRead> Iterator for ScanStream<'_, R> {
    type Item = Result<LineMatches, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match self.reader.read_until(b'\n', &mut buf) {
                Ok(0) => {
                    self.done = true;
                    return None;
                }
                Ok(_) => {
                    if buf.last() == Some(&b'\n') {
                        buf.pop();
                    }
                    let line = String::from_utf8_lossy(&buf).into_owned();
                    let matches = self.engine.scan_line(&line);
                    if !matches.is_empty() {
                        return Some(Ok(LineMatches { line, matches }));
                    }
                }
                Err(err) => {
                    self.done = true;
                    return Some(Err(ScanError::Io(err)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Cursor;
    use tracing_test::traced_test;

    fn engine(sigs: &str) -> MatchingEngine {
        MatchingEngine::new(Arc::new(SignatureSet::from_text(sigs))).unwrap()
    }

    fn matched<'a>(line: &'a str, m: &Match) -> &'a str {
        &line[m.start..m.stop]
    }

    #[test]
    fn ip_does_not_hit_longer_address() {
        let e = engine("192.168.1.1");
        assert!(e.scan_line("asdf 192.168.1.11 asdf").is_empty());
    }

    #[test]
    fn cidr_claims_full_address() {
        let e = engine("192.168.1.0/24");
        let line = "asdf 192.168.1.1 asdf";
        let matches = e.scan_line(line);
        assert_eq!(matches.len(), 1);
        assert_eq!(matched(line, &matches[0]), "192.168.1.1");
    }

    #[test]
    fn range_claims_member_address() {
        let e = engine("192.168.1.0-192.168.1.254");
        let line = "hit 192.168.1.77 end";
        let matches = e.scan_line(line);
        assert_eq!(matches.len(), 1);
        assert_eq!(matched(line, &matches[0]), "192.168.1.77");
    }

    #[test]
    fn domain_respects_word_boundaries() {
        let e = engine("evil.com.");
        let line = "#evil.com#";
        let matches = e.scan_line(line);
        assert_eq!(matches.len(), 1);
        assert_eq!(matched(line, &matches[0]), "evil.com");

        assert!(e.scan_line("notevil.com").is_empty());
    }

    #[test]
    fn cidr_preceding_digit_guard() {
        let e = engine("12.58.246.0/24");
        assert!(e.scan_line("212.58.246.92").is_empty());
    }

    #[test]
    fn multiple_signatures_on_one_line() {
        let e = engine("evil.com\ngood.net\n");
        let line = "prefix evil.com and good.net suffix";
        let matches = e.scan_line(line);
        assert_eq!(matches.len(), 2);
        assert_eq!(matched(line, &matches[0]), "evil.com");
        assert_eq!(matched(line, &matches[1]), "good.net");
        assert!(matches[0].start < matches[1].start);
    }

    #[traced_test]
    #[test]
    fn short_prefilter_is_refused_not_fatal() {
        let e = engine("ab\nevil.com\n");
        assert_eq!(e.refused_prefilters(), ["ab"]);
        assert!(logs_contain("prefilter shorter than minimum"));

        let matches = e.scan_line("ab goes to evil.com");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].sig, sporhund_signatures::Digest::of("evil.com"));
    }

    #[test]
    fn inactive_signatures_do_not_match() {
        let set = SignatureSet::from_text("evil.com\ngood.net\n");
        let mut rebuilt = SignatureSet::from_text("");
        for mut sig in set.iter().cloned() {
            if sig.text() == "evil.com" {
                sig.active = false;
            }
            rebuilt.add(sig);
        }
        let e = MatchingEngine::new(Arc::new(rebuilt)).unwrap();
        let matches = e.scan_line("evil.com good.net");
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].sig, sporhund_signatures::Digest::of("good.net"));
    }

    #[test]
    fn scan_is_additive_over_signature_sets() {
        let line = "1335823199 client 192.168.1.33 fetched evil.com and good.net twice: evil.com";
        let p = engine("evil.com\n192.168.1.0/24\n");
        let q = engine("good.net\n");
        let both = engine("evil.com\n192.168.1.0/24\ngood.net\n");

        let mut expected: HashMap<(usize, usize, SigId), usize> = HashMap::new();
        for m in p.scan_line(line).into_iter().chain(q.scan_line(line)) {
            *expected.entry((m.start, m.stop, m.sig)).or_default() += 1;
        }
        let mut got: HashMap<(usize, usize, SigId), usize> = HashMap::new();
        for m in both.scan_line(line) {
            *got.entry((m.start, m.stop, m.sig)).or_default() += 1;
        }
        assert_eq!(expected, got);
    }

    #[test]
    fn metrics_count_every_scanned_line() {
        let metrics = MetricsRecorder::new();
        let set = Arc::new(SignatureSet::from_text("evil.com\n192.168.1.0/24\n"));
        let e = MatchingEngine::new(set).unwrap().with_metrics(metrics.clone());

        let input = Cursor::new("clean line\n192.168.1.7 pulled evil.com\nanother clean line\n");
        let batches: Vec<_> = e.scan_stream(input).map(Result::unwrap).collect();
        assert_eq!(batches.len(), 1);

        // Non-matching lines are dropped from the stream but still counted.
        assert_eq!(metrics.lines_scanned.get(), 3.0);
        assert_eq!(metrics.matches_total.get(), 2.0);
        assert!(metrics.prefilter_hits.get() >= 2.0);
        assert_eq!(metrics.scan_seconds.get_sample_count(), 3);
    }

    #[test]
    fn cached_prefilters_are_reused() {
        let dir = tempfile::tempdir().unwrap();
        let cache = PrefilterCache::new(dir.path());
        let set = Arc::new(SignatureSet::from_text("evil.com\n192.168.1.0/24\n"));
        let tag = set.cache_tag();

        let first = MatchingEngine::with_cache(
            Arc::clone(&set),
            ScanFilter::default(),
            MIN_PREFILTER_LEN,
            &cache,
        )
        .unwrap();
        assert!(dir.path().join(&tag).exists());

        // Second build goes through the cached list and matches identically.
        let second = MatchingEngine::with_cache(
            Arc::clone(&set),
            ScanFilter::default(),
            MIN_PREFILTER_LEN,
            &cache,
        )
        .unwrap();
        let line = "asdf 192.168.1.1 evil.com asdf";
        assert_eq!(first.scan_line(line), second.scan_line(line));
        assert_eq!(second.scan_line(line).len(), 2);
    }

    #[test]
    fn stream_drops_lines_without_matches() {
        let e = engine("evil.com");
        let input = Cursor::new("clean line\nvisit evil.com now\nanother clean line\n");
        let batches: Vec<_> = e.scan_stream(input).map(Result::unwrap).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].line, "visit evil.com now");
        assert_eq!(batches[0].matched(&batches[0].matches[0]), "evil.com");
    }

    #[test]
    fn stream_preserves_carriage_returns() {
        let e = engine("evil.com");
        let input = Cursor::new("visit evil.com\r\n");
        let batches: Vec<_> = e.scan_stream(input).map(Result::unwrap).collect();
        assert_eq!(batches[0].line, "visit evil.com\r");
    }

    #[test]
    fn stream_handles_missing_final_newline() {
        let e = engine("evil.com");
        let input = Cursor::new("visit evil.com");
        let batches: Vec<_> = e.scan_stream(input).map(Result::unwrap).collect();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].line, "visit evil.com");
    }
}
