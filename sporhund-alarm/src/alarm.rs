//! Alarm assembly from a line's verified matches.

use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use sporhund_detection::{LineMatches, Match, MatchingEngine};
use sporhund_signatures::{Digest, SigId, SignatureSet};

/// Stable identity of an alarm: the SHA-224 digest of its line.
pub type AlarmId = Digest;

/// One alarm: a line with at least one verified match.
#[derive(Debug, Clone)]
pub struct Alarm {
    pub id: AlarmId,
    pub line: String,
    pub matches: Vec<Match>,
    pub victim: Option<String>,
    pub time: DateTime<Utc>,
    pub score: f64,
}

impl Alarm {
    /// Assemble an alarm from one line's match batch.
    ///
    /// The timestamp is parsed from the line's leading bytes, falling back
    /// to `now`. The victim is the first hit of the asset engine, when one
    /// is configured.
    pub fn assemble(
        batch: LineMatches,
        set: &SignatureSet,
        asset_engine: Option<&MatchingEngine>,
        now: DateTime<Utc>,
    ) -> Self {
        let LineMatches { line, matches } = batch;
        let line = match line.strip_suffix('\n') {
            Some(stripped) => stripped.to_string(),
            None => line,
        };

        let time = line_timestamp(&line).unwrap_or_else(|| {
            debug!("no interpretable log timestamp, using scan time");
            now
        });

        let victim = asset_engine.and_then(|engine| {
            engine
                .scan_line(&line)
                .first()
                .map(|m| line[m.start..m.stop].to_string())
        });

        let score = matches
            .iter()
            .filter_map(|m| set.get_by_id(&m.sig))
            .map(|sig| sig.score() * sig.score())
            .sum::<f64>()
            .sqrt();

        Self {
            id: Digest::of(&line),
            line,
            matches,
            victim,
            time,
            score,
        }
    }

    /// The matched substring of `m`.
    pub fn matched(&self, m: &Match) -> &str {
        &self.line[m.start..m.stop]
    }

    pub fn to_doc(&self) -> AlarmDoc {
        AlarmDoc {
            id: self.id,
            time: self.time,
            victim: self.victim.clone(),
            sigs: self.matches.iter().map(|m| m.sig).collect(),
            score: self.score,
            data: self.line.clone(),
        }
    }
}

/// Persisted document form of an alarm.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlarmDoc {
    pub id: AlarmId,
    pub time: DateTime<Utc>,
    pub victim: Option<String>,
    pub sigs: Vec<SigId>,
    pub score: f64,
    pub data: String,
}

/// Parse a timestamp from the leading bytes of a log line.
///
/// First the leading 10 bytes as a decimal Unix timestamp, then the leading
/// 19 bytes as `YYYY-MM-DD HH:MM:SS`. Parse failures are not errors; the
/// caller falls back to the scan's wall clock.
fn line_timestamp(line: &str) -> Option<DateTime<Utc>> {
    if let Some(head) = line.get(..10) {
        if let Ok(secs) = head.parse::<i64>() {
            if let chrono::LocalResult::Single(time) = Utc.timestamp_opt(secs, 0) {
                return Some(time);
            }
        }
    }
    if let Some(head) = line.get(..19) {
        if let Ok(naive) = NaiveDateTime::parse_from_str(head, "%Y-%m-%d %H:%M:%S") {
            return Some(naive.and_utc());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn scan(sigs: &str, line: &str) -> (LineMatches, Arc<SignatureSet>) {
        let set = Arc::new(SignatureSet::from_text(sigs));
        let engine = MatchingEngine::new(Arc::clone(&set)).unwrap();
        let matches = engine.scan_line(line);
        (
            LineMatches {
                line: line.to_string(),
                matches,
            },
            set,
        )
    }

    fn with_scores(sigs: &[(&str, f64)]) -> Arc<SignatureSet> {
        let mut set = SignatureSet::from_text("");
        for (text, score) in sigs {
            let mut sig = sporhund_signatures::Signature::compile(text).unwrap();
            sig.sources.insert(
                "feed".into(),
                sporhund_signatures::SignatureSource {
                    score: *score,
                    ..Default::default()
                },
            );
            sig.score_recompute();
            set.add(sig);
        }
        Arc::new(set)
    }

    #[test]
    fn unix_timestamp_is_parsed() {
        let (batch, set) = scan("evil.com", "1335823199 GET evil.com\n");
        let alarm = Alarm::assemble(batch, &set, None, Utc::now());
        assert_eq!(alarm.time, Utc.timestamp_opt(1_335_823_199, 0).unwrap());
        assert_eq!(alarm.line, "1335823199 GET evil.com");
    }

    #[test]
    fn standard_timestamp_is_parsed() {
        let (batch, set) = scan("evil.com", "2012-04-01 09:47:01 GET evil.com");
        let alarm = Alarm::assemble(batch, &set, None, Utc::now());
        assert_eq!(
            alarm.time,
            Utc.with_ymd_and_hms(2012, 4, 1, 9, 47, 1).unwrap()
        );
    }

    #[test]
    fn unparseable_timestamp_falls_back_to_now() {
        let now = Utc.with_ymd_and_hms(2026, 8, 1, 12, 0, 0).unwrap();
        let (batch, set) = scan("evil.com", "no timestamp, just evil.com");
        let alarm = Alarm::assemble(batch, &set, None, now);
        assert_eq!(alarm.time, now);
    }

    #[test]
    fn victim_is_first_asset_hit() {
        let assets = Arc::new(SignatureSet::from_text("10.1.2.3\nwww.corp.example\n"));
        let asset_engine = MatchingEngine::new(assets).unwrap();
        let (batch, set) = scan("evil.com", "www.corp.example pulled evil.com via 10.1.2.3");
        let alarm = Alarm::assemble(batch, &set, Some(&asset_engine), Utc::now());
        assert_eq!(alarm.victim.as_deref(), Some("www.corp.example"));
    }

    #[test]
    fn no_asset_engine_means_no_victim() {
        let (batch, set) = scan("evil.com", "lonely evil.com");
        let alarm = Alarm::assemble(batch, &set, None, Utc::now());
        assert!(alarm.victim.is_none());
    }

    #[test]
    fn score_is_l2_norm_of_match_scores() {
        let set = with_scores(&[("evil.com", 3.0), ("good.net", 4.0)]);
        let engine = MatchingEngine::new(Arc::clone(&set)).unwrap();
        let line = "prefix evil.com and good.net suffix";
        let batch = LineMatches {
            line: line.to_string(),
            matches: engine.scan_line(line),
        };
        let alarm = Alarm::assemble(batch, &set, None, Utc::now());
        assert_eq!(alarm.matches.len(), 2);
        assert!((alarm.score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn score_is_invariant_under_match_permutation() {
        let set = with_scores(&[("evil.com", 3.0), ("good.net", 4.0)]);
        let engine = MatchingEngine::new(Arc::clone(&set)).unwrap();
        let line = "evil.com good.net";
        let mut matches = engine.scan_line(line);
        matches.reverse();
        let batch = LineMatches {
            line: line.to_string(),
            matches,
        };
        let alarm = Alarm::assemble(batch, &set, None, Utc::now());
        assert!((alarm.score - 5.0).abs() < 1e-9);
    }

    #[test]
    fn doc_carries_line_digest_and_sig_ids() {
        let (batch, set) = scan("evil.com", "carrier of evil.com\n");
        let alarm = Alarm::assemble(batch, &set, None, Utc::now());
        let doc = alarm.to_doc();
        assert_eq!(doc.id, Digest::of("carrier of evil.com"));
        assert_eq!(doc.sigs, vec![Digest::of("evil.com")]);
        assert_eq!(doc.data, "carrier of evil.com");

        let json = serde_json::to_string(&doc).unwrap();
        let back: AlarmDoc = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, doc.id);
        assert_eq!(back.sigs, doc.sigs);
    }
}
