//! Time-bucketed alarm roll-ups with incremental score recomputation.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use sporhund_signatures::SigId;

use crate::alarm::AlarmDoc;

/// Aggregation bucket width.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Granularity {
    Hour,
    Day,
}

impl Granularity {
    /// Truncate a timestamp to its bucket. Idempotent.
    pub fn bucket(&self, t: DateTime<Utc>) -> DateTime<Utc> {
        let t = t
            .with_nanosecond(0)
            .and_then(|t| t.with_second(0))
            .and_then(|t| t.with_minute(0))
            .unwrap_or(t);
        match self {
            Self::Hour => t,
            Self::Day => t.with_hour(0).unwrap_or(t),
        }
    }
}

/// Aggregation key: a truncated timestamp and the alarm's victim.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct BucketKey {
    pub bucket: DateTime<Utc>,
    pub victim: Option<String>,
}

#[derive(Debug, Clone, Default)]
struct BucketState {
    counts: BTreeMap<SigId, u64>,
    score: f64,
}

/// Persisted document form of one aggregate bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateDoc {
    pub timebucket: DateTime<Utc>,
    pub victim: Option<String>,
    pub sigs: BTreeMap<SigId, u64>,
    pub score: f64,
}

/// One roll-up collection at a fixed granularity.
///
/// `update` increments signature counts; `scores_recompute` re-derives the
/// score of every bucket touched since the last recomputation, so an
/// aggregation pass over new alarms only pays for the buckets it changed.
pub struct AlarmAggregate {
    granularity: Granularity,
    buckets: BTreeMap<BucketKey, BucketState>,
    dirty: BTreeSet<BucketKey>,
}

impl AlarmAggregate {
    pub fn new(granularity: Granularity) -> Self {
        Self {
            granularity,
            buckets: BTreeMap::new(),
            dirty: BTreeSet::new(),
        }
    }

    /// Restore a roll-up from persisted bucket documents.
    pub fn from_docs(granularity: Granularity, docs: impl IntoIterator<Item = AggregateDoc>) -> Self {
        let mut agg = Self::new(granularity);
        for doc in docs {
            let key = BucketKey {
                bucket: granularity.bucket(doc.timebucket),
                victim: doc.victim,
            };
            agg.buckets.insert(
                key,
                BucketState {
                    counts: doc.sigs,
                    score: doc.score,
                },
            );
        }
        agg
    }

    pub fn granularity(&self) -> Granularity {
        self.granularity
    }

    /// Fold one alarm into its bucket.
    ///
    /// Every signature id on the alarm increments its count by one; an
    /// alarm's own duplicate matches are not deduplicated.
    pub fn update(&mut self, doc: &AlarmDoc) {
        let key = BucketKey {
            bucket: self.granularity.bucket(doc.time),
            victim: doc.victim.clone(),
        };
        let state = self.buckets.entry(key.clone()).or_default();
        for sig in &doc.sigs {
            *state.counts.entry(*sig).or_insert(0) += 1;
        }
        self.dirty.insert(key);
    }

    /// Recompute the score of every bucket touched since the last call.
    ///
    /// `score_of` resolves a signature id to its current score; unknown ids
    /// are logged and contribute nothing.
    pub fn scores_recompute(&mut self, score_of: impl Fn(&SigId) -> Option<f64>) {
        for key in std::mem::take(&mut self.dirty) {
            let Some(state) = self.buckets.get_mut(&key) else {
                continue;
            };
            let mut sum = 0.0;
            for (sig, count) in &state.counts {
                match score_of(sig) {
                    Some(score) => {
                        let s = saturating_score(score, *count);
                        sum += s * s;
                    }
                    None => warn!(sig = %sig, "aggregate references unknown signature"),
                }
            }
            state.score = sum.sqrt();
        }
    }

    pub fn score(&self, key: &BucketKey) -> Option<f64> {
        self.buckets.get(key).map(|state| state.score)
    }

    pub fn counts(&self, key: &BucketKey) -> Option<&BTreeMap<SigId, u64>> {
        self.buckets.get(key).map(|state| &state.counts)
    }

    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Bucket documents for persistence.
    pub fn docs(&self) -> Vec<AggregateDoc> {
        self.buckets
            .iter()
            .map(|(key, state)| AggregateDoc {
                timebucket: key.bucket,
                victim: key.victim.clone(),
                sigs: state.counts.clone(),
                score: state.score,
            })
            .collect()
    }
}

/// Repeat-weighted signature score inside a bucket.
///
/// Saturating in the count: one occurrence scores the signature's own
/// score, many occurrences approach four times it.
pub fn saturating_score(score: f64, count: u64) -> f64 {
    score * 4.0 / (1.0 + 3.0 / count as f64)
}
