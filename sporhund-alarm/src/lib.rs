//! # sporhund-alarm
//!
//! Alarm formation and aggregation: verified matches on a line become a
//! scored alarm with a parsed timestamp and an optional victim asset;
//! persisted alarms roll up into hour and day buckets.

pub mod agg;
pub mod alarm;

pub use agg::{saturating_score, AlarmAggregate, AggregateDoc, BucketKey, Granularity};
pub use alarm::{Alarm, AlarmDoc, AlarmId};
