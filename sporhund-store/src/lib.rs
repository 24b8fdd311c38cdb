//! # sporhund-store
//!
//! File-backed document stores: signatures, alarms, and aggregate roll-ups
//! as JSON-lines files. Writers rewrite through a `.tmp` sibling and an
//! atomic rename; appends go straight to the live file.

pub mod aggstore;
pub mod alarmstore;
pub mod error;
pub mod meta;
pub mod sigstore;

pub use aggstore::AggregateStore;
pub use alarmstore::AlarmStore;
pub use error::StoreError;
pub use sigstore::SignatureStore;
