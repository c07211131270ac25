//! Per-alarm sync cursors and per-address watermarks.

mod tracker;

pub use tracker::SyncTracker;
