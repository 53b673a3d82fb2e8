//! Foreground-application time tracker.
//!
//! A 1 Hz sampling loop asks a [`focus_probe::FocusProbe`] what has focus,
//! merges consecutive identical samples into one event, appends closed events
//! to a SQLite log, and answers "time per application" over trailing windows.

pub mod api;
pub mod clock;
pub mod config;
pub mod lookback;
pub mod model;
pub mod session;
pub mod stats;
pub mod store;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TrackerConfig;
pub use lookback::Lookback;
pub use model::{Event, OpenEvent};
pub use stats::{compute_stats, ranked, AppTotal, StatsSnapshot};
pub use store::{EventStore, StoreError};
pub use tracker::{ActivityTracker, TrackerHandle};
