//! Live journal path: read events as they are written, track the session
//! and queue every player kill for delivery.

pub mod source;
pub mod tracker;

pub use source::{EventSource, JsonLinesSource, SourceError, SourceEvent};
pub use tracker::{run_live, LiveStats, LiveTracker, TrackOutcome};
