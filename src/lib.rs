//! killboard-relay: Player-kill Journal Relay
//!
//! Reads game journal events, turns player deaths and player kills into
//! [`KillRecord`]s and delivers them to a killboard service.
//!
//! ## Architecture
//!
//! - **Normalizer**: raw journal events to validated kill records
//! - **Delivery**: single-worker FIFO with 429 cooldown, plus bulk submit
//! - **Historic**: replay a journal directory and submit in one request
//! - **Live**: follow the current journal and queue kills as they happen

pub mod config;
pub mod delivery;
pub mod historic;
pub mod live;
pub mod normalizer;
pub mod notify;
pub mod session;
pub mod types;

// Re-export settings
pub use config::{Settings, SettingsStore};

// Re-export commonly used types
pub use types::{CommanderEntry, JournalEvent, KillPayload, KillRecord, PayloadSchema};

// Re-export the pipeline pieces
pub use delivery::{BulkSubmitter, DeliveryQueue, DeliveryWorker, ReqwestTransport, TokioClock};
pub use historic::{HistoricRun, ScanOptions};
pub use live::{JsonLinesSource, LiveTracker};
pub use normalizer::{normalize, KillContext, NormalizeError};
pub use notify::{Notification, Notifier, Severity, TracingNotifier};
pub use session::{CommanderFilter, SessionState};
