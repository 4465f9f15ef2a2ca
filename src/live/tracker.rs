//! Live session tracking and kill submission.

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::source::{EventSource, SourceError, SourceEvent};
use crate::config::defaults::NOTIFY_EVENT_FAILURE_DURATION;
use crate::delivery::DeliveryQueue;
use crate::normalizer::{normalize, normalize_value, NormalizeError};
use crate::notify::{Notification, Notifier};
use crate::session::{CommanderFilter, SessionState, StateChange};
use crate::types::{JournalEvent, KillRecord};

/// What happened to a single live event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackOutcome {
    Ignored,
    StateUpdated,
    /// Kill event from a commander outside the allow-list.
    Suppressed,
    /// Not a player kill.
    Dropped,
    Submitted,
    Failed,
}

/// Counters for one live session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiveStats {
    pub events: u64,
    pub submitted: u64,
    pub failed: u64,
}

pub struct LiveTracker {
    state: SessionState,
    filter: CommanderFilter,
    suppressed: bool,
    queue: DeliveryQueue,
    notifier: Arc<dyn Notifier>,
}

impl LiveTracker {
    pub fn new(filter: CommanderFilter, queue: DeliveryQueue, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            state: SessionState::new(),
            filter,
            suppressed: false,
            queue,
            notifier,
        }
    }

    pub fn session(&self) -> &SessionState {
        &self.state
    }

    /// True while the current commander is outside the allow-list.
    pub fn is_suppressed(&self) -> bool {
        self.suppressed
    }

    pub fn handle_event(&mut self, event: &JournalEvent) -> TrackOutcome {
        match self.state.apply(event) {
            StateChange::Commander => {
                let commander = self.state.commander().unwrap_or_default();
                let suppressed = !self.filter.matches(commander);
                if suppressed != self.suppressed {
                    if suppressed {
                        info!(commander, "Commander not in allow-list, pausing submissions");
                    } else {
                        info!(commander, "Commander in allow-list, resuming submissions");
                    }
                }
                self.suppressed = suppressed;
                return TrackOutcome::StateUpdated;
            }
            StateChange::Other => return TrackOutcome::StateUpdated,
            StateChange::None => {}
        }

        if !event.is_kill_event() {
            return TrackOutcome::Ignored;
        }
        if self.suppressed {
            debug!("Kill event suppressed by allow-list");
            return TrackOutcome::Suppressed;
        }

        let normalized = normalize(event, &self.state.kill_context());
        self.submit(normalized)
    }

    /// A kill event whose raw line did not decode. Reported like any other
    /// normalization failure unless submissions are suppressed.
    pub fn handle_malformed_kill(&self, raw: serde_json::Value) -> TrackOutcome {
        if self.suppressed {
            debug!("Malformed kill event suppressed by allow-list");
            return TrackOutcome::Suppressed;
        }
        let normalized = normalize_value(raw, &self.state.kill_context());
        self.submit(normalized)
    }

    fn submit(&self, normalized: Result<Option<KillRecord>, NormalizeError>) -> TrackOutcome {
        match normalized {
            Ok(Some(record)) => match self.queue.submit_kill_record(&record) {
                Ok(()) => {
                    info!(
                        victim = record.victim().name(),
                        killer = record.killer().name(),
                        timestamp = record.timestamp(),
                        "Kill queued for delivery"
                    );
                    TrackOutcome::Submitted
                }
                Err(e) => {
                    error!(error = %e, "Could not queue kill");
                    self.report_failure(&e);
                    TrackOutcome::Failed
                }
            },
            Ok(None) => {
                debug!("Event does not describe a player kill");
                TrackOutcome::Dropped
            }
            Err(e) => {
                warn!(error = %e, "Could not normalize kill event");
                self.report_failure(&e);
                TrackOutcome::Failed
            }
        }
    }

    fn report_failure(&self, reason: &dyn std::fmt::Display) {
        self.notifier.notify(Notification::error(
            format!("Relay failed with the following error:\n{reason}"),
            NOTIFY_EVENT_FAILURE_DURATION,
        ));
    }
}

/// Feed events from `source` into `tracker` until EOF or cancellation.
pub async fn run_live<S>(
    source: &mut S,
    tracker: &mut LiveTracker,
    cancel_token: CancellationToken,
) -> Result<LiveStats, SourceError>
where
    S: EventSource + ?Sized,
{
    let mut stats = LiveStats::default();
    info!("[Live] Reading journal events from {}", source.source_name());

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                info!("[Live] Shutdown requested after {} events", stats.events);
                break;
            }
            next = source.next_event() => next?,
        };

        let outcome = match next {
            SourceEvent::Event(event) => tracker.handle_event(&event),
            SourceEvent::MalformedKill(raw) => tracker.handle_malformed_kill(raw),
            SourceEvent::Eof => {
                info!("[Live] {} reached end of input", source.source_name());
                break;
            }
        };
        stats.events += 1;
        match outcome {
            TrackOutcome::Submitted => stats.submitted += 1,
            TrackOutcome::Failed => stats.failed += 1,
            _ => {}
        }
    }

    Ok(stats)
}
