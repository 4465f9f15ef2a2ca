//! Delivery queue - FIFO of killboard commands drained by a single worker
//!
//! Producers hold a cloneable [`DeliveryQueue`]; exactly one
//! [`DeliveryWorker`] pops commands and dispatches them one at a time, so at
//! most one request is ever in flight. A 429 answer re-appends the command
//! at the tail and puts the worker into a cooldown before its next pop.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::client::{HttpRequest, HttpResponse, Transport, TransportError};
use super::clock::Clock;
use super::command::{DeliveryCommand, Intent};
use crate::config::defaults::{CLIENT_VERSION, NOTIFY_DURATION, RATE_LIMIT_COOLDOWN};
use crate::config::SettingsStore;
use crate::notify::{Notification, Notifier};
use crate::types::KillRecord;

#[derive(Debug, Error)]
pub enum DeliveryError {
    #[error("delivery worker has stopped")]
    Closed,

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Where the worker is in its loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    /// Waiting for the next command.
    Idle,
    /// A request is in flight.
    Draining,
    /// Rate limited; no pop before `until`.
    Cooldown { until: Instant },
}

/// Result of dispatching one command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Delivered,
    Rejected,
    Unauthorized,
    UnknownEndpoint,
    RateLimited,
    ServerFault,
    Unexpected(u16),
    ConnectionFailed,
    MissingApiKey,
    /// Transport or internal failure other than a connection error.
    Failed,
}

/// Map a response status onto the dispatch table.
pub fn classify(status: u16) -> DispatchOutcome {
    match status {
        200 => DispatchOutcome::Delivered,
        400 => DispatchOutcome::Rejected,
        401 => DispatchOutcome::Unauthorized,
        404 => DispatchOutcome::UnknownEndpoint,
        429 => DispatchOutcome::RateLimited,
        500 => DispatchOutcome::ServerFault,
        other => DispatchOutcome::Unexpected(other),
    }
}

fn notification_for(outcome: DispatchOutcome, intent: Intent, body: &str) -> Option<Notification> {
    let n = match outcome {
        DispatchOutcome::Delivered => match intent {
            Intent::CheckCredentials => Notification::info("API key is valid.", NOTIFY_DURATION),
            Intent::SubmitKill => Notification::info("Killboard accepted the event.", NOTIFY_DURATION),
        },
        DispatchOutcome::Rejected => Notification::error(
            format!("Killboard rejected an event for the following reason:\n{body}"),
            NOTIFY_DURATION,
        ),
        DispatchOutcome::Unauthorized => Notification::sticky_error(
            "Killboard rejected the API key. Check the key in your settings.",
        ),
        DispatchOutcome::UnknownEndpoint => Notification::error(
            "Killboard does not know this endpoint. Please report this as a bug.",
            NOTIFY_DURATION,
        ),
        DispatchOutcome::RateLimited => Notification::warning(
            "Killboard reports too many requests. Waiting a minute and retrying.",
            NOTIFY_DURATION,
        ),
        DispatchOutcome::ServerFault => Notification::error(
            "Killboard had an internal error. The event was dropped.",
            NOTIFY_DURATION,
        ),
        DispatchOutcome::Unexpected(code) => Notification::warning(
            format!("Killboard responded with {code} unexpectedly."),
            NOTIFY_DURATION,
        ),
        // These three notify at the failure site, where the cause is known.
        DispatchOutcome::ConnectionFailed | DispatchOutcome::MissingApiKey | DispatchOutcome::Failed => {
            return None
        }
    };
    Some(n)
}

fn failure_notification(reason: impl std::fmt::Display) -> Notification {
    Notification::error(
        format!("Relay failed with the following error:\n{reason}"),
        NOTIFY_DURATION,
    )
}

// ============================================================================
// Producer Handle
// ============================================================================

/// Commands enqueued but not yet finished. A rate-limited command stays
/// pending across its requeue.
#[derive(Debug, Default)]
struct Pending {
    count: AtomicUsize,
    idle: Notify,
}

impl Pending {
    fn finish_one(&self) {
        if self.count.fetch_sub(1, Ordering::AcqRel) == 1 {
            self.idle.notify_waiters();
        }
    }
}

/// Cloneable producer side of the queue.
#[derive(Clone)]
pub struct DeliveryQueue {
    tx: mpsc::UnboundedSender<DeliveryCommand>,
    settings: Arc<SettingsStore>,
    pending: Arc<Pending>,
}

impl DeliveryQueue {
    /// Create the queue and its single worker. The worker does nothing until
    /// spawned or driven with [`DeliveryWorker::process_one`].
    pub fn new(
        settings: Arc<SettingsStore>,
        transport: Arc<dyn Transport>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
    ) -> (Self, DeliveryWorker) {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(Pending::default());
        let worker = DeliveryWorker {
            rx,
            requeue: tx.clone(),
            pending: Arc::clone(&pending),
            settings: Arc::clone(&settings),
            transport,
            notifier,
            clock,
            state: WorkerState::Idle,
        };
        (
            Self {
                tx,
                settings,
                pending,
            },
            worker,
        )
    }

    /// Append a command at the tail. Never blocks.
    pub fn enqueue(&self, command: DeliveryCommand) -> Result<(), DeliveryError> {
        debug!(endpoint = %command.endpoint, intent = ?command.intent, "Enqueued delivery command");
        self.pending.count.fetch_add(1, Ordering::AcqRel);
        self.tx.send(command).map_err(|_| {
            self.pending.finish_one();
            DeliveryError::Closed
        })
    }

    /// Number of commands not yet finished, retries included.
    pub fn pending(&self) -> usize {
        self.pending.count.load(Ordering::Acquire)
    }

    /// Resolve once every enqueued command has been dispatched for good.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.pending.idle.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();
            if self.pending() == 0 {
                return;
            }
            notified.await;
        }
    }

    /// Queue a kill record for the single-kill endpoint, shaped by the
    /// current payload settings.
    pub fn submit_kill_record(&self, record: &KillRecord) -> Result<(), DeliveryError> {
        let payload = record.to_payload(self.settings.payload_schema(), self.settings.send_location());
        let body = serde_json::to_value(&payload)?;
        self.enqueue(DeliveryCommand::submit_kill(body))
    }

    pub fn check_credentials(&self) -> Result<(), DeliveryError> {
        self.enqueue(DeliveryCommand::check_credentials())
    }
}

// ============================================================================
// Worker
// ============================================================================

pub struct DeliveryWorker {
    rx: mpsc::UnboundedReceiver<DeliveryCommand>,
    requeue: mpsc::UnboundedSender<DeliveryCommand>,
    pending: Arc<Pending>,
    settings: Arc<SettingsStore>,
    transport: Arc<dyn Transport>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    state: WorkerState,
}

impl DeliveryWorker {
    pub fn state(&self) -> WorkerState {
        self.state
    }

    /// Run on the tokio runtime for the rest of the process.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    /// Drain forever. The worker keeps its own re-enqueue sender, so the
    /// channel never closes while it runs.
    pub async fn run(mut self) {
        info!("Delivery worker started");
        while self.process_one().await.is_some() {}
        info!("Delivery worker stopped");
    }

    /// One loop iteration: honour a pending cooldown, pop, dispatch.
    ///
    /// Returns `None` once the channel is closed and empty.
    pub async fn process_one(&mut self) -> Option<DispatchOutcome> {
        if let WorkerState::Cooldown { until } = self.state {
            info!(
                wait_secs = until.saturating_duration_since(self.clock.now()).as_secs(),
                "Rate limited, pausing before next dispatch"
            );
            self.clock.sleep_until(until).await;
        }
        self.state = WorkerState::Idle;

        let command = self.rx.recv().await?;
        self.state = WorkerState::Draining;

        let outcome = match AssertUnwindSafe(self.dispatch(&command)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                let reason = panic
                    .downcast_ref::<&str>()
                    .map(|s| (*s).to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                error!(endpoint = %command.endpoint, reason = %reason, "Dispatch panicked");
                self.notifier.notify(failure_notification(reason));
                DispatchOutcome::Failed
            }
        };

        self.state = if outcome == DispatchOutcome::RateLimited {
            if self.requeue.send(command).is_err() {
                error!("Failed to re-enqueue rate-limited command");
                self.pending.finish_one();
            }
            WorkerState::Cooldown {
                until: self.clock.now() + RATE_LIMIT_COOLDOWN,
            }
        } else {
            self.pending.finish_one();
            WorkerState::Idle
        };

        Some(outcome)
    }

    async fn dispatch(&self, command: &DeliveryCommand) -> DispatchOutcome {
        let Some(api_key) = self.settings.api_key() else {
            warn!(endpoint = %command.endpoint, "No API key configured, dropping command");
            self.notifier.notify(Notification::error(
                "No killboard API key configured. Add one to your settings.",
                NOTIFY_DURATION,
            ));
            return DispatchOutcome::MissingApiKey;
        };

        let request = HttpRequest {
            method: command.method,
            url: format!("{}{}", self.settings.base_url(), command.endpoint),
            api_key,
            client_version: CLIENT_VERSION.to_string(),
            body: command.body.clone(),
        };
        info!(method = %request.method, url = %request.url, "Dispatching");

        match self.transport.send(request).await {
            Ok(response) => self.handle_response(command, &response),
            Err(TransportError::Connection(e)) => {
                error!(endpoint = %command.endpoint, error = %e, "Killboard unreachable");
                self.notifier.notify(Notification::error(
                    "Error connecting to the killboard. See logs for more info.",
                    NOTIFY_DURATION,
                ));
                DispatchOutcome::ConnectionFailed
            }
            Err(e) => {
                error!(endpoint = %command.endpoint, error = %e, "Dispatch failed");
                self.notifier.notify(failure_notification(&e));
                DispatchOutcome::Failed
            }
        }
    }

    fn handle_response(&self, command: &DeliveryCommand, response: &HttpResponse) -> DispatchOutcome {
        let outcome = classify(response.status);
        match outcome {
            DispatchOutcome::Delivered => {
                info!(endpoint = %command.endpoint, "Delivered");
            }
            DispatchOutcome::RateLimited => {
                warn!(endpoint = %command.endpoint, "Rate limited (429), re-enqueueing");
            }
            _ => {
                warn!(
                    endpoint = %command.endpoint,
                    status = response.status,
                    body = %response.body,
                    "Killboard did not accept command"
                );
            }
        }
        if let Some(n) = notification_for(outcome, command.intent, &response.body) {
            self.notifier.notify(n);
        }
        outcome
    }
}
