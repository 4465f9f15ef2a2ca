//! Killboard delivery
//!
//! Live events go through the [`DeliveryQueue`] (single worker, FIFO, 429
//! cooldown). Historic runs use [`BulkSubmitter`], a one-shot POST.

pub mod bulk;
pub mod client;
pub mod clock;
pub mod command;
pub mod queue;

pub use bulk::{BulkSubmitError, BulkSubmitter};
pub use client::{HttpMethod, HttpRequest, HttpResponse, ReqwestTransport, Transport, TransportError};
pub use clock::{Clock, ManualClock, TokioClock};
pub use command::{DeliveryCommand, Intent};
pub use queue::{classify, DeliveryError, DeliveryQueue, DeliveryWorker, DispatchOutcome, WorkerState};
