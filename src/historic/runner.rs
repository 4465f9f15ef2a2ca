//! Scan-and-submit task for one historic run.

use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::scanner::{scan, ScanOptions};
use crate::config::defaults::NOTIFY_DURATION;
use crate::delivery::BulkSubmitter;
use crate::notify::{HistoricStatus, Notification, Notifier};

pub struct HistoricRun {
    options: ScanOptions,
    bulk: BulkSubmitter,
    notifier: Arc<dyn Notifier>,
}

impl HistoricRun {
    pub fn new(options: ScanOptions, bulk: BulkSubmitter, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            options,
            bulk,
            notifier,
        }
    }

    /// Run in the background. `on_complete(success)` fires exactly once.
    pub fn spawn<F>(self, on_complete: F) -> JoinHandle<bool>
    where
        F: FnOnce(bool) + Send + 'static,
    {
        tokio::spawn(self.run(on_complete))
    }

    /// Scan on the blocking pool, then submit everything in one request.
    ///
    /// Nothing to submit counts as success.
    pub async fn run<F>(self, on_complete: F) -> bool
    where
        F: FnOnce(bool) + Send + 'static,
    {
        self.notifier.historic_status(HistoricStatus::Started);

        let options = self.options.clone();
        let progress = Arc::clone(&self.notifier);
        let scanned = tokio::task::spawn_blocking(move || {
            scan(&options, |current, total| {
                progress.historic_status(HistoricStatus::Progress { current, total });
            })
        })
        .await;

        let result = match scanned {
            Ok(result) => result,
            Err(e) => {
                error!(error = %e, "Historic scan task failed");
                self.notifier.notify(Notification::error(
                    format!("Relay failed with the following error:\n{e}"),
                    NOTIFY_DURATION,
                ));
                return self.finish(false, on_complete);
            }
        };

        if result.is_empty() {
            info!(files = result.files_total, "Historic run found nothing to submit");
            self.notifier.notify(Notification::info(
                "Historic data: no kills found, nothing to submit.",
                NOTIFY_DURATION,
            ));
            return self.finish(true, on_complete);
        }

        self.notifier.historic_status(HistoricStatus::Submitting);
        let records = result.into_records();
        let success = match self.bulk.submit(&records).await {
            Ok(()) => {
                info!(records = records.len(), "Historic data submitted");
                true
            }
            Err(e) => {
                warn!(error = %e, "Historic submission failed");
                false
            }
        };
        self.finish(success, on_complete)
    }

    fn finish<F: FnOnce(bool)>(&self, success: bool, on_complete: F) -> bool {
        on_complete(success);
        self.notifier.historic_status(HistoricStatus::Finished { success });
        success
    }
}
