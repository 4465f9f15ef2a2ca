//! One-shot bulk submission for historic runs
//!
//! Bypasses the delivery queue: a single POST, no retry. A failed run has to
//! be started again by the operator.

use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::client::{HttpMethod, HttpRequest, Transport, TransportError};
use crate::config::defaults::{BULK_KILL_ENDPOINT, CLIENT_VERSION};
use crate::config::SettingsStore;
use crate::types::{BulkPayload, KillRecord};

#[derive(Debug, Error)]
pub enum BulkSubmitError {
    #[error("no API key configured")]
    MissingApiKey,

    #[error("failed to encode bulk payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("killboard answered {status}: {body}")]
    Status { status: u16, body: String },
}

#[derive(Clone)]
pub struct BulkSubmitter {
    transport: Arc<dyn Transport>,
    settings: Arc<SettingsStore>,
}

impl BulkSubmitter {
    pub fn new(transport: Arc<dyn Transport>, settings: Arc<SettingsStore>) -> Self {
        Self { transport, settings }
    }

    /// POST every record as `{"kills": [...]}`. Any 2xx is success.
    pub async fn submit(&self, records: &[KillRecord]) -> Result<(), BulkSubmitError> {
        let api_key = self.settings.api_key().ok_or(BulkSubmitError::MissingApiKey)?;
        let payload = BulkPayload::from_records(
            records,
            self.settings.payload_schema(),
            self.settings.send_location(),
        );
        let body = serde_json::to_value(&payload)?;
        debug!(payload = %body, "Bulk payload");

        let request = HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}{}", self.settings.base_url(), BULK_KILL_ENDPOINT),
            api_key,
            client_version: CLIENT_VERSION.to_string(),
            body: Some(body),
        };

        let response = self.transport.send(request).await?;
        if response.is_success() {
            info!(records = records.len(), status = response.status, "Bulk submission accepted");
            Ok(())
        } else {
            warn!(status = response.status, body = %response.body, "Bulk submission rejected");
            Err(BulkSubmitError::Status {
                status: response.status,
                body: response.body,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Settings;
    use crate::delivery::client::HttpResponse;
    use crate::types::CommanderEntry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct Fixed {
        status: u16,
        seen: Mutex<Vec<HttpRequest>>,
    }

    #[async_trait]
    impl Transport for Fixed {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            self.seen.lock().unwrap().push(request);
            Ok(HttpResponse::new(self.status, "nope"))
        }
    }

    fn record() -> KillRecord {
        KillRecord::new(
            1_584_017_394,
            CommanderEntry::new("Victim1", Some("cobra".into()), 3),
            CommanderEntry::new("WDX", Some("anaconda".into()), 8),
            None,
        )
    }

    fn submitter(status: u16, key: Option<&str>) -> (BulkSubmitter, Arc<Fixed>) {
        let transport = Arc::new(Fixed {
            status,
            seen: Mutex::new(Vec::new()),
        });
        let mut settings = Settings::default();
        settings.api.key = key.map(str::to_string);
        let store = Arc::new(SettingsStore::in_memory(settings));
        (BulkSubmitter::new(transport.clone(), store), transport)
    }

    #[tokio::test]
    async fn posts_kills_array_to_bulk_endpoint() {
        let (bulk, transport) = submitter(201, Some("k"));
        bulk.submit(&[record(), record()]).await.unwrap();

        let seen = transport.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].method, HttpMethod::Post);
        assert!(seen[0].url.ends_with(BULK_KILL_ENDPOINT));
        let kills = seen[0].body.as_ref().unwrap()["kills"].as_array().unwrap();
        assert_eq!(kills.len(), 2);
        assert_eq!(kills[0]["timestamp"], 1_584_017_394);
    }

    #[tokio::test]
    async fn non_2xx_is_failure() {
        let (bulk, _) = submitter(500, Some("k"));
        let err = bulk.submit(&[record()]).await.unwrap_err();
        assert!(matches!(err, BulkSubmitError::Status { status: 500, .. }));
    }

    #[tokio::test]
    async fn missing_key_sends_nothing() {
        let (bulk, transport) = submitter(200, None);
        assert!(matches!(
            bulk.submit(&[record()]).await,
            Err(BulkSubmitError::MissingApiKey)
        ));
        assert!(transport.seen.lock().unwrap().is_empty());
    }
}
