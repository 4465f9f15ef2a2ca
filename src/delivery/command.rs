//! Queued delivery commands

use serde_json::Value;

use super::client::HttpMethod;
use crate::config::defaults::{KILL_ENDPOINT, USER_ENDPOINT};

/// Why a command was queued; selects the success message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intent {
    CheckCredentials,
    SubmitKill,
}

/// One unit of work for the delivery worker.
///
/// `endpoint` is a path; the base URL is joined at dispatch time so a
/// settings change applies to commands already in the queue.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryCommand {
    pub endpoint: String,
    pub body: Option<Value>,
    pub method: HttpMethod,
    pub intent: Intent,
}

impl DeliveryCommand {
    pub fn check_credentials() -> Self {
        Self {
            endpoint: USER_ENDPOINT.to_string(),
            body: None,
            method: HttpMethod::Get,
            intent: Intent::CheckCredentials,
        }
    }

    pub fn submit_kill(payload: Value) -> Self {
        Self {
            endpoint: KILL_ENDPOINT.to_string(),
            body: Some(payload),
            method: HttpMethod::Post,
            intent: Intent::SubmitKill,
        }
    }
}
