//! System-wide default constants.
//!
//! Centralises the fixed values used by the delivery queue, the historic
//! scanner and the notifier. Grouped by subsystem for easy discovery.

use std::time::Duration;

// ============================================================================
// Killboard Service
// ============================================================================

/// Base URL of the killboard service.
pub const DEFAULT_BASE_URL: &str = "http://api.gankers.org";

/// Single kill ingestion endpoint.
pub const KILL_ENDPOINT: &str = "/api/killboard/add/kill";

/// Bulk kill ingestion endpoint (historic runs).
pub const BULK_KILL_ENDPOINT: &str = "/api/killboard/add/kill/bulk";

/// Credential check endpoint. Any 200 means the key is valid.
pub const USER_ENDPOINT: &str = "/api/user";

/// Value of the `X-Client-Version` header.
pub const CLIENT_VERSION: &str = concat!("killboard-relay/", env!("CARGO_PKG_VERSION"));

// ============================================================================
// Delivery Queue
// ============================================================================

/// Pause before the next dispatch after the service answered 429.
pub const RATE_LIMIT_COOLDOWN: Duration = Duration::from_secs(60);

// ============================================================================
// Historic Scan
// ============================================================================

/// Minimum wall-clock gap between two progress reports.
pub const PROGRESS_REPORT_INTERVAL: Duration = Duration::from_secs(3);

/// Journal file extension picked up by the historic scanner.
pub const JOURNAL_EXTENSION: &str = "log";

// ============================================================================
// Live Source
// ============================================================================

/// Poll interval when following a journal file for appended lines.
pub const FOLLOW_POLL_INTERVAL: Duration = Duration::from_millis(500);

// ============================================================================
// Notifications
// ============================================================================

/// Default on-screen time for a notification.
pub const NOTIFY_DURATION: Duration = Duration::from_secs(5);

/// On-screen time for live-path event failures.
pub const NOTIFY_EVENT_FAILURE_DURATION: Duration = Duration::from_secs(10);
