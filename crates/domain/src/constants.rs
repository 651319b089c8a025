//! Application constants
//!
//! Centralized location for the wire-level and default values shared by the
//! request engine and the event stream.

// Request defaults
/// Service root used when no base URL is configured.
pub const DEFAULT_BASE_URL: &str = "https://api.nimbus.dev/2.0/";
/// Attempt budget per request.
pub const DEFAULT_MAX_REQUEST_ATTEMPTS: u32 = 3;
/// Connect and read timeout.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
/// `User-Agent` sent by default.
pub const DEFAULT_USER_AGENT: &str = concat!("nimbus-rust/", env!("CARGO_PKG_VERSION"));

// Backoff defaults (exponential with a cap)
/// First backoff delay.
pub const DEFAULT_BACKOFF_INITIAL_MS: u64 = 1_000;
/// Growth factor between backoff delays.
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 2.0;
/// Upper bound on one backoff delay.
pub const DEFAULT_BACKOFF_MAX_MS: u64 = 30_000;

// Event stream
/// Path of the events collection.
pub const EVENTS_PATH: &str = "events";
/// Page size requested when fetching events.
pub const EVENT_PAGE_LIMIT: u32 = 800;
/// Wire spelling of the "current position" sentinel.
pub const STREAM_POSITION_NOW: &str = "now";
/// Added to an endpoint's `retry_timeout` before the client gives up on a long poll.
pub const LONG_POLL_TIMEOUT_GRACE_MS: u64 = 5_000;

// Request logging
/// Body bytes shown when a request is logged.
pub const BODY_PREVIEW_LIMIT: usize = 256;
