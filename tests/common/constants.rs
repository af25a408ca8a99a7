//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (source ids, tokens, windows, etc.),
//! update only this file.

// ============================================================================
// Test Sources
// ============================================================================

/// Source id for the first test device
pub const SOURCE_1_ID: &str = "radio";

/// Upload token for the first test device
pub const SOURCE_1_TOKEN: &str = "radio-device-token";

/// Source id for the second test device
pub const SOURCE_2_ID: &str = "pasaz";

/// Upload token for the second test device
pub const SOURCE_2_TOKEN: &str = "pasaz-device-token";

/// A token no source was registered with
pub const UNKNOWN_TOKEN: &str = "not-a-device";

// ============================================================================
// Test Store Configuration
// ============================================================================

/// Samples kept per source before the oldest is evicted
pub const HISTORY_CAPACITY: usize = 3;

/// Freshness window used by test servers (seconds)
pub const FRESHNESS_WINDOW_SECS: u64 = 240;

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
