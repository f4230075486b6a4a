//! Reconnect policy for the live transport.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use notebook_link::transport::LiveOptions;
//!
//! let options = LiveOptions::new()
//!     .with_max_retries(5)
//!     .with_reconnect_delay(Duration::from_millis(250), Duration::from_secs(5));
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use crate::error::{Error, Result};

// ============================================================================
// Constants
// ============================================================================

/// Default retry budget after the first failed attempt.
pub const DEFAULT_MAX_RETRIES: u32 = 10;

const DEFAULT_MIN_RECONNECT_DELAY: Duration = Duration::from_secs(1);
const DEFAULT_MAX_RECONNECT_DELAY: Duration = Duration::from_secs(10);
const DEFAULT_GROW_FACTOR: f64 = 1.3;
const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_secs(4);
const DEFAULT_MAX_QUEUED_MESSAGES: usize = 128;

// ============================================================================
// LiveOptions
// ============================================================================

/// Connection and reconnection settings.
#[derive(Debug, Clone, PartialEq)]
pub struct LiveOptions {
    /// Retries allowed after the first failed attempt.
    pub max_retries: u32,

    /// Delay before the first retry.
    pub min_reconnect_delay: Duration,

    /// Upper bound on any retry delay.
    pub max_reconnect_delay: Duration,

    /// Multiplier applied per consecutive retry.
    pub grow_factor: f64,

    /// Time allowed for one connect + handshake.
    pub connection_timeout: Duration,

    /// Frames buffered while not open.
    pub max_queued_messages: usize,
}

impl Default for LiveOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl LiveOptions {
    /// Creates options with default settings.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            min_reconnect_delay: DEFAULT_MIN_RECONNECT_DELAY,
            max_reconnect_delay: DEFAULT_MAX_RECONNECT_DELAY,
            grow_factor: DEFAULT_GROW_FACTOR,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
            max_queued_messages: DEFAULT_MAX_QUEUED_MESSAGES,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl LiveOptions {
    /// Sets the retry budget.
    #[inline]
    #[must_use]
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets the first and maximum retry delays.
    #[inline]
    #[must_use]
    pub fn with_reconnect_delay(mut self, min: Duration, max: Duration) -> Self {
        self.min_reconnect_delay = min;
        self.max_reconnect_delay = max;
        self
    }

    /// Sets the per-retry growth factor.
    #[inline]
    #[must_use]
    pub fn with_grow_factor(mut self, factor: f64) -> Self {
        self.grow_factor = factor;
        self
    }

    /// Sets the per-attempt connection timeout.
    #[inline]
    #[must_use]
    pub fn with_connection_timeout(mut self, timeout: Duration) -> Self {
        self.connection_timeout = timeout;
        self
    }

    /// Sets how many outbound frames are buffered while not open.
    #[inline]
    #[must_use]
    pub fn with_max_queued_messages(mut self, max: usize) -> Self {
        self.max_queued_messages = max;
        self
    }
}

// ============================================================================
// Policy
// ============================================================================

impl LiveOptions {
    /// Delay before retry number `retry` (1-based).
    ///
    /// `min * grow^(retry - 1)`, capped at the maximum.
    #[must_use]
    pub fn reconnect_delay(&self, retry: u32) -> Duration {
        let exponent = retry.saturating_sub(1).min(i32::MAX as u32) as i32;
        let scaled = self.min_reconnect_delay.as_secs_f64() * self.grow_factor.powi(exponent);
        let capped = scaled.min(self.max_reconnect_delay.as_secs_f64());

        Duration::try_from_secs_f64(capped).unwrap_or(self.max_reconnect_delay)
    }

    /// Validates the option set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for a growth factor below 1, a minimum delay
    /// above the maximum, or a zero connection timeout.
    pub fn validate(&self) -> Result<()> {
        if !(self.grow_factor >= 1.0) {
            return Err(Error::config(format!(
                "grow_factor must be >= 1.0, got {}",
                self.grow_factor
            )));
        }
        if self.min_reconnect_delay > self.max_reconnect_delay {
            return Err(Error::config(
                "min_reconnect_delay must not exceed max_reconnect_delay",
            ));
        }
        if self.connection_timeout.is_zero() {
            return Err(Error::config("connection_timeout must be non-zero"));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
