//! Delivery configuration
//!
//! Tunables for the delivery layer:
//! - Compression threshold
//! - Retry budget
//! - Signaling-channel fallback toggle and size ceiling
//! - Leave-notification quiescence delay
//! - Confirmation polling
//!
//! Values come from `Default`, a JSON document, or `TANDEM_*` environment
//! variables layered on top.

use crate::transport::signaling::{ENVELOPE_HEADER_RESERVE, MAX_ENVELOPE_SIZE};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_COMPRESS_THRESHOLD: usize = 32;
pub const DEFAULT_MAX_RETRIES: u32 = 4;
pub const DEFAULT_MAX_INLINE_SIZE: usize = 16 * 1024;
pub const DEFAULT_LEAVE_QUIESCENCE_MS: u64 = 2000;
pub const DEFAULT_CONFIRMATION_POLL_MS: u64 = 100;
pub const DEFAULT_CONFIRMATION_TIMEOUT_MS: u64 = 60_000;

const ENV_COMPRESS_THRESHOLD: &str = "TANDEM_COMPRESS_THRESHOLD";
const ENV_MAX_RETRIES: &str = "TANDEM_MAX_RETRIES";
const ENV_ALLOW_SIGNALING_FALLBACK: &str = "TANDEM_ALLOW_SIGNALING_FALLBACK";
const ENV_MAX_INLINE_SIZE: &str = "TANDEM_MAX_INLINE_SIZE";
const ENV_LEAVE_QUIESCENCE_MS: &str = "TANDEM_LEAVE_QUIESCENCE_MS";
const ENV_CONFIRMATION_POLL_MS: &str = "TANDEM_CONFIRMATION_POLL_MS";
const ENV_CONFIRMATION_TIMEOUT_MS: &str = "TANDEM_CONFIRMATION_TIMEOUT_MS";

// ============================================================================
// ERROR TYPES
// ============================================================================

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {value:?}")]
    InvalidEnv { key: &'static str, value: String },

    #[error("Invalid inline size: must be 1..={limit}, got {size}")]
    InvalidInlineSize { size: usize, limit: usize },

    #[error("Invalid confirmation poll interval: {0} ms")]
    InvalidPollInterval(u64),

    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

// ============================================================================
// DELIVERY CONFIG
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeliveryConfig {
    /// Payloads strictly larger than this are marked compressed
    pub compress_threshold: usize,

    /// Retries after the first attempt; escalation fires at half of this
    pub max_retries: u32,

    /// Permit small payloads to travel over the signaling channel
    pub allow_signaling_fallback: bool,

    /// Payloads at or above this size never touch the signaling channel
    pub max_inline_size: usize,

    /// Delay before the host hears about a leave
    pub leave_quiescence_ms: u64,

    pub confirmation_poll_ms: u64,

    pub confirmation_timeout_ms: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            compress_threshold: DEFAULT_COMPRESS_THRESHOLD,
            max_retries: DEFAULT_MAX_RETRIES,
            allow_signaling_fallback: false,
            max_inline_size: DEFAULT_MAX_INLINE_SIZE,
            leave_quiescence_ms: DEFAULT_LEAVE_QUIESCENCE_MS,
            confirmation_poll_ms: DEFAULT_CONFIRMATION_POLL_MS,
            confirmation_timeout_ms: DEFAULT_CONFIRMATION_TIMEOUT_MS,
        }
    }
}

impl DeliveryConfig {
    /// Defaults with `TANDEM_*` environment overrides applied
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_overrides(|key| std::env::var(key).ok())
    }

    /// Parse a JSON document; missing fields keep their defaults
    pub fn from_json(body: &str) -> Result<Self, ConfigError> {
        let config: DeliveryConfig =
            serde_json::from_str(body).map_err(|e| ConfigError::Malformed(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from an arbitrary key lookup, then validate
    pub fn with_overrides<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup(ENV_COMPRESS_THRESHOLD) {
            self.compress_threshold = parse(ENV_COMPRESS_THRESHOLD, v)?;
        }
        if let Some(v) = lookup(ENV_MAX_RETRIES) {
            self.max_retries = parse(ENV_MAX_RETRIES, v)?;
        }
        if let Some(v) = lookup(ENV_ALLOW_SIGNALING_FALLBACK) {
            self.allow_signaling_fallback = parse_flag(ENV_ALLOW_SIGNALING_FALLBACK, v)?;
        }
        if let Some(v) = lookup(ENV_MAX_INLINE_SIZE) {
            self.max_inline_size = parse(ENV_MAX_INLINE_SIZE, v)?;
        }
        if let Some(v) = lookup(ENV_LEAVE_QUIESCENCE_MS) {
            self.leave_quiescence_ms = parse(ENV_LEAVE_QUIESCENCE_MS, v)?;
        }
        if let Some(v) = lookup(ENV_CONFIRMATION_POLL_MS) {
            self.confirmation_poll_ms = parse(ENV_CONFIRMATION_POLL_MS, v)?;
        }
        if let Some(v) = lookup(ENV_CONFIRMATION_TIMEOUT_MS) {
            self.confirmation_timeout_ms = parse(ENV_CONFIRMATION_TIMEOUT_MS, v)?;
        }

        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        // Inline payloads must fit one envelope with room for the header
        let limit = max_inline_limit();
        if self.max_inline_size == 0 || self.max_inline_size > limit {
            return Err(ConfigError::InvalidInlineSize {
                size: self.max_inline_size,
                limit,
            });
        }

        if self.confirmation_poll_ms == 0
            || self.confirmation_poll_ms > self.confirmation_timeout_ms
        {
            return Err(ConfigError::InvalidPollInterval(self.confirmation_poll_ms));
        }

        Ok(())
    }

    pub fn leave_quiescence(&self) -> Duration {
        Duration::from_millis(self.leave_quiescence_ms)
    }

    pub fn confirmation_poll(&self) -> Duration {
        Duration::from_millis(self.confirmation_poll_ms)
    }

    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_millis(self.confirmation_timeout_ms)
    }
}

/// Largest accepted `max_inline_size`
pub fn max_inline_limit() -> usize {
    MAX_ENVELOPE_SIZE - ENVELOPE_HEADER_RESERVE
}

fn parse<T: std::str::FromStr>(key: &'static str, value: String) -> Result<T, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::InvalidEnv { key, value })
}

fn parse_flag(key: &'static str, value: String) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidEnv { key, value }),
    }
}

// ============================================================================
// TESTS
// ============================================================================
