//! Service configuration.

use envelope_engine::TokenPolicy;
use envelope_render::RenderOptions;
use envelope_types::{SigningError, SigningResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Capability token issuance
    #[serde(default)]
    pub tokens: TokenConfig,

    /// Render job queue and layout
    #[serde(default)]
    pub render: RenderConfig,

    /// Notification dispatch
    #[serde(default)]
    pub notifications: NotificationConfig,

    /// Expiry sweeper
    #[serde(default)]
    pub expiry: ExpiryConfig,
}

impl ServiceConfig {
    /// Reject values the service cannot run with.
    pub fn validate(&self) -> SigningResult<()> {
        if self.tokens.ttl_hours == 0 {
            return Err(SigningError::validation("tokens.ttl_hours must be positive"));
        }
        if self.tokens.bytes < 16 {
            return Err(SigningError::validation("tokens.bytes must be at least 16"));
        }
        if self.render.max_attempts == 0 {
            return Err(SigningError::validation("render.max_attempts must be positive"));
        }
        for (name, ratio) in [
            ("render.image_height_ratio", self.render.image_height_ratio),
            ("render.text_height_ratio", self.render.text_height_ratio),
        ] {
            if !(ratio > 0.0 && ratio < 1.0) {
                return Err(SigningError::validation(format!(
                    "{} must be between 0 and 1",
                    name
                )));
            }
        }
        if self.render.display_utc_offset_minutes.abs() > 14 * 60 {
            return Err(SigningError::validation(
                "render.display_utc_offset_minutes must be within +/- 14 hours",
            ));
        }
        if self.notifications.queue_capacity == 0 {
            return Err(SigningError::validation(
                "notifications.queue_capacity must be positive",
            ));
        }
        if self.expiry.sweep_interval_secs == 0 {
            return Err(SigningError::validation(
                "expiry.sweep_interval_secs must be positive",
            ));
        }
        Ok(())
    }
}

/// Capability token configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenConfig {
    /// Lifetime of a freshly issued token
    #[serde(default = "default_ttl_hours")]
    pub ttl_hours: u64,

    /// Random bytes per token, hex encoded on the wire
    #[serde(default = "default_token_bytes")]
    pub bytes: usize,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            ttl_hours: default_ttl_hours(),
            bytes: default_token_bytes(),
        }
    }
}

impl TokenConfig {
    pub fn policy(&self) -> TokenPolicy {
        TokenPolicy {
            ttl: chrono::Duration::hours(self.ttl_hours.min(i64::MAX as u64) as i64),
            bytes: self.bytes,
        }
    }
}

/// Render job configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    /// Attempts before an envelope lands in the failed set
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the doubling retry delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Offset for timestamps printed on documents
    #[serde(default)]
    pub display_utc_offset_minutes: i32,

    /// Share of a signature box used by the image
    #[serde(default = "default_image_height_ratio")]
    pub image_height_ratio: f64,

    /// Text size relative to its box height
    #[serde(default = "default_text_height_ratio")]
    pub text_height_ratio: f64,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            display_utc_offset_minutes: 0,
            image_height_ratio: default_image_height_ratio(),
            text_height_ratio: default_text_height_ratio(),
        }
    }
}

impl RenderConfig {
    pub fn options(&self) -> RenderOptions {
        RenderOptions {
            image_height_ratio: self.image_height_ratio,
            text_height_ratio: self.text_height_ratio,
            utc_offset_minutes: self.display_utc_offset_minutes,
        }
    }

    /// Delay after failed attempt number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let delay = self
            .initial_backoff_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_backoff_ms);
        Duration::from_millis(delay)
    }
}

/// Notification dispatch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationConfig {
    /// Pending notifications held before new ones are dropped
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

impl Default for NotificationConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
        }
    }
}

/// Expiry sweeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExpiryConfig {
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
}

impl Default for ExpiryConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
        }
    }
}

impl ExpiryConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

// Default value helpers
fn default_ttl_hours() -> u64 {
    72
}

fn default_token_bytes() -> usize {
    32
}

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    500
}

fn default_max_backoff_ms() -> u64 {
    30_000
}

fn default_image_height_ratio() -> f64 {
    0.65
}

fn default_text_height_ratio() -> f64 {
    0.70
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_sweep_interval() -> u64 {
    60
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.tokens.ttl_hours, 72);
        assert_eq!(config.tokens.bytes, 32);
        assert_eq!(config.render.max_attempts, 5);
        assert_eq!(config.notifications.queue_capacity, 1024);
        assert_eq!(config.expiry.sweep_interval_secs, 60);
        assert!(config.validate().is_ok());
        assert_eq!(config.tokens.policy().ttl, chrono::Duration::hours(72));
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: ServiceConfig =
            serde_json::from_str(r#"{"render": {"max_attempts": 2}}"#).unwrap();
        assert_eq!(config.render.max_attempts, 2);
        assert_eq!(config.render.initial_backoff_ms, 500);
        assert_eq!(config.tokens.ttl_hours, 72);
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let render = RenderConfig {
            initial_backoff_ms: 100,
            max_backoff_ms: 350,
            ..RenderConfig::default()
        };
        assert_eq!(render.backoff(1), Duration::from_millis(100));
        assert_eq!(render.backoff(2), Duration::from_millis(200));
        assert_eq!(render.backoff(3), Duration::from_millis(350));
        assert_eq!(render.backoff(60), Duration::from_millis(350));
    }

    #[test]
    fn invalid_values_are_rejected() {
        let mut config = ServiceConfig::default();
        config.tokens.bytes = 8;
        assert!(config.validate().is_err());

        let mut config = ServiceConfig::default();
        config.render.image_height_ratio = 1.5;
        assert!(config.validate().is_err());
    }
}
