//! # Configuration Module
//!
//! Everything the bot needs at startup is read once from the environment
//! (after `.env` is loaded) and validated into typed structures. Any missing
//! or malformed value is a [`ConfigError`] and stops the process before it
//! serves a single message.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::detector::config::{DetectorConfig, RecoveryConfig};

/// Configuration errors, all fatal at startup
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A required variable is not set
    Missing(&'static str),
    /// A variable is set but cannot be used
    Invalid {
        var: &'static str,
        value: String,
        reason: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(var) => write!(f, "{var} must be set"),
            ConfigError::Invalid { var, value, reason } => {
                write!(f, "{var}={value:?} is invalid: {reason}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// File download settings for the Telegram transport
#[derive(Debug, Clone)]
pub struct DeliveryConfig {
    /// Timeout for a single download attempt in seconds
    pub download_timeout_secs: u64,
    /// Extra attempts after the first failed one
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
    /// Largest file the bot agrees to download
    pub max_file_size: u64,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            download_timeout_secs: 30,
            max_retries: 2,
            base_retry_delay_ms: 500,
            max_retry_delay_ms: 5000,
            max_file_size: 20 * 1024 * 1024,
        }
    }
}

impl DeliveryConfig {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }

    /// Upper bound on a whole download, retries and backoff included
    pub fn download_budget(&self) -> Duration {
        let attempts = u64::from(self.max_retries).saturating_add(1);
        // Jitter adds at most 10% to each delay
        let backoff_ms = (self.max_retry_delay_ms / 10)
            .saturating_mul(11)
            .saturating_mul(u64::from(self.max_retries));
        Duration::from_secs(self.download_timeout_secs.saturating_mul(attempts))
            .saturating_add(Duration::from_millis(backoff_ms))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    /// `EnvFilter` directive, `RUST_LOG` takes precedence when set
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Complete bot configuration
#[derive(Clone)]
pub struct BotConfig {
    pub telegram_token: String,
    pub detector: DetectorConfig,
    pub delivery: DeliveryConfig,
    /// Private directory for downloaded photos
    pub scratch_dir: PathBuf,
    /// Keep annotated images after they were sent
    pub keep_annotated: bool,
    pub log: LogConfig,
}

impl fmt::Debug for BotConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BotConfig")
            .field("telegram_token", &"<redacted>")
            .field("detector", &self.detector)
            .field("delivery", &self.delivery)
            .field("scratch_dir", &self.scratch_dir)
            .field("keep_annotated", &self.keep_annotated)
            .field("log", &self.log)
            .finish()
    }
}

impl BotConfig {
    /// Read the configuration from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`, which returns a variable's value if set
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let telegram_token = get("TELEGRAM_BOT_TOKEN")
            .or_else(|| get("BOT_TOKEN"))
            .ok_or(ConfigError::Missing("TELEGRAM_BOT_TOKEN"))?;

        let defaults = DetectorConfig::default();
        let detector = DetectorConfig {
            command: get("DETECTOR_COMMAND").unwrap_or(defaults.command),
            args: get("DETECTOR_ARGS")
                .map(|args| args.split_whitespace().map(str::to_string).collect())
                .unwrap_or(defaults.args),
            weights_path: get("MODEL_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.weights_path),
            output_dir: get("PREDICTIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            image_size: parse_or(&get, "IMAGE_SIZE", defaults.image_size)?,
            recovery: RecoveryConfig {
                operation_timeout_secs: parse_positive(
                    &get,
                    "INFERENCE_TIMEOUT_SECS",
                    defaults.recovery.operation_timeout_secs,
                )?,
                load_timeout_secs: parse_positive(
                    &get,
                    "MODEL_LOAD_TIMEOUT_SECS",
                    defaults.recovery.load_timeout_secs,
                )?,
                ..defaults.recovery
            },
            ..defaults
        };

        let delivery_defaults = DeliveryConfig::default();
        let delivery = DeliveryConfig {
            download_timeout_secs: parse_positive(
                &get,
                "DOWNLOAD_TIMEOUT_SECS",
                delivery_defaults.download_timeout_secs,
            )?,
            max_retries: parse_max_retries(&get, delivery_defaults.max_retries)?,
            ..delivery_defaults
        };

        let scratch_dir = get("SCRATCH_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| std::env::temp_dir().join("skinbot"));

        let keep_annotated = match get("KEEP_ANNOTATED") {
            Some(value) => parse_bool("KEEP_ANNOTATED", &value)?,
            None => false,
        };

        let log = LogConfig {
            level: get("LOG_LEVEL")
                .map(|level| level.to_ascii_lowercase())
                .unwrap_or_else(|| LogConfig::default().level),
            json: match get("LOG_FORMAT").map(|f| f.to_ascii_lowercase()).as_deref() {
                None | Some("text") => false,
                Some("json") => true,
                Some(other) => {
                    return Err(ConfigError::Invalid {
                        var: "LOG_FORMAT",
                        value: other.to_string(),
                        reason: "expected `text` or `json`".to_string(),
                    })
                }
            },
        };

        Ok(Self {
            telegram_token,
            detector,
            delivery,
            scratch_dir,
            keep_annotated,
            log,
        })
    }
}

fn parse_or<T, G>(get: &G, var: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(var) {
        Some(value) => value.parse().map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
            value,
        }),
        None => Ok(default),
    }
}

/// Longest accepted timeout, one day
pub const MAX_TIMEOUT_SECS: u64 = 86_400;

/// Most download retries accepted
pub const MAX_DOWNLOAD_RETRIES: u32 = 10;

/// Parse a timeout in seconds within `1..=MAX_TIMEOUT_SECS`
fn parse_positive<G>(get: &G, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let value = parse_or(get, var, default)?;
    if value == 0 || value > MAX_TIMEOUT_SECS {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: format!("must be between 1 and {MAX_TIMEOUT_SECS}"),
        });
    }
    Ok(value)
}

fn parse_max_retries<G>(get: &G, default: u32) -> Result<u32, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    let var = "DOWNLOAD_MAX_RETRIES";
    let value = parse_or(get, var, default)?;
    if value > MAX_DOWNLOAD_RETRIES {
        return Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: format!("must be at most {MAX_DOWNLOAD_RETRIES}"),
        });
    }
    Ok(value)
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::Invalid {
            var,
            value: value.to_string(),
            reason: "expected a boolean".to_string(),
        }),
    }
}
