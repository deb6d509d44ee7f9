use std::time::Duration;

use crate::claims::CLAIM_WINDOW;
use crate::drop_source::DROP_DEBOUNCE;
use crate::processor::QueueConfig;
use crate::retry::RetryPolicy;

pub const DEFAULT_OCR_BASE_URL: &str = "https://aip.baidubce.com";

#[derive(Debug, Clone)]
pub struct Config {
    pub queue: QueueConfig,
    pub claim_window: Duration,
    pub drop_debounce: Duration,
    pub log_level: String,
    pub ocr: Option<OcrConfig>,
}

#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub api_key: String,
    pub secret_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            queue: QueueConfig::default(),
            claim_window: CLAIM_WINDOW,
            drop_debounce: DROP_DEBOUNCE,
            log_level: "info".to_string(),
            ocr: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, String> {
        let defaults = QueueConfig::default();

        let max_concurrent: usize = env_parse("INTAKE_MAX_CONCURRENT", defaults.max_concurrent)?;
        if max_concurrent == 0 {
            return Err("INTAKE_MAX_CONCURRENT must be at least 1".to_string());
        }

        let max_retries: u32 = env_parse("INTAKE_MAX_RETRIES", defaults.retry.max_retries)?;
        let retry_delay_ms: u64 =
            env_parse("INTAKE_RETRY_DELAY_MS", defaults.retry.delay.as_millis() as u64)?;
        let claim_window_ms: u64 =
            env_parse("INTAKE_CLAIM_WINDOW_MS", CLAIM_WINDOW.as_millis() as u64)?;
        let drop_debounce_ms: u64 =
            env_parse("INTAKE_DROP_DEBOUNCE_MS", DROP_DEBOUNCE.as_millis() as u64)?;

        let log_level = env_or("INTAKE_LOG_LEVEL", "info");

        let ocr = match (
            std::env::var("OCR_API_KEY").ok(),
            std::env::var("OCR_SECRET_KEY").ok(),
        ) {
            (Some(api_key), Some(secret_key)) => Some(OcrConfig {
                api_key,
                secret_key,
                base_url: env_or("OCR_BASE_URL", DEFAULT_OCR_BASE_URL)
                    .trim_end_matches('/')
                    .to_string(),
                timeout: Duration::from_secs(env_parse("OCR_TIMEOUT_SECS", 30)?),
            }),
            (None, None) => None,
            _ => {
                return Err("OCR_API_KEY and OCR_SECRET_KEY must be set together".to_string());
            }
        };

        Ok(Config {
            queue: QueueConfig {
                max_concurrent,
                retry: RetryPolicy {
                    max_retries,
                    delay: Duration::from_millis(retry_delay_ms),
                },
            },
            claim_window: Duration::from_millis(claim_window_ms),
            drop_debounce: Duration::from_millis(drop_debounce_ms),
            log_level,
            ocr,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_parse<T>(key: &str, default: T) -> Result<T, String>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| format!("Invalid {key}: {e}")),
        Err(_) => Ok(default),
    }
}
