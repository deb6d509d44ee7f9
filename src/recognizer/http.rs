use std::path::Path;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, TimeDelta, Utc};
use reqwest::StatusCode;
use serde::Deserialize;
use tokio::sync::Mutex;

use super::{RecognizeError, Recognizer, Record};
use crate::config::OcrConfig;
use crate::error::AppError;
use crate::validate::FileType;

const TOKEN_PATH: &str = "/oauth/2.0/token";
const VAT_INVOICE_PATH: &str = "/rest/2.0/ocr/v1/vat_invoice";
const TOKEN_REFRESH_MARGIN_SECS: i64 = 3600;

// Vendor error codes for per-second and overall request quotas.
const QPS_LIMIT_CODES: [i64; 2] = [4, 18];

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Default, Deserialize)]
struct VendorError {
    error_code: Option<i64>,
    error_msg: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl VendorError {
    fn is_error(&self) -> bool {
        self.error_code.is_some() || self.error.is_some()
    }

    fn into_recognize_error(self) -> RecognizeError {
        let code = self.error_code;
        let msg = self
            .error_msg
            .or(self.error_description)
            .or(self.error)
            .unwrap_or_else(|| "Unknown OCR error".to_string());

        match code {
            Some(code) if QPS_LIMIT_CODES.contains(&code) => {
                RecognizeError::from(format!("Rate limit reached: {msg}"))
            }
            _ => RecognizeError::from(msg),
        }
    }
}

struct CachedToken {
    value: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at - TimeDelta::seconds(TOKEN_REFRESH_MARGIN_SECS)
    }
}

/// Recognizes invoices through the vendor's VAT-invoice OCR endpoint.
pub struct HttpRecognizer {
    client: reqwest::Client,
    config: OcrConfig,
    token: Mutex<Option<CachedToken>>,
}

impl HttpRecognizer {
    pub fn new(config: OcrConfig) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            config,
            token: Mutex::new(None),
        })
    }

    /// Cached access token, refreshed an hour before it expires.
    async fn access_token(&self) -> Result<String, RecognizeError> {
        let mut cached = self.token.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = self.fetch_token().await?;
        let value = token.value.clone();
        *cached = Some(token);
        Ok(value)
    }

    async fn fetch_token(&self) -> Result<CachedToken, RecognizeError> {
        let url = format!("{}{TOKEN_PATH}", self.config.base_url);
        let params = [
            ("grant_type", "client_credentials"),
            ("client_id", self.config.api_key.as_str()),
            ("client_secret", self.config.secret_key.as_str()),
        ];

        let resp = self
            .client
            .post(&url)
            .form(&params)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(request_error)?;
        check_status(status, &body)?;

        let token: TokenResponse = serde_json::from_str(&body)
            .map_err(|e| RecognizeError::from(format!("Invalid token response: {e}")))?;

        tracing::debug!("Obtained OCR access token (expires in {}s)", token.expires_in);

        Ok(CachedToken {
            value: token.access_token,
            expires_at: Utc::now() + TimeDelta::seconds(token.expires_in),
        })
    }
}

#[async_trait]
impl Recognizer for HttpRecognizer {
    async fn recognize(&self, path: &Path) -> Result<Record, RecognizeError> {
        let file_type = FileType::from_path(path).ok_or_else(|| {
            RecognizeError::from(format!("Unsupported file type: {}", path.display()))
        })?;

        let data = tokio::fs::read(path)
            .await
            .map_err(|e| RecognizeError::from(format!("Failed to read {}: {e}", path.display())))?;
        let encoded = STANDARD.encode(&data);

        let token = self.access_token().await?;
        let url = format!(
            "{}{VAT_INVOICE_PATH}?access_token={token}",
            self.config.base_url
        );

        let resp = self
            .client
            .post(&url)
            .form(&[(file_type.form_field(), encoded.as_str())])
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        let body = resp.text().await.map_err(request_error)?;
        check_status(status, &body)?;

        let mut fields: serde_json::Value = serde_json::from_str(&body)
            .map_err(|e| RecognizeError::from(format!("Invalid OCR response: {e}")))?;

        Ok(Record {
            path: path.to_path_buf(),
            file_type,
            fields: fields
                .get_mut("words_result")
                .map(serde_json::Value::take)
                .unwrap_or(fields),
        })
    }
}

/// Vendor errors arrive either as non-2xx responses or as 200s with an
/// `error_code` body.
fn check_status(status: StatusCode, body: &str) -> Result<(), RecognizeError> {
    if status == StatusCode::TOO_MANY_REQUESTS {
        return Err(RecognizeError::from("Rate limited by OCR service (HTTP 429)"));
    }

    match serde_json::from_str::<VendorError>(body) {
        Ok(err) if err.is_error() => Err(err.into_recognize_error()),
        _ if !status.is_success() => Err(RecognizeError::from(format!(
            "OCR service returned {status}: {}",
            body.chars().take(256).collect::<String>()
        ))),
        _ => Ok(()),
    }
}

fn request_error(e: reqwest::Error) -> RecognizeError {
    if e.is_timeout() {
        RecognizeError::from(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        RecognizeError::from(format!("Network error: {e}"))
    } else {
        RecognizeError::from(format!("OCR request failed: {e}"))
    }
}
