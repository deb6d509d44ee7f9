pub mod http;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::validate::FileType;

/// Structured result of recognizing one file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub path: PathBuf,
    pub file_type: FileType,
    pub fields: serde_json::Value,
}

/// Why a single recognition attempt failed. The message is what the user sees
/// and what the retry classifier inspects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizeError {
    pub message: String,
}

impl std::fmt::Display for RecognizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for RecognizeError {}

impl From<String> for RecognizeError {
    fn from(s: String) -> Self {
        RecognizeError { message: s }
    }
}

impl From<&str> for RecognizeError {
    fn from(s: &str) -> Self {
        RecognizeError {
            message: s.to_string(),
        }
    }
}

/// The remote recognition call. Implementations own persistence of the record.
#[async_trait]
pub trait Recognizer: Send + Sync {
    async fn recognize(&self, path: &Path) -> Result<Record, RecognizeError>;
}
