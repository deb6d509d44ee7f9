use std::path::Path;

use serde::{Deserialize, Serialize};

/// Extensions accepted for recognition, lowercase and without the dot.
pub const ACCEPTED_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "bmp", "pdf"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Jpeg,
    Png,
    Bmp,
    Pdf,
}

impl FileType {
    pub fn from_path(path: &Path) -> Option<Self> {
        let extension = path.extension()?.to_str()?.to_lowercase();
        match extension.as_str() {
            "jpg" | "jpeg" => Some(FileType::Jpeg),
            "png" => Some(FileType::Png),
            "bmp" => Some(FileType::Bmp),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Jpeg => "jpeg",
            FileType::Png => "png",
            FileType::Bmp => "bmp",
            FileType::Pdf => "pdf",
        }
    }

    /// Form field the OCR endpoint expects the base64 payload under.
    pub fn form_field(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf_file",
            _ => "image",
        }
    }
}

/// True when the path carries one of the accepted extensions, in any case.
pub fn is_acceptable(path: &Path) -> bool {
    FileType::from_path(path).is_some()
}
