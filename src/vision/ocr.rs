//! OCR backend abstraction
//!
//! The workbench treats the recognizer as an opaque, synchronous, possibly
//! slow service. Backends implement [`TextRecognizer`]; the recognition
//! worker takes care of keeping calls off the interactive thread.

use anyhow::Result;
use image::GrayImage;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::WorkbenchError;

/// Recognition language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum OcrLanguage {
    #[default]
    #[serde(rename = "eng")]
    English,
    #[serde(rename = "tur")]
    Turkish,
    #[serde(rename = "eng+tur")]
    EnglishTurkish,
}

impl OcrLanguage {
    pub const ALL: [OcrLanguage; 3] = [
        OcrLanguage::English,
        OcrLanguage::Turkish,
        OcrLanguage::EnglishTurkish,
    ];

    /// Tesseract language tag
    pub fn tag(&self) -> &'static str {
        match self {
            OcrLanguage::English => "eng",
            OcrLanguage::Turkish => "tur",
            OcrLanguage::EnglishTurkish => "eng+tur",
        }
    }
}

impl fmt::Display for OcrLanguage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for OcrLanguage {
    type Err = WorkbenchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim().to_ascii_lowercase();
        OcrLanguage::ALL
            .into_iter()
            .find(|l| l.tag() == tag)
            .ok_or_else(|| WorkbenchError::UnsupportedLanguage(s.to_string()))
    }
}

/// A synchronous text recognizer
pub trait TextRecognizer: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    /// Recognize all text in `image`. May block for a long time.
    fn recognize(&self, image: &GrayImage, language: OcrLanguage) -> Result<String>;
}
