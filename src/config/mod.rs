//! Application Configuration
//!
//! User settings and preferences stored in TOML format.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::vision::preprocess::{DEFAULT_BLUR_SIZE, DEFAULT_MORPH_SIZE, DEFAULT_THRESHOLD};
use crate::vision::tesseract::DEFAULT_TESSERACT_CMD;
use crate::vision::{OcrLanguage, PreprocessConfig, PreprocessMethod};

/// Application settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Initial preprocessing parameters
    pub preprocess: PreprocessSettings,
    /// OCR backend settings
    pub ocr: OcrSettings,
    /// Image panel settings
    pub display: DisplaySettings,
}

/// Preprocessing parameters as written by the user; normalised on use
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreprocessSettings {
    /// Method tag
    pub method: PreprocessMethod,
    /// Threshold level (clamped to 0-255)
    pub threshold: i64,
    /// Blur kernel size (bumped to odd)
    pub blur_size: i64,
    /// Morphology kernel size (bumped to odd)
    pub morph_size: i64,
}

impl Default for PreprocessSettings {
    fn default() -> Self {
        Self {
            method: PreprocessMethod::Gray,
            threshold: DEFAULT_THRESHOLD as i64,
            blur_size: DEFAULT_BLUR_SIZE as i64,
            morph_size: DEFAULT_MORPH_SIZE as i64,
        }
    }
}

impl PreprocessSettings {
    /// Normalised pipeline config
    pub fn to_config(&self) -> PreprocessConfig {
        PreprocessConfig::new(self.method, self.threshold, self.blur_size, self.morph_size)
    }
}

/// OCR backend settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrSettings {
    /// Recognition language
    pub language: OcrLanguage,
    /// Tesseract executable (name on PATH or full path)
    pub tesseract_cmd: PathBuf,
    /// Page segmentation mode passed as `--psm`, if set
    pub psm: Option<u32>,
}

impl Default for OcrSettings {
    fn default() -> Self {
        Self {
            language: OcrLanguage::English,
            tesseract_cmd: PathBuf::from(DEFAULT_TESSERACT_CMD),
            psm: None,
        }
    }
}

/// Image panel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DisplaySettings {
    /// Maximum width an image is shown at
    pub max_width: u32,
    /// Maximum height an image is shown at
    pub max_height: u32,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            max_width: 1000,
            max_height: 800,
        }
    }
}

/// Load configuration from file
pub fn load_config(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {:?}", path))?;
    let config: AppConfig = toml::from_str(&content)
        .with_context(|| format!("Invalid config {:?}", path))?;
    Ok(config)
}

/// Save configuration to file
pub fn save_config(config: &AppConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}
