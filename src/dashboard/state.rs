//! Dashboard view state
//!
//! Widget-bound values live here only for the duration of a frame's
//! interaction; the controller's config stays canonical and the sliders are
//! re-synced from it after every change.

use egui::TextureHandle;

use crate::vision::{OcrLanguage, PreprocessConfig, PreprocessMethod};

/// Widget values mirrored from the controller
#[derive(Debug, Clone, PartialEq)]
pub struct ControlValues {
    pub method: PreprocessMethod,
    pub threshold: i64,
    pub blur_size: i64,
    pub morph_size: i64,
    pub language: OcrLanguage,
}

impl ControlValues {
    pub fn from_config(config: &PreprocessConfig, language: OcrLanguage) -> Self {
        Self {
            method: config.method(),
            threshold: config.threshold() as i64,
            blur_size: config.blur_size() as i64,
            morph_size: config.morph_size() as i64,
            language,
        }
    }
}

/// Texture uploaded for one image panel
pub struct PanelTexture {
    pub handle: TextureHandle,
    /// Store revision the texture was built from
    pub revision: u64,
}

/// Overall dashboard state
pub struct DashboardState {
    /// Path typed into the load field
    pub path_input: String,
    pub controls: ControlValues,
    pub source_texture: Option<PanelTexture>,
    pub preview_texture: Option<PanelTexture>,
    /// Error waiting to be acknowledged
    pub error_popup: Option<String>,
}

impl DashboardState {
    pub fn new(config: &PreprocessConfig, language: OcrLanguage) -> Self {
        Self {
            path_input: String::new(),
            controls: ControlValues::from_config(config, language),
            source_texture: None,
            preview_texture: None,
            error_popup: None,
        }
    }
}
