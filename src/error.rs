//! Error taxonomy for the workbench controller surface

use std::path::PathBuf;
use thiserror::Error;

/// Errors surfaced to the interactive surface by the controller
#[derive(Debug, Error)]
pub enum WorkbenchError {
    /// The file is missing or is not a decodable raster image
    #[error("Failed to decode image {path:?}: {message}")]
    ImageDecode { path: PathBuf, message: String },

    /// A preprocessing method tag that does not name a known method
    #[error("Unsupported preprocessing method: '{0}'")]
    UnsupportedMethod(String),

    /// A recognition language tag that does not name a known language
    #[error("Unsupported OCR language: '{0}'")]
    UnsupportedLanguage(String),

    /// A recognition job is already in flight
    #[error("Recognition already in progress")]
    Busy,

    /// The operation needs a loaded image
    #[error("No image loaded")]
    NoImageLoaded,

    /// The OCR backend failed while recognizing
    #[error("Recognition failed: {0}")]
    Recognition(String),
}

pub type WorkbenchResult<T> = Result<T, WorkbenchError>;
