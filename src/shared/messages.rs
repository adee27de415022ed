//! Message types crossing from the recognition worker to the controller

use image::GrayImage;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::vision::OcrLanguage;

/// Identity of a recognition job, unique per controller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct JobId(pub u64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// One OCR request bound to an image snapshot
#[derive(Debug, Clone)]
pub struct RecognitionJob {
    pub id: JobId,
    /// Preprocessed image at submission time; later previews replace the
    /// store's slot and never touch this snapshot
    pub image: Arc<GrayImage>,
    pub language: OcrLanguage,
}

/// Outcome of one recognition job
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecognitionResult {
    /// Recognized text and wall-clock time spent in the backend
    Text { text: String, elapsed: Duration },
    /// Backend failure description
    Error { description: String },
}

impl RecognitionResult {
    pub fn is_error(&self) -> bool {
        matches!(self, RecognitionResult::Error { .. })
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            RecognitionResult::Text { text, .. } => Some(text),
            RecognitionResult::Error { .. } => None,
        }
    }
}

/// Messages sent from the recognition worker to the controller
#[derive(Debug, Clone)]
pub enum WorkerToController {
    /// A job finished, successfully or not
    Completed {
        job_id: JobId,
        language: OcrLanguage,
        result: RecognitionResult,
    },
}
