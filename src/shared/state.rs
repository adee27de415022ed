//! Image store and controller-visible runtime state

use image::{DynamicImage, GrayImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::shared::messages::RecognitionResult;

/// Holds the loaded source image and the latest preprocessed result.
///
/// Images are never mutated in place: a load or a preview replaces the whole
/// `Arc`, so snapshots handed out earlier stay valid.
#[derive(Debug, Default, Clone)]
pub struct ImageStore {
    source: Option<Arc<DynamicImage>>,
    source_path: Option<PathBuf>,
    preprocessed: Option<Arc<GrayImage>>,
    /// Bumped on every source replacement
    source_revision: u64,
    /// Bumped on every preprocessed replacement
    preview_revision: u64,
}

impl ImageStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the source image; the previous preview is dropped with it
    pub fn set_source(&mut self, image: DynamicImage, path: Option<PathBuf>) {
        self.source = Some(Arc::new(image));
        self.source_path = path;
        self.preprocessed = None;
        self.source_revision += 1;
        self.preview_revision += 1;
    }

    /// Replace the preprocessed slot
    pub fn set_preprocessed(&mut self, image: GrayImage) {
        self.preprocessed = Some(Arc::new(image));
        self.preview_revision += 1;
    }

    /// Drop everything
    pub fn clear(&mut self) {
        self.source = None;
        self.source_path = None;
        self.preprocessed = None;
        self.source_revision += 1;
        self.preview_revision += 1;
    }

    pub fn source(&self) -> Option<&Arc<DynamicImage>> {
        self.source.as_ref()
    }

    pub fn source_path(&self) -> Option<&Path> {
        self.source_path.as_deref()
    }

    pub fn preprocessed(&self) -> Option<&Arc<GrayImage>> {
        self.preprocessed.as_ref()
    }

    /// Cheap shared handle to the current preprocessed image
    pub fn snapshot(&self) -> Option<Arc<GrayImage>> {
        self.preprocessed.clone()
    }

    pub fn has_image(&self) -> bool {
        self.source.is_some()
    }

    pub fn source_revision(&self) -> u64 {
        self.source_revision
    }

    pub fn preview_revision(&self) -> u64 {
        self.preview_revision
    }
}

/// Controller lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AppPhase {
    /// No image loaded
    #[default]
    Idle,
    /// Image and preview present, no job running
    Loaded,
    /// A recognition job is in flight
    Recognizing,
}

impl AppPhase {
    pub fn label(&self) -> &'static str {
        match self {
            AppPhase::Idle => "Idle",
            AppPhase::Loaded => "Loaded",
            AppPhase::Recognizing => "Recognizing",
        }
    }
}

/// Runtime state published for display (not persisted)
#[derive(Debug, Clone)]
pub struct RuntimeState {
    /// One-line status for the status bar
    pub status: String,
    /// Last error message (if any)
    pub last_error: Option<String>,
    /// Result of the most recent applied recognition
    pub last_result: Option<RecognitionResult>,
}

impl Default for RuntimeState {
    fn default() -> Self {
        Self {
            status: "Ready".to_string(),
            last_error: None,
            last_result: None,
        }
    }
}

impl RuntimeState {
    /// Clear any error state
    pub fn clear_error(&mut self) {
        self.last_error = None;
    }

    /// Set an error message and mirror it on the status line
    pub fn set_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.status = format!("Error: {}", error);
        self.last_error = Some(error);
    }

    pub fn set_status(&mut self, status: impl Into<String>) {
        self.status = status.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_survives_replacement() {
        let mut store = ImageStore::new();
        store.set_source(DynamicImage::new_luma8(2, 2), None);
        store.set_preprocessed(GrayImage::from_pixel(2, 2, image::Luma([7])));

        let snapshot = store.snapshot().unwrap();
        store.set_preprocessed(GrayImage::from_pixel(2, 2, image::Luma([99])));

        assert!(snapshot.as_raw().iter().all(|&v| v == 7));
        assert!(store.preprocessed().unwrap().as_raw().iter().all(|&v| v == 99));
    }

    #[test]
    fn test_new_source_drops_old_preview() {
        let mut store = ImageStore::new();
        store.set_source(DynamicImage::new_luma8(2, 2), None);
        store.set_preprocessed(GrayImage::new(2, 2));
        let rev = store.preview_revision();

        store.set_source(DynamicImage::new_luma8(4, 4), Some(PathBuf::from("b.png")));
        assert!(store.preprocessed().is_none());
        assert!(store.preview_revision() > rev);
        assert_eq!(store.source_path(), Some(Path::new("b.png")));
    }

    #[test]
    fn test_clear_empties_store() {
        let mut store = ImageStore::new();
        store.set_source(DynamicImage::new_luma8(2, 2), None);
        store.clear();
        assert!(!store.has_image());
        assert!(store.snapshot().is_none());
    }

    #[test]
    fn test_set_error_updates_status() {
        let mut runtime = RuntimeState::default();
        runtime.set_error("boom");
        assert_eq!(runtime.last_error.as_deref(), Some("boom"));
        assert_eq!(runtime.status, "Error: boom");
        runtime.clear_error();
        assert!(runtime.last_error.is_none());
    }
}
