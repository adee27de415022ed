//! Preview engine
//!
//! Recomputes the preprocessed image synchronously on the interactive thread
//! whenever the source or the parameters change.

use std::time::{Duration, Instant};
use tracing::debug;

use crate::shared::ImageStore;
use crate::vision::preprocess::{self, PreprocessConfig};

/// Summary of one recomputation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PreviewStats {
    /// Config the preview was computed with (kernel sizes already odd)
    pub config: PreprocessConfig,
    pub duration: Duration,
}

/// Synchronous preview recomputation
#[derive(Debug, Default)]
pub struct PreviewEngine {
    last: Option<PreviewStats>,
}

impl PreviewEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the preprocessed slot from the store's source.
    ///
    /// Returns `None` and leaves the store untouched when no image is loaded.
    pub fn refresh(&mut self, store: &mut ImageStore, config: &PreprocessConfig) -> Option<PreviewStats> {
        let source = store.source()?.clone();

        let start = Instant::now();
        let result = preprocess::apply(&source, config);
        let duration = start.elapsed();

        debug!(
            "Preview ({}, threshold={}, blur={}, morph={}) computed in {:?}",
            config.method(),
            config.threshold(),
            config.blur_size(),
            config.morph_size(),
            duration
        );

        store.set_preprocessed(result);

        let stats = PreviewStats {
            config: *config,
            duration,
        };
        self.last = Some(stats);
        Some(stats)
    }

    /// Stats of the most recent recomputation
    pub fn last(&self) -> Option<&PreviewStats> {
        self.last.as_ref()
    }

    pub fn reset(&mut self) {
        self.last = None;
    }
}
