//! Application state controller
//!
//! Owns the image store, the canonical preprocessing config and the
//! recognition worker, and drives the Idle -> Loaded -> Recognizing
//! lifecycle. Every method runs on the interactive thread; worker results
//! are only applied when the controller drains its channel.

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};
use image::DynamicImage;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::config::AppConfig;
use crate::error::{WorkbenchError, WorkbenchResult};
use crate::preview::{PreviewEngine, PreviewStats};
use crate::shared::{
    AppPhase, ImageStore, JobId, RecognitionJob, RecognitionResult, RuntimeState,
    WorkerToController,
};
use crate::vision::{ConfigUpdate, OcrLanguage, PreprocessConfig, TextRecognizer};
use crate::worker::RecognitionWorker;

/// Main application controller
pub struct OcrController {
    phase: AppPhase,
    store: ImageStore,
    config: PreprocessConfig,
    language: OcrLanguage,
    preview: PreviewEngine,
    worker: RecognitionWorker,
    from_worker: Receiver<WorkerToController>,
    /// Job whose result will be applied on arrival
    current_job: Option<JobId>,
    next_job: u64,
    runtime: RuntimeState,
}

impl OcrController {
    /// Create a controller with defaults taken from `config`
    pub fn new(config: &AppConfig, recognizer: Arc<dyn TextRecognizer>) -> Self {
        let (to_controller, from_worker) = unbounded();
        Self {
            phase: AppPhase::Idle,
            store: ImageStore::new(),
            config: config.preprocess.to_config(),
            language: config.ocr.language,
            preview: PreviewEngine::new(),
            worker: RecognitionWorker::new(recognizer, to_controller),
            from_worker,
            current_job: None,
            next_job: 1,
            runtime: RuntimeState::default(),
        }
    }

    pub fn phase(&self) -> AppPhase {
        self.phase
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    pub fn language(&self) -> OcrLanguage {
        self.language
    }

    pub fn set_language(&mut self, language: OcrLanguage) {
        self.language = language;
    }

    pub fn store(&self) -> &ImageStore {
        &self.store
    }

    pub fn runtime(&self) -> &RuntimeState {
        &self.runtime
    }

    /// Result currently on display, if any
    pub fn last_result(&self) -> Option<&RecognitionResult> {
        self.runtime.last_result.as_ref()
    }

    pub fn last_preview(&self) -> Option<&PreviewStats> {
        self.preview.last()
    }

    pub fn current_job(&self) -> Option<JobId> {
        self.current_job
    }

    pub fn backend_name(&self) -> &str {
        self.worker.backend_name()
    }

    /// Dismiss the error currently on display
    pub fn clear_error(&mut self) {
        self.runtime.clear_error();
    }

    /// Decode an image file and make it the current source.
    ///
    /// On failure the store, phase and config are left exactly as they were.
    pub fn load_image(&mut self, path: impl AsRef<Path>) -> WorkbenchResult<()> {
        let path = path.as_ref();
        let image = match image::open(path) {
            Ok(image) => image,
            Err(e) => {
                let err = WorkbenchError::ImageDecode {
                    path: path.to_path_buf(),
                    message: e.to_string(),
                };
                warn!("{}", err);
                self.runtime.set_error(err.to_string());
                return Err(err);
            }
        };

        self.load_decoded(image, Some(path.to_path_buf()));
        Ok(())
    }

    /// Make an already decoded image the current source
    pub fn load_decoded(&mut self, image: DynamicImage, path: Option<PathBuf>) {
        info!(
            "Image loaded: {} ({}x{}, {} channel(s))",
            path.as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_else(|| "<memory>".to_string()),
            image.width(),
            image.height(),
            image.color().channel_count()
        );

        let name = path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());

        self.store.set_source(image, path);
        self.preview.refresh(&mut self.store, &self.config);

        // A new image starts a new session; a job still in flight belongs to
        // the old one and its result will be dropped
        if let Some(job) = self.current_job.take() {
            info!("New image supersedes {}; its result will be discarded", job);
        }
        self.phase = AppPhase::Loaded;
        self.runtime.last_result = None;
        self.runtime.clear_error();
        self.runtime.set_status(format!("Loaded {}", name));
    }

    /// Update some preprocessing parameters and recompute the preview.
    ///
    /// Does not cancel a job in flight; that job keeps its own snapshot.
    pub fn set_config(&mut self, update: ConfigUpdate) -> &PreprocessConfig {
        if update.is_empty() {
            return &self.config;
        }

        let merged = self.config.merged(&update);
        if merged != self.config {
            debug!("Preprocess config changed: {:?} -> {:?}", self.config, merged);
            self.config = merged;
            self.preview.refresh(&mut self.store, &self.config);
        }
        &self.config
    }

    /// Submit the current preprocessed image for recognition
    pub fn request_recognition(&mut self, language: OcrLanguage) -> WorkbenchResult<JobId> {
        match self.phase {
            AppPhase::Idle => {
                self.runtime.set_error(WorkbenchError::NoImageLoaded.to_string());
                return Err(WorkbenchError::NoImageLoaded);
            }
            AppPhase::Recognizing => {
                warn!("Recognition requested while {:?} is running", self.current_job);
                self.runtime.set_status("OCR already running");
                return Err(WorkbenchError::Busy);
            }
            AppPhase::Loaded => {}
        }

        if let Some(stale) = self.worker.active_job() {
            warn!("Worker still running {} from a previous session", stale);
            self.runtime.set_status("OCR backend still busy with a previous job");
            return Err(WorkbenchError::Busy);
        }

        let image = self.store.snapshot().ok_or(WorkbenchError::NoImageLoaded)?;
        let id = JobId(self.next_job);

        // A stale job from an unloaded session may still hold the worker
        if let Err(e) = self.worker.submit(RecognitionJob {
            id,
            image,
            language,
        }) {
            if matches!(e, WorkbenchError::Busy) {
                self.runtime.set_status("OCR backend still busy with a previous job");
            } else {
                self.runtime.set_error(e.to_string());
            }
            return Err(e);
        }

        self.next_job += 1;
        self.language = language;
        self.current_job = Some(id);
        self.phase = AppPhase::Recognizing;
        self.runtime.clear_error();
        self.runtime.set_status("Recognizing...");
        info!("Submitted {} (lang={})", id, language);
        Ok(id)
    }

    /// Apply a worker message. Returns `true` when it changed the display.
    ///
    /// Results are matched on job identity; anything that is not the current
    /// job is dropped.
    pub fn on_recognition_complete(&mut self, message: WorkerToController) -> bool {
        let WorkerToController::Completed {
            job_id,
            language,
            result,
        } = message;

        if self.phase != AppPhase::Recognizing || self.current_job != Some(job_id) {
            debug!("Discarding stale result for {}", job_id);
            return false;
        }
        info!("Applying result of {} (lang={})", job_id, language);

        self.current_job = None;
        self.phase = AppPhase::Loaded;

        let result = match result {
            RecognitionResult::Text { text, elapsed } => {
                self.runtime
                    .set_status(format!("OCR finished ({:.2} s)", elapsed.as_secs_f64()));
                RecognitionResult::Text {
                    text: text.trim_end().to_string(),
                    elapsed,
                }
            }
            RecognitionResult::Error { description } => {
                self.runtime
                    .set_error(WorkbenchError::Recognition(description.clone()).to_string());
                RecognitionResult::Error { description }
            }
        };
        self.runtime.last_result = Some(result);
        true
    }

    /// Drain every pending worker message without blocking.
    /// Returns `true` if any of them was applied.
    pub fn poll_results(&mut self) -> bool {
        let mut applied = false;
        while let Ok(message) = self.from_worker.try_recv() {
            applied |= self.on_recognition_complete(message);
        }
        applied
    }

    /// Block until the current job's result has been applied or `timeout`
    /// elapses. Returns the applied result.
    pub fn wait_for_result(&mut self, timeout: Option<Duration>) -> Option<&RecognitionResult> {
        let deadline = timeout.map(|t| Instant::now() + t);

        while self.phase == AppPhase::Recognizing {
            let message = match deadline {
                Some(deadline) => {
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    match self.from_worker.recv_timeout(remaining) {
                        Ok(message) => message,
                        Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => {
                            return None
                        }
                    }
                }
                None => match self.from_worker.recv() {
                    Ok(message) => message,
                    Err(_) => return None,
                },
            };
            self.on_recognition_complete(message);
        }

        self.runtime.last_result.as_ref()
    }

    /// Drop the loaded image and any result on display.
    ///
    /// A job in flight keeps running, but its result is discarded on arrival.
    pub fn unload(&mut self) {
        if let Some(job) = self.current_job.take() {
            info!("Unloading while {} is in flight; its result will be discarded", job);
        }
        self.store.clear();
        self.preview.reset();
        self.phase = AppPhase::Idle;
        self.runtime = RuntimeState::default();
    }

    /// Write the current preprocessed image to `path`; format from extension
    pub fn save_preprocessed(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        use anyhow::Context;

        let image = self
            .store
            .preprocessed()
            .ok_or(WorkbenchError::NoImageLoaded)?;
        image
            .save(path.as_ref())
            .with_context(|| format!("Failed to save preprocessed image to {:?}", path.as_ref()))?;
        info!("Saved preprocessed image to {:?}", path.as_ref());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::PreprocessMethod;
    use crate::worker::tests::{FixedText, Gated};
    use image::{GrayImage, Luma, Rgb, RgbImage};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const WAIT: Option<Duration> = Some(Duration::from_secs(10));

    fn controller_with(recognizer: Arc<dyn TextRecognizer>) -> OcrController {
        OcrController::new(&AppConfig::default(), recognizer)
    }

    fn synthetic(width: u32, height: u32, value: u8) -> DynamicImage {
        DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([value, value, value])))
    }

    /// Returns an empty string for uniform images, like a real engine on a blank page
    struct BlankAware;

    impl TextRecognizer for BlankAware {
        fn name(&self) -> &str {
            "blank-aware"
        }

        fn recognize(&self, image: &GrayImage, _language: OcrLanguage) -> anyhow::Result<String> {
            let first = image.as_raw().first().copied();
            if image.as_raw().iter().all(|&v| Some(v) == first) {
                Ok("\n".to_string())
            } else {
                Ok("text".to_string())
            }
        }
    }

    #[test]
    fn test_starts_idle_with_default_config() {
        let controller = controller_with(Arc::new(FixedText("")));
        assert_eq!(controller.phase(), AppPhase::Idle);
        assert_eq!(controller.config().threshold(), 127);
        assert_eq!(controller.config().blur_size(), 5);
        assert_eq!(controller.config().morph_size(), 3);
        assert_eq!(controller.language(), OcrLanguage::English);
        assert_eq!(controller.runtime().status, "Ready");
    }

    #[test]
    fn test_load_decoded_moves_to_loaded_with_preview() {
        let mut controller = controller_with(Arc::new(FixedText("")));
        controller.load_decoded(synthetic(100, 50, 0), None);

        assert_eq!(controller.phase(), AppPhase::Loaded);
        let preview = controller.store().preprocessed().unwrap();
        assert_eq!(preview.dimensions(), (100, 50));
    }

    #[test]
    fn test_black_image_fixed_threshold_end_to_end() {
        let mut controller = controller_with(Arc::new(FixedText("")));
        controller.load_decoded(synthetic(100, 50, 0), None);
        controller.set_config(ConfigUpdate {
            method: Some(PreprocessMethod::Threshold),
            threshold: Some(127),
            ..Default::default()
        });

        let preview = controller.store().preprocessed().unwrap();
        assert!(preview.as_raw().iter().all(|&v| v == 0));
    }

    #[test]
    fn test_even_blur_size_previews_with_next_odd() {
        let mut controller = controller_with(Arc::new(FixedText("")));
        controller.load_decoded(synthetic(20, 20, 128), None);
        controller.set_config(ConfigUpdate {
            method: Some(PreprocessMethod::GaussianBlur),
            blur_size: Some(4),
            ..Default::default()
        });

        assert_eq!(controller.config().blur_size(), 5);
        assert_eq!(controller.last_preview().unwrap().config.blur_size(), 5);
    }

    #[test]
    fn test_threshold_clamped_through_controller() {
        let mut controller = controller_with(Arc::new(FixedText("")));
        assert_eq!(controller.set_config(ConfigUpdate::threshold(-5)).threshold(), 0);
        assert_eq!(controller.set_config(ConfigUpdate::threshold(1000)).threshold(), 255);
    }

    #[test]
    fn test_set_config_without_image_leaves_state() {
        let mut controller = controller_with(Arc::new(FixedText("")));
        controller.set_config(ConfigUpdate::method(PreprocessMethod::Otsu));
        assert_eq!(controller.phase(), AppPhase::Idle);
        assert!(controller.store().preprocessed().is_none());
        assert_eq!(controller.config().method(), PreprocessMethod::Otsu);
    }

    #[test]
    fn test_load_missing_file_keeps_state() {
        let mut controller = controller_with(Arc::new(FixedText("")));
        controller.load_decoded(synthetic(4, 4, 9), Some(PathBuf::from("first.png")));
        let revision = controller.store().source_revision();

        let err = controller.load_image("/nonexistent/image.png").unwrap_err();
        assert!(matches!(err, WorkbenchError::ImageDecode { .. }));
        assert_eq!(controller.phase(), AppPhase::Loaded);
        assert_eq!(controller.store().source_revision(), revision);
        assert_eq!(controller.store().source_path(), Some(Path::new("first.png")));
        assert!(controller.runtime().last_error.is_some());
    }

    #[test]
    fn test_load_garbage_file_is_decode_error() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "definitely not an image").unwrap();

        let mut controller = controller_with(Arc::new(FixedText("")));
        let err = controller.load_image(file.path()).unwrap_err();
        assert!(matches!(err, WorkbenchError::ImageDecode { .. }));
        assert_eq!(controller.phase(), AppPhase::Idle);
    }

    #[test]
    fn test_load_png_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.png");
        synthetic(30, 10, 200).save(&path).unwrap();

        let mut controller = controller_with(Arc::new(FixedText("")));
        controller.load_image(&path).unwrap();
        assert_eq!(controller.phase(), AppPhase::Loaded);
        assert_eq!(controller.runtime().status, "Loaded page.png");
    }

    #[test]
    fn test_recognition_without_image_fails() {
        let mut controller = controller_with(Arc::new(FixedText("")));
        assert!(matches!(
            controller.request_recognition(OcrLanguage::English),
            Err(WorkbenchError::NoImageLoaded)
        ));
    }

    #[test]
    fn test_recognition_round_trip() {
        let mut controller = controller_with(Arc::new(FixedText("Hello OCR  \n")));
        controller.load_decoded(synthetic(10, 10, 255), None);

        let id = controller.request_recognition(OcrLanguage::Turkish).unwrap();
        assert_eq!(controller.phase(), AppPhase::Recognizing);
        assert_eq!(controller.current_job(), Some(id));

        let result = controller.wait_for_result(WAIT).cloned().unwrap();
        assert_eq!(result.text(), Some("Hello OCR"));
        assert_eq!(controller.phase(), AppPhase::Loaded);
        assert_eq!(controller.language(), OcrLanguage::Turkish);
        assert!(controller.runtime().status.starts_with("OCR finished"));
    }

    #[test]
    fn test_blank_image_recognizes_to_empty_text() {
        let mut controller = controller_with(Arc::new(BlankAware));
        controller.load_decoded(synthetic(64, 32, 255), None);
        controller.request_recognition(OcrLanguage::English).unwrap();

        let result = controller.wait_for_result(WAIT).cloned().unwrap();
        assert!(!result.is_error());
        assert_eq!(result.text(), Some(""));
    }

    #[test]
    fn test_request_while_recognizing_is_busy() {
        let (gate_tx, gate_rx) = unbounded();
        let mut controller = controller_with(Arc::new(Gated {
            gate: gate_rx,
            text: "done",
        }));
        controller.load_decoded(synthetic(10, 10, 255), None);

        let first = controller.request_recognition(OcrLanguage::English).unwrap();
        for _ in 0..3 {
            assert!(matches!(
                controller.request_recognition(OcrLanguage::English),
                Err(WorkbenchError::Busy)
            ));
        }
        assert_eq!(controller.current_job(), Some(first));

        gate_tx.send(()).unwrap();
        let result = controller.wait_for_result(WAIT).cloned().unwrap();
        assert_eq!(result.text(), Some("done"));

        // Only one job ever ran
        assert!(!controller.poll_results());
    }

    #[test]
    fn test_config_change_during_recognition_keeps_snapshot() {
        let (gate_tx, gate_rx) = unbounded();
        let mut controller = controller_with(Arc::new(Gated {
            gate: gate_rx,
            text: "ok",
        }));
        controller.load_decoded(synthetic(10, 10, 0), None);
        let before = controller.store().snapshot().unwrap();

        controller.request_recognition(OcrLanguage::English).unwrap();
        controller.set_config(ConfigUpdate {
            method: Some(PreprocessMethod::Threshold),
            threshold: Some(0),
            ..Default::default()
        });
        assert_eq!(controller.phase(), AppPhase::Recognizing);
        assert!(before.as_raw().iter().all(|&v| v == 0));

        gate_tx.send(()).unwrap();
        assert!(controller.wait_for_result(WAIT).is_some());
    }

    #[test]
    fn test_unload_discards_late_result() {
        let (gate_tx, gate_rx) = unbounded();
        let mut controller = controller_with(Arc::new(Gated {
            gate: gate_rx,
            text: "late",
        }));
        controller.load_decoded(synthetic(10, 10, 255), None);
        controller.request_recognition(OcrLanguage::English).unwrap();

        controller.unload();
        assert_eq!(controller.phase(), AppPhase::Idle);

        gate_tx.send(()).unwrap();
        let message = controller
            .from_worker
            .recv_timeout(Duration::from_secs(10))
            .unwrap();
        assert!(!controller.on_recognition_complete(message));

        assert_eq!(controller.phase(), AppPhase::Idle);
        assert!(controller.last_result().is_none());
        assert!(!controller.store().has_image());
    }

    #[test]
    fn test_stale_result_ignored_after_reload_and_new_job() {
        let mut controller = controller_with(Arc::new(FixedText("fresh")));
        controller.load_decoded(synthetic(10, 10, 255), None);
        let old = controller.request_recognition(OcrLanguage::English).unwrap();
        controller.unload();

        // Wait for the old job to release the worker, then start a new session
        let stale = controller
            .from_worker
            .recv_timeout(Duration::from_secs(10))
            .unwrap();
        controller.load_decoded(synthetic(10, 10, 255), None);
        let new = controller.request_recognition(OcrLanguage::English).unwrap();
        assert_ne!(old, new);

        assert!(!controller.on_recognition_complete(stale));
        assert_eq!(controller.phase(), AppPhase::Recognizing);

        let result = controller.wait_for_result(WAIT).cloned().unwrap();
        assert_eq!(result.text(), Some("fresh"));
    }

    #[test]
    fn test_backend_error_returns_to_loaded() {
        struct Down;
        impl TextRecognizer for Down {
            fn name(&self) -> &str {
                "down"
            }
            fn recognize(&self, _: &GrayImage, _: OcrLanguage) -> anyhow::Result<String> {
                anyhow::bail!("backend unavailable")
            }
        }

        let mut controller = controller_with(Arc::new(Down));
        controller.load_decoded(synthetic(10, 10, 255), None);
        controller.request_recognition(OcrLanguage::English).unwrap();

        let result = controller.wait_for_result(WAIT).cloned().unwrap();
        assert!(result.is_error());
        assert_eq!(controller.phase(), AppPhase::Loaded);
        assert!(controller
            .runtime()
            .last_error
            .as_deref()
            .unwrap()
            .contains("backend unavailable"));
    }

    #[test]
    fn test_load_during_recognition_supersedes_job() {
        let (gate_tx, gate_rx) = unbounded();
        let mut controller = controller_with(Arc::new(Gated {
            gate: gate_rx,
            text: "old page",
        }));
        controller.load_decoded(synthetic(10, 10, 255), None);
        controller.request_recognition(OcrLanguage::English).unwrap();

        controller.load_decoded(synthetic(12, 12, 0), None);
        assert_eq!(controller.phase(), AppPhase::Loaded);
        assert!(controller.current_job().is_none());

        // Worker is still occupied by the superseded job
        assert!(matches!(
            controller.request_recognition(OcrLanguage::English),
            Err(WorkbenchError::Busy)
        ));

        gate_tx.send(()).unwrap();
        let message = controller
            .from_worker
            .recv_timeout(Duration::from_secs(10))
            .unwrap();
        assert!(!controller.on_recognition_complete(message));
        assert!(controller.last_result().is_none());
    }

    #[test]
    fn test_save_preprocessed_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");

        let mut controller = controller_with(Arc::new(FixedText("")));
        assert!(controller.save_preprocessed(&path).is_err());

        let mut gray = GrayImage::new(6, 6);
        gray.put_pixel(2, 2, Luma([255]));
        controller.load_decoded(DynamicImage::ImageLuma8(gray), None);
        controller.save_preprocessed(&path).unwrap();

        let reloaded = image::open(&path).unwrap().to_luma8();
        assert_eq!(reloaded.get_pixel(2, 2)[0], 255);
    }
}
