//! Recognition worker
//!
//! Runs OCR on a background thread, one job at a time. Results go back to the
//! controller over a channel; the worker never touches interactive state.

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;
use tracing::{error, info, warn};

use crate::error::{WorkbenchError, WorkbenchResult};
use crate::shared::{JobId, RecognitionJob, RecognitionResult, WorkerToController};
use crate::vision::TextRecognizer;

/// Background OCR executor with a single job slot
pub struct RecognitionWorker {
    recognizer: Arc<dyn TextRecognizer>,
    /// Job currently occupying the slot
    active: Arc<Mutex<Option<JobId>>>,
    results: Sender<WorkerToController>,
    handle: Option<JoinHandle<()>>,
}

impl RecognitionWorker {
    pub fn new(recognizer: Arc<dyn TextRecognizer>, results: Sender<WorkerToController>) -> Self {
        Self {
            recognizer,
            active: Arc::new(Mutex::new(None)),
            results,
            handle: None,
        }
    }

    /// Name of the backend in use
    pub fn backend_name(&self) -> &str {
        self.recognizer.name()
    }

    /// Job currently running, if any
    pub fn active_job(&self) -> Option<JobId> {
        *self.active.lock()
    }

    /// Start `job` on a background thread.
    ///
    /// Fails with [`WorkbenchError::Busy`] while another job occupies the
    /// slot; nothing is queued.
    pub fn submit(&mut self, job: RecognitionJob) -> WorkbenchResult<()> {
        {
            let mut active = self.active.lock();
            if let Some(running) = *active {
                warn!("Rejecting {}: {} still running", job.id, running);
                return Err(WorkbenchError::Busy);
            }
            *active = Some(job.id);
        }

        // The previous thread released the slot, so it is finished or about to be
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }

        let recognizer = self.recognizer.clone();
        let active = self.active.clone();
        let results = self.results.clone();

        let spawned = std::thread::Builder::new()
            .name(format!("ocr-{}", job.id))
            .spawn(move || {
                let job_id = job.id;
                let language = job.language;
                let result = run_job(recognizer.as_ref(), &job);

                // Free the slot before delivering so the controller can
                // resubmit as soon as it sees the result
                *active.lock() = None;

                if results
                    .send(WorkerToController::Completed {
                        job_id,
                        language,
                        result,
                    })
                    .is_err()
                {
                    warn!("Result for {} dropped: controller is gone", job_id);
                }
            });

        match spawned {
            Ok(handle) => {
                self.handle = Some(handle);
                Ok(())
            }
            Err(e) => {
                *self.active.lock() = None;
                error!("Failed to spawn OCR thread: {}", e);
                Err(WorkbenchError::Recognition(format!("Failed to start worker: {}", e)))
            }
        }
    }
}

/// Run one job against the backend, turning errors and panics into results
fn run_job(recognizer: &dyn TextRecognizer, job: &RecognitionJob) -> RecognitionResult {
    info!(
        "{}: recognizing {}x{} image with {} (lang={})",
        job.id,
        job.image.width(),
        job.image.height(),
        recognizer.name(),
        job.language
    );

    let start = Instant::now();
    let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
        recognizer.recognize(&job.image, job.language)
    }));
    let elapsed = start.elapsed();

    match outcome {
        Ok(Ok(text)) => {
            info!("{}: finished in {:?}, {} characters", job.id, elapsed, text.len());
            RecognitionResult::Text { text, elapsed }
        }
        Ok(Err(e)) => {
            warn!("{}: backend failed after {:?}: {:#}", job.id, elapsed, e);
            RecognitionResult::Error {
                description: format!("{:#}", e),
            }
        }
        Err(payload) => {
            let description = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "OCR backend panicked".to_string());
            error!("{}: backend panicked: {}", job.id, description);
            RecognitionResult::Error { description }
        }
    }
}

impl Drop for RecognitionWorker {
    fn drop(&mut self) {
        // A hung backend must not block shutdown, so the thread is detached
        // while it is still running
        if let Some(handle) = self.handle.take() {
            if handle.is_finished() {
                let _ = handle.join();
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use anyhow::{anyhow, Result};
    use crossbeam_channel::{unbounded, Receiver};
    use image::GrayImage;
    use std::time::Duration;

    use crate::vision::OcrLanguage;

    /// Returns the same text for every image
    pub struct FixedText(pub &'static str);

    impl TextRecognizer for FixedText {
        fn name(&self) -> &str {
            "fixed"
        }

        fn recognize(&self, _image: &GrayImage, _language: OcrLanguage) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    /// Blocks every recognition until the gate channel yields
    pub struct Gated {
        pub gate: Receiver<()>,
        pub text: &'static str,
    }

    impl TextRecognizer for Gated {
        fn name(&self) -> &str {
            "gated"
        }

        fn recognize(&self, _image: &GrayImage, _language: OcrLanguage) -> Result<String> {
            self.gate
                .recv_timeout(Duration::from_secs(10))
                .map_err(|_| anyhow!("gate never opened"))?;
            Ok(self.text.to_string())
        }
    }

    struct Failing;

    impl TextRecognizer for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn recognize(&self, _image: &GrayImage, language: OcrLanguage) -> Result<String> {
            Err(anyhow!("language data for '{}' not installed", language))
        }
    }

    struct Panicking;

    impl TextRecognizer for Panicking {
        fn name(&self) -> &str {
            "panicking"
        }

        fn recognize(&self, _image: &GrayImage, _language: OcrLanguage) -> Result<String> {
            panic!("backend exploded")
        }
    }

    fn job(id: u64) -> RecognitionJob {
        RecognitionJob {
            id: JobId(id),
            image: Arc::new(GrayImage::from_pixel(8, 8, image::Luma([255]))),
            language: OcrLanguage::English,
        }
    }

    fn recv(rx: &Receiver<WorkerToController>) -> (JobId, RecognitionResult) {
        match rx.recv_timeout(Duration::from_secs(10)).expect("no result") {
            WorkerToController::Completed { job_id, result, .. } => (job_id, result),
        }
    }

    #[test]
    fn test_success_is_delivered_with_timing() {
        let (tx, rx) = unbounded();
        let mut worker = RecognitionWorker::new(Arc::new(FixedText("hello")), tx);
        worker.submit(job(1)).unwrap();

        let (id, result) = recv(&rx);
        assert_eq!(id, JobId(1));
        assert_eq!(result.text(), Some("hello"));
    }

    #[test]
    fn test_second_submit_while_running_is_busy() {
        let (gate_tx, gate_rx) = unbounded();
        let (tx, rx) = unbounded();
        let mut worker = RecognitionWorker::new(
            Arc::new(Gated {
                gate: gate_rx,
                text: "first",
            }),
            tx,
        );

        worker.submit(job(1)).unwrap();
        assert!(worker.active_job().is_some());
        assert!(matches!(worker.submit(job(2)), Err(WorkbenchError::Busy)));
        assert_eq!(worker.active_job(), Some(JobId(1)));

        gate_tx.send(()).unwrap();
        let (id, _) = recv(&rx);
        assert_eq!(id, JobId(1));
        assert!(rx.try_recv().is_err());
        assert!(worker.active_job().is_none());
    }

    #[test]
    fn test_backend_error_becomes_error_result() {
        let (tx, rx) = unbounded();
        let mut worker = RecognitionWorker::new(Arc::new(Failing), tx);
        worker.submit(job(3)).unwrap();

        let (_, result) = recv(&rx);
        match result {
            RecognitionResult::Error { description } => assert!(description.contains("not installed")),
            other => panic!("expected error, got {:?}", other),
        }
    }

    #[test]
    fn test_backend_panic_is_contained() {
        let (tx, rx) = unbounded();
        let mut worker = RecognitionWorker::new(Arc::new(Panicking), tx);
        worker.submit(job(4)).unwrap();

        let (_, result) = recv(&rx);
        assert_eq!(
            result,
            RecognitionResult::Error {
                description: "backend exploded".to_string()
            }
        );

        // Slot is free again after a panic
        worker.submit(job(5)).unwrap();
        let (id, _) = recv(&rx);
        assert_eq!(id, JobId(5));
    }
}
