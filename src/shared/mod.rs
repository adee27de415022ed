//! Shared state and messaging between the interactive surface and the
//! recognition worker
//!
//! The worker never touches interactive state; it only posts
//! [`WorkerToController`] messages that the controller drains on its own
//! thread.

pub mod messages;
pub mod state;

pub use messages::{JobId, RecognitionJob, RecognitionResult, WorkerToController};
pub use state::{AppPhase, ImageStore, RuntimeState};
