//! Dashboard UI Module
//!
//! Interactive window around the OCR controller: image loading, method and
//! parameter controls, the original and preprocessed panels, and the
//! recognized text.

pub mod app;
pub mod state;
pub mod theme;

pub use app::run_dashboard;
