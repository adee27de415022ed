//! Vision Layer
//!
//! Image preprocessing primitives, the pipeline selector that dispatches on
//! a preprocessing method, and the OCR backends.
//! Supported backends:
//! - Tesseract via its command-line executable

pub mod display;
pub mod filters;
pub mod ocr;
pub mod preprocess;
pub mod tesseract;

pub use display::fit_for_display;
pub use ocr::{OcrLanguage, TextRecognizer};
pub use preprocess::{ConfigUpdate, PreprocessConfig, PreprocessMethod};
pub use tesseract::TesseractCli;
