//! OCR Workbench - interactive image preprocessing and text recognition
//!
//! Loads an image, previews a preprocessing method live, and recognizes text
//! from the preprocessed result on a background worker.

mod app;
mod config;
mod dashboard;
mod error;
mod preview;
mod shared;
mod storage;
mod vision;
mod worker;

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use crate::app::OcrController;
use crate::config::AppConfig;
use crate::error::WorkbenchResult;
use crate::shared::RecognitionResult;
use crate::vision::{OcrLanguage, PreprocessMethod, TesseractCli};

/// OCR Workbench - preview preprocessing methods and run OCR on the result
#[derive(Parser, Debug)]
#[command(name = "ocr-workbench")]
#[command(about = "Interactive image preprocessing preview with background OCR")]
struct Args {
    /// Image to load at start-up
    #[arg(short, long)]
    image: Option<PathBuf>,

    /// Preprocessing method tag (gray, threshold, otsu, ...)
    #[arg(short, long)]
    method: Option<String>,

    /// Recognition language tag (eng, tur, eng+tur)
    #[arg(short, long)]
    lang: Option<String>,

    /// Threshold level for the fixed threshold method
    #[arg(long)]
    threshold: Option<i64>,

    /// Kernel size for blur and adaptive methods
    #[arg(long)]
    blur: Option<i64>,

    /// Kernel size for morphology methods
    #[arg(long)]
    morph: Option<i64>,

    /// Recognize the image once, print the text and exit
    #[arg(long, requires = "image")]
    headless: bool,

    /// Write the preprocessed image here (headless mode)
    #[arg(long, requires = "headless")]
    save_preprocessed: Option<PathBuf>,

    /// Configuration file to use instead of the default location
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tesseract executable
    #[arg(long)]
    tesseract: Option<PathBuf>,

    /// Print the OCR backend version and exit
    #[arg(long)]
    check_backend: bool,
}

fn main() -> Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse();
    let tags = TagOverrides::parse(&args)?;

    let mut config = load_or_create_config(args.config.as_ref());
    apply_overrides(&mut config, &args, &tags);

    let backend = TesseractCli::new(config.ocr.tesseract_cmd.clone()).with_psm(config.ocr.psm);

    if args.check_backend {
        let version = backend
            .version()
            .with_context(|| format!("OCR backend {:?} is not usable", backend.command()))?;
        println!("{}", version);
        return Ok(());
    }

    if let Err(e) = backend.version() {
        warn!("OCR backend unavailable, recognition will fail: {:#}", e);
    }

    info!("OCR Workbench starting...");
    let mut controller = OcrController::new(&config, Arc::new(backend));

    if args.headless {
        run_headless(&mut controller, &args)?;
    } else {
        if let Some(path) = &args.image {
            // The dashboard shows the error; start up anyway
            if let Err(e) = controller.load_image(path) {
                error!("{}", e);
            }
        }
        if let Err(e) = dashboard::run_dashboard(controller, config.display.clone()) {
            error!("Dashboard error: {}", e);
        }
    }

    info!("OCR Workbench shutdown complete");
    Ok(())
}

/// Load configuration from file or fall back to defaults
fn load_or_create_config(explicit: Option<&PathBuf>) -> AppConfig {
    let config_path = match explicit {
        Some(path) => Some(path.clone()),
        None => storage::default_config_path().ok(),
    };

    if let Some(config_path) = config_path {
        if config_path.exists() {
            match config::load_config(&config_path) {
                Ok(config) => {
                    info!("Loaded configuration from {:?}", config_path);
                    return config;
                }
                Err(e) => warn!("Ignoring configuration: {:#}", e),
            }
        } else if explicit.is_some() {
            warn!("Configuration file {:?} does not exist", config_path);
        } else {
            // First run: leave an editable copy of the defaults behind
            let config = AppConfig::default();
            match config::save_config(&config, &config_path) {
                Ok(()) => info!("Wrote default configuration to {:?}", config_path),
                Err(e) => warn!("Could not write default configuration: {:#}", e),
            }
            return config;
        }
    }
    info!("Using default configuration");
    AppConfig::default()
}

/// Method and language tags from the command line, checked before any work
#[derive(Debug, Default, PartialEq, Eq)]
struct TagOverrides {
    method: Option<PreprocessMethod>,
    language: Option<OcrLanguage>,
}

impl TagOverrides {
    fn parse(args: &Args) -> WorkbenchResult<Self> {
        Ok(Self {
            method: args.method.as_deref().map(str::parse).transpose()?,
            language: args.lang.as_deref().map(str::parse).transpose()?,
        })
    }
}

/// Command-line values win over the configuration file
fn apply_overrides(config: &mut AppConfig, args: &Args, tags: &TagOverrides) {
    if let Some(method) = tags.method {
        config.preprocess.method = method;
    }
    if let Some(language) = tags.language {
        config.ocr.language = language;
    }
    if let Some(threshold) = args.threshold {
        config.preprocess.threshold = threshold;
    }
    if let Some(blur) = args.blur {
        config.preprocess.blur_size = blur;
    }
    if let Some(morph) = args.morph {
        config.preprocess.morph_size = morph;
    }
    if let Some(cmd) = &args.tesseract {
        config.ocr.tesseract_cmd = cmd.clone();
    }
}

/// One-shot recognition without a window
fn run_headless(controller: &mut OcrController, args: &Args) -> Result<()> {
    let Some(path) = &args.image else {
        bail!("--headless needs --image");
    };

    controller.load_image(path)?;
    if let Some(out) = &args.save_preprocessed {
        controller.save_preprocessed(out)?;
    }

    let language = controller.language();
    let job = controller.request_recognition(language)?;
    info!("Waiting for {}", job);

    let Some(result) = controller.wait_for_result(None) else {
        bail!("Recognition worker stopped before returning a result");
    };
    match result {
        RecognitionResult::Text { text, .. } => {
            println!("{}", text);
            Ok(())
        }
        RecognitionResult::Error { description } => bail!("OCR failed: {}", description),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::WorkbenchError;

    fn args(extra: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("ocr-workbench").chain(extra.iter().copied())).unwrap()
    }

    #[test]
    fn test_unknown_method_rejected_before_config() {
        let err = TagOverrides::parse(&args(&["--method", "sepia"])).unwrap_err();
        assert!(matches!(err, WorkbenchError::UnsupportedMethod(tag) if tag == "sepia"));
    }

    #[test]
    fn test_unknown_language_rejected() {
        let err = TagOverrides::parse(&args(&["--lang", "klingon"])).unwrap_err();
        assert!(matches!(err, WorkbenchError::UnsupportedLanguage(_)));
    }

    #[test]
    fn test_cli_values_override_config() {
        let args = args(&[
            "--method", "basic", "--lang", "eng+tur", "--threshold", "300", "--blur", "4",
        ]);
        let tags = TagOverrides::parse(&args).unwrap();
        let mut config = AppConfig::default();
        config.preprocess.method = PreprocessMethod::Otsu;

        apply_overrides(&mut config, &args, &tags);

        assert_eq!(config.preprocess.method, PreprocessMethod::Gray);
        assert_eq!(config.ocr.language, OcrLanguage::EnglishTurkish);
        let effective = config.preprocess.to_config();
        assert_eq!(effective.threshold(), 255);
        assert_eq!(effective.blur_size(), 5);
    }

    #[test]
    fn test_headless_requires_image() {
        assert!(Args::try_parse_from(["ocr-workbench", "--headless"]).is_err());
    }
}
