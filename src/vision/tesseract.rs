//! Tesseract command-line backend
//!
//! Encodes the preprocessed image as PNG in memory and pipes it through the
//! `tesseract` executable (`tesseract stdin stdout -l <lang>`).

use anyhow::{bail, Context, Result};
use image::codecs::png::PngEncoder;
use image::GrayImage;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

use crate::vision::ocr::{OcrLanguage, TextRecognizer};

/// Default executable name, resolved through `PATH`
pub const DEFAULT_TESSERACT_CMD: &str = "tesseract";

/// Tesseract invoked as a child process per recognition
#[derive(Debug, Clone)]
pub struct TesseractCli {
    command: PathBuf,
    psm: Option<u32>,
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new(DEFAULT_TESSERACT_CMD)
    }
}

impl TesseractCli {
    pub fn new(command: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            psm: None,
        }
    }

    /// Set an explicit page segmentation mode
    pub fn with_psm(mut self, psm: Option<u32>) -> Self {
        self.psm = psm;
        self
    }

    pub fn command(&self) -> &Path {
        &self.command
    }

    /// Query the installed Tesseract version (first line of `--version`)
    pub fn version(&self) -> Result<String> {
        let output = Command::new(&self.command)
            .arg("--version")
            .output()
            .with_context(|| format!("Failed to run {:?}. Is Tesseract installed and on PATH?", self.command))?;

        if !output.status.success() {
            bail!(
                "{:?} --version exited with {}",
                self.command,
                output.status
            );
        }

        // Older releases print the banner on stderr
        let text = if output.stdout.is_empty() {
            String::from_utf8_lossy(&output.stderr).into_owned()
        } else {
            String::from_utf8_lossy(&output.stdout).into_owned()
        };

        let first = text.lines().next().unwrap_or_default().trim().to_string();
        info!("Tesseract backend: {}", first);
        Ok(first)
    }
}

/// Encode an intensity image as PNG bytes
pub fn encode_png(image: &GrayImage) -> Result<Vec<u8>> {
    let mut png = Vec::new();
    image
        .write_with_encoder(PngEncoder::new(&mut png))
        .context("Failed to encode image as PNG for OCR")?;
    Ok(png)
}

impl TextRecognizer for TesseractCli {
    fn name(&self) -> &str {
        "tesseract"
    }

    fn recognize(&self, image: &GrayImage, language: OcrLanguage) -> Result<String> {
        if image.width() == 0 || image.height() == 0 {
            return Ok(String::new());
        }

        let png = encode_png(image)?;
        debug!(
            "Tesseract: {}x{} image, {} PNG bytes, lang={}",
            image.width(),
            image.height(),
            png.len(),
            language
        );

        let mut command = Command::new(&self.command);
        command.arg("stdin").arg("stdout").arg("-l").arg(language.tag());
        if let Some(psm) = self.psm {
            command.arg("--psm").arg(psm.to_string());
        }

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to start {:?}. Is Tesseract installed and on PATH?", self.command))?;

        // Dropping stdin at the end of this block closes the pipe. Tesseract
        // exits without reading when it rejects its arguments; its own
        // message on stderr is then more useful than the broken pipe.
        if let Some(mut stdin) = child.stdin.take() {
            match stdin.write_all(&png) {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::BrokenPipe => {
                    debug!("Tesseract closed stdin early");
                }
                Err(e) => {
                    drop(stdin);
                    if let Err(kill_err) = child.kill() {
                        warn!("Failed to stop Tesseract: {}", kill_err);
                    }
                    let _ = child.wait();
                    return Err(e).context("Failed to pipe image to Tesseract");
                }
            }
        }

        let output = child
            .wait_with_output()
            .context("Failed to wait for Tesseract")?;

        if !output.status.success() {
            bail!(
                "Tesseract failed ({}): {}",
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}
