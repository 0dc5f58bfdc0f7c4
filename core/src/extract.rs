//! Text-extraction collaborator interface.
//!
//! The engines themselves (PDF text layer, OCR) live outside this crate. [`CommandExtractor`]
//! shells out to one; [`HybridExtractor`] tries the direct text layer first and falls back
//! to OCR when it yields too little.

use std::io::Write;
use std::process::{Command, Stdio};

use crate::document::ExtractionMethod;
use crate::error::ExtractError;

/// Text that a collaborator pulled out of a file, tagged with the path that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extraction {
    pub text: String,
    pub method: ExtractionMethod,
}

pub trait TextExtractor: Send + Sync {
    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractError>;
}

impl<F> TextExtractor for F
where
    F: Fn(&[u8]) -> Result<Extraction, ExtractError> + Send + Sync,
{
    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        self(bytes)
    }
}

/// Runs an external program with the file on stdin and reads text from stdout,
/// e.g. `pdftotext - -`.
#[derive(Debug, Clone)]
pub struct CommandExtractor {
    program: String,
    args: Vec<String>,
    method: ExtractionMethod,
}

impl CommandExtractor {
    pub fn new(program: impl Into<String>, args: Vec<String>, method: ExtractionMethod) -> Self {
        Self { program: program.into(), args, method }
    }

    /// Splits a whitespace-separated command line. Returns `None` for a blank line.
    pub fn from_command_line(line: &str, method: ExtractionMethod) -> Option<Self> {
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self::new(program, parts.collect(), method))
    }
}

impl TextExtractor for CommandExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        let spawn_err = |source: std::io::Error| ExtractError::Spawn { program: self.program.clone(), source };
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(spawn_err)?;

        // Feed stdin from another thread so a full stdout pipe cannot deadlock us.
        let mut stdin = child.stdin.take();
        let input = bytes.to_vec();
        let writer = std::thread::spawn(move || match stdin.as_mut() {
            Some(pipe) => pipe.write_all(&input),
            None => Ok(()),
        });

        let output = child.wait_with_output().map_err(spawn_err)?;
        if let Ok(Err(e)) = writer.join() {
            // The program may legitimately stop reading early; only its exit status counts.
            tracing::debug!(program = %self.program, error = %e, "extractor closed stdin early");
        }

        if !output.status.success() {
            return Err(ExtractError::CommandFailed {
                program: self.program.clone(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(Extraction {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            method: self.method,
        })
    }
}

/// Direct extraction with an optional OCR fallback.
pub struct HybridExtractor {
    direct: Box<dyn TextExtractor>,
    ocr: Option<Box<dyn TextExtractor>>,
    /// Direct results with fewer trimmed characters than this trigger the fallback.
    min_direct_chars: usize,
}

impl HybridExtractor {
    pub const DEFAULT_MIN_DIRECT_CHARS: usize = 100;

    pub fn new(direct: Box<dyn TextExtractor>, ocr: Option<Box<dyn TextExtractor>>) -> Self {
        Self { direct, ocr, min_direct_chars: Self::DEFAULT_MIN_DIRECT_CHARS }
    }

    pub fn with_min_direct_chars(mut self, chars: usize) -> Self {
        self.min_direct_chars = chars;
        self
    }
}

impl TextExtractor for HybridExtractor {
    fn extract(&self, bytes: &[u8]) -> Result<Extraction, ExtractError> {
        let direct = self.direct.extract(bytes);
        let direct_chars = match &direct {
            Ok(e) => e.text.trim().chars().count(),
            Err(_) => 0,
        };
        if direct.is_ok() && direct_chars >= self.min_direct_chars {
            return direct;
        }

        let Some(ocr) = &self.ocr else {
            return direct;
        };
        tracing::info!(direct_chars, "direct text insufficient, falling back to OCR");
        match ocr.extract(bytes) {
            Ok(e) => Ok(e),
            Err(ocr_err) => {
                tracing::warn!(error = %ocr_err, "OCR fallback failed");
                // A short direct result still beats nothing; let the caller judge it.
                direct.or(Err(ocr_err))
            }
        }
    }
}
