use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;

use tracing::debug;

pub const PANDOC_BINARY: &str = "pandoc";

/// Result of one HTML to Markdown conversion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversionOutcome {
    Converted(String),
    /// The converter binary could not be found.
    Unavailable { program: String },
    /// The converter ran and rejected the input, or could not be driven.
    Failed { code: Option<i32>, stderr: String },
}

pub trait MarkdownConverter {
    fn convert(&self, html: &str) -> ConversionOutcome;
}

/// Converter backed by an external process that reads HTML on stdin and writes Markdown on stdout.
#[derive(Debug, Clone)]
pub struct ExternalConverter {
    program: PathBuf,
    args: Vec<String>,
}

impl ExternalConverter {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `pandoc -f html -t markdown`, using `configured` when given and `PATH` otherwise.
    pub fn pandoc(configured: Option<PathBuf>) -> Self {
        let program = configured
            .or_else(|| which::which(PANDOC_BINARY).ok())
            .unwrap_or_else(|| PathBuf::from(PANDOC_BINARY));
        Self::new(
            program,
            vec![
                "-f".to_string(),
                "html".to_string(),
                "-t".to_string(),
                "markdown".to_string(),
            ],
        )
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    pub fn is_available(&self) -> bool {
        if self.program.components().count() > 1 {
            return self.program.is_file();
        }
        which::which(&self.program).is_ok()
    }
}

impl MarkdownConverter for ExternalConverter {
    fn convert(&self, html: &str) -> ConversionOutcome {
        let spawned = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn();
        let mut child = match spawned {
            Ok(child) => child,
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                return ConversionOutcome::Unavailable {
                    program: self.program.display().to_string(),
                };
            }
            Err(error) => {
                return ConversionOutcome::Failed {
                    code: None,
                    stderr: format!("failed to execute {}: {error}", self.program.display()),
                };
            }
        };

        // stdin is written off-thread; the child may block on a full stdout pipe before reading all input.
        let feeder = child.stdin.take().map(|mut stdin| {
            let input = html.as_bytes().to_vec();
            thread::spawn(move || stdin.write_all(&input))
        });

        let output = match child.wait_with_output() {
            Ok(output) => output,
            Err(error) => {
                return ConversionOutcome::Failed {
                    code: None,
                    stderr: format!("failed to wait for {}: {error}", self.program.display()),
                };
            }
        };
        let feed_result = match feeder.map(|handle| handle.join()) {
            Some(Ok(result)) => result,
            Some(Err(_)) => Err(io::Error::other("stdin feeder thread panicked")),
            None => Ok(()),
        };

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return ConversionOutcome::Failed {
                code: output.status.code(),
                stderr,
            };
        }
        if let Err(error) = feed_result {
            return ConversionOutcome::Failed {
                code: output.status.code(),
                stderr: format!("failed to write input: {error}"),
            };
        }

        let markdown = String::from_utf8_lossy(&output.stdout).to_string();
        debug!(
            program = %self.program.display(),
            html_len = html.len(),
            markdown_len = markdown.len(),
            "converted page"
        );
        ConversionOutcome::Converted(markdown)
    }
}
