//! The unit of work submitted to a [`BatchRunner`](super::BatchRunner).

use crate::config::resolve_output_dir;
use crate::error::truncate_chars;
use crate::image::OutputConfig;
use std::path::PathBuf;

/// Characters of a prompt shown in its progress line.
const LABEL_LEN: usize = 80;

/// A batch of prompts plus the settings shared by all of them.
#[derive(Debug, Clone)]
pub struct BatchJob {
    /// Prompts in submission order.
    pub prompts: Vec<String>,
    /// Aspect ratio and resolution for every prompt.
    pub config: OutputConfig,
    /// Directory receiving the PNG files.
    pub output_dir: PathBuf,
    /// Resolved credential. Checked by the worker before any request.
    pub api_key: Option<String>,
}

impl BatchJob {
    /// Creates a job writing to the default output directory.
    pub fn new<I, S>(prompts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            prompts: prompts.into_iter().map(Into::into).collect(),
            config: OutputConfig::default(),
            output_dir: resolve_output_dir(None),
            api_key: None,
        }
    }

    /// Creates a job from free text, one prompt per non-blank line.
    pub fn from_text(text: &str) -> Self {
        Self::new(parse_prompts(text))
    }

    /// Sets the generation settings.
    pub fn with_config(mut self, config: OutputConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the output directory.
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = dir.into();
        self
    }

    /// Sets the credential.
    pub fn with_api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Trimmed, non-blank prompts in order.
    pub fn normalized_prompts(&self) -> Vec<String> {
        self.prompts
            .iter()
            .map(|p| p.trim())
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// The credential, if present and non-blank.
    pub(crate) fn credential(&self) -> Option<&str> {
        self.api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }
}

/// Splits free text into prompts: one per line, trimmed, blank lines dropped.
pub fn parse_prompts(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Short form of a prompt for progress lines.
pub fn prompt_label(prompt: &str) -> String {
    truncate_chars(prompt, LABEL_LEN)
}
