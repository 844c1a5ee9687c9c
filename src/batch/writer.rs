//! Persists image parts of a generation result as numbered PNG files.

use crate::batch::progress::ProgressSink;
use crate::error::Result;
use crate::image::{GenerationResult, ImageFormat, ResponsePart};
use serde::Serialize;
use std::borrow::Cow;
use std::io::Cursor;
use std::path::{Path, PathBuf};

/// Stub used when a prompt has no alphanumeric characters.
const FALLBACK_STUB: &str = "image";

/// A PNG written for one image part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SavedFile {
    /// 1-based prompt position.
    pub index: usize,
    /// Filesystem-safe stub derived from the prompt.
    pub stub: String,
    /// 1-based part position within the response.
    pub sub_index: usize,
    /// Full path of the written file.
    pub path: PathBuf,
}

/// Writes generation results into one output directory.
#[derive(Debug, Clone)]
pub struct ResultWriter {
    output_dir: PathBuf,
    progress: ProgressSink,
}

impl ResultWriter {
    /// Creates a writer targeting `output_dir`.
    pub fn new(output_dir: impl Into<PathBuf>, progress: ProgressSink) -> Self {
        Self {
            output_dir: output_dir.into(),
            progress,
        }
    }

    /// Directory receiving the files.
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Creates the output directory and any missing parents.
    pub async fn ensure_output_dir(&self) -> Result<()> {
        tokio::fs::create_dir_all(&self.output_dir).await?;
        Ok(())
    }

    /// Saves every image part of `result` and returns the files written, in part order.
    ///
    /// Text-only and empty parts are skipped but still count toward the part position used in
    /// the file name. An empty vector means the response held no image.
    pub async fn save(
        &self,
        result: &GenerationResult,
        index: usize,
        prompt: &str,
    ) -> Result<Vec<SavedFile>> {
        let stub = prompt_stub(prompt);
        let mut saved = Vec::new();

        for (sub_index, part) in (1..).zip(&result.parts) {
            let ResponsePart::Image { mime_type, data } = part else {
                continue;
            };

            let png = to_png(data, mime_type)?;
            let path = self
                .output_dir
                .join(output_file_name(index, &stub, sub_index));
            tokio::fs::write(&path, &*png).await?;

            self.progress
                .log(format!("  Saved {}", path.display()))
                .await;
            saved.push(SavedFile {
                index,
                stub: stub.clone(),
                sub_index,
                path,
            });
        }

        Ok(saved)
    }
}

/// Derives a filesystem-safe stub from a prompt.
///
/// Each run of characters outside `[A-Za-z0-9]` becomes a single `_`, leading and trailing
/// underscores are dropped, and an empty result becomes `image`.
///
/// The stub is not length-limited. A prompt with roughly 245 or more alphanumeric characters
/// yields a file name past the filesystem's name limit, and that prompt's save fails.
pub fn prompt_stub(prompt: &str) -> String {
    let mut stub = String::with_capacity(prompt.len());
    let mut in_gap = false;
    for c in prompt.chars() {
        if c.is_ascii_alphanumeric() {
            if in_gap && !stub.is_empty() {
                stub.push('_');
            }
            stub.push(c);
            in_gap = false;
        } else {
            in_gap = true;
        }
    }

    if stub.is_empty() {
        FALLBACK_STUB.to_string()
    } else {
        stub
    }
}

/// File name for part `sub_index` of prompt `index`, e.g. `07_cat_2.png`.
pub fn output_file_name(index: usize, stub: &str, sub_index: usize) -> String {
    format!("{index:02}_{stub}_{sub_index}.png")
}

/// Returns PNG bytes, transcoding when the payload is another format.
fn to_png<'a>(data: &'a [u8], mime_type: &str) -> Result<Cow<'a, [u8]>> {
    let format =
        ImageFormat::from_magic_bytes(data).or_else(|| ImageFormat::from_mime_type(mime_type));
    if format == Some(ImageFormat::Png) {
        return Ok(Cow::Borrowed(data));
    }

    tracing::debug!(mime_type, "transcoding image payload to PNG");
    let decoded = ::image::load_from_memory(data)?;
    let mut buf = Vec::new();
    decoded.write_to(&mut Cursor::new(&mut buf), ::image::ImageFormat::Png)?;
    Ok(Cow::Owned(buf))
}
