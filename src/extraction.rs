//! # Text Extraction
//!
//! The pipeline starts at "raw text in". Recognition (OCR, speech-to-text)
//! happens outside this crate; a [`TextExtractor`] hands its output over.

use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use crate::errors::PipelineError;
use crate::model::RawInput;

/// Turns one [`RawInput`] into UTF-8 text
///
/// An unreadable input fails with [`PipelineError::Extraction`], which skips
/// that input only.
#[async_trait]
pub trait TextExtractor: Send + Sync {
    async fn extract(&self, input: &RawInput) -> Result<String, PipelineError>;
}

/// The input content already is the recognized text
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughExtractor;

#[async_trait]
impl TextExtractor for PassthroughExtractor {
    async fn extract(&self, input: &RawInput) -> Result<String, PipelineError> {
        Ok(input.content.clone())
    }
}

/// The input content is a path to a UTF-8 text file (an OCR dump or transcript)
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTextExtractor;

#[async_trait]
impl TextExtractor for FileTextExtractor {
    async fn extract(&self, input: &RawInput) -> Result<String, PipelineError> {
        let path = Path::new(input.content.trim());
        let bytes = tokio::fs::read(path).await.map_err(|e| {
            PipelineError::Extraction(format!("cannot read '{}': {}", path.display(), e))
        })?;
        let text = String::from_utf8(bytes).map_err(|_| {
            PipelineError::Extraction(format!("'{}' is not valid UTF-8 text", path.display()))
        })?;
        debug!(path = %path.display(), chars = text.chars().count(), "Extracted text from file");
        Ok(text)
    }
}
