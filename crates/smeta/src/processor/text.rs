use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{
    file_name_or, DocumentContent, DocumentFormat, DocumentProcessor, ParsedDocument,
};

/// Plain text, markdown and CSV. Invalid UTF-8 is replaced, not rejected.
pub struct TextProcessor;

impl TextProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TextProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for TextProcessor {
    fn process(&self, path: &Path) -> Result<ParsedDocument, ProcessError> {
        let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let text = String::from_utf8_lossy(&bytes);
        let text = text.strip_prefix('\u{feff}').unwrap_or(&text).to_string();

        Ok(ParsedDocument::new(
            file_name_or(path, "document.txt"),
            DocumentFormat::Text,
            DocumentContent::Text(text),
        ))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Text)
    }
}
