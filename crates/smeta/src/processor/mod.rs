pub mod docx;
pub mod pdf;
pub mod spreadsheet;
pub mod text;
pub mod xml;

use std::borrow::Cow;
use std::path::Path;

use serde::Serialize;

use crate::error::ProcessError;
use crate::sanitize;

/// Input formats the normalizer understands, keyed by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFormat {
    Text,
    Pdf,
    Docx,
    Spreadsheet,
    Xml,
    /// GrandSmeta export: a zip archive wrapping XML.
    Gsn,
}

impl DocumentFormat {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "text" | "md" | "csv" => Some(Self::Text),
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Docx),
            "xlsx" | "xlsm" | "xls" | "ods" => Some(Self::Spreadsheet),
            "xml" => Some(Self::Xml),
            "gsn" => Some(Self::Gsn),
            _ => None,
        }
    }
}

/// Normalized form of one uploaded document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentContent {
    Text(String),
    /// Tagged tree (spreadsheets, XML estimates).
    Structured(serde_json::Value),
}

#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub filename: String,
    pub format: DocumentFormat,
    pub content: DocumentContent,
}

impl ParsedDocument {
    pub fn new(filename: impl Into<String>, format: DocumentFormat, content: DocumentContent) -> Self {
        Self {
            filename: filename.into(),
            format,
            content,
        }
    }

    /// Full textual rendering. Structured trees become compact JSON with
    /// non-ASCII characters kept as-is.
    pub fn text(&self) -> Cow<'_, str> {
        match &self.content {
            DocumentContent::Text(text) => Cow::Borrowed(text),
            DocumentContent::Structured(value) => Cow::Owned(value.to_string()),
        }
    }

    /// The first `max_chars` characters of [`ParsedDocument::text`].
    pub fn excerpt(&self, max_chars: usize) -> String {
        sanitize::truncate_chars(&self.text(), max_chars).to_string()
    }
}

pub trait DocumentProcessor: Send + Sync {
    fn process(&self, path: &Path) -> Result<ParsedDocument, ProcessError>;
    fn supports(&self, format: DocumentFormat) -> bool;
}

pub struct ProcessorRegistry {
    processors: Vec<Box<dyn DocumentProcessor>>,
}

impl ProcessorRegistry {
    pub fn new() -> Self {
        let processors: Vec<Box<dyn DocumentProcessor>> = vec![
            Box::new(text::TextProcessor::new()),
            Box::new(pdf::PdfProcessor::new()),
            Box::new(docx::DocxProcessor::new()),
            Box::new(spreadsheet::SpreadsheetProcessor::new()),
            Box::new(xml::XmlProcessor::new()),
        ];

        Self { processors }
    }

    pub fn process(&self, path: &Path) -> Result<ParsedDocument, ProcessError> {
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");

        let format = DocumentFormat::from_extension(extension)
            .ok_or_else(|| ProcessError::UnsupportedFormat(extension.to_string()))?;

        for processor in &self.processors {
            if processor.supports(format) {
                return processor.process(path);
            }
        }

        Err(ProcessError::UnsupportedFormat(extension.to_string()))
    }
}

impl Default for ProcessorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// File name component of `path`, falling back to `default`.
pub(crate) fn file_name_or(path: &Path, default: &str) -> String {
    path.file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(default)
        .to_string()
}
