use std::path::Path;

use crate::error::ProcessError;
use crate::processor::{
    file_name_or, DocumentContent, DocumentFormat, DocumentProcessor, ParsedDocument,
};

/// Extracts the embedded text layer page by page. Scanned PDFs without a
/// text layer are rejected rather than passed on as empty documents.
pub struct PdfProcessor;

impl PdfProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for PdfProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for PdfProcessor {
    fn process(&self, path: &Path) -> Result<ParsedDocument, ProcessError> {
        let _span = tracing::info_span!("processor.pdf").entered();

        let pdf_bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: e,
        })?;

        let doc = lopdf::Document::load_mem(&pdf_bytes)
            .map_err(|e| ProcessError::PdfProcessing(format!("Failed to load PDF: {}", e)))?;

        let text = extract_text_from_pdf(&doc);
        if text.trim().is_empty() {
            return Err(ProcessError::PdfProcessing(
                "PDF has no extractable text layer".to_string(),
            ));
        }

        Ok(ParsedDocument::new(
            file_name_or(path, "document.pdf"),
            DocumentFormat::Pdf,
            DocumentContent::Text(text),
        ))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Pdf)
    }
}

fn extract_text_from_pdf(doc: &lopdf::Document) -> String {
    let mut text = String::new();

    for (page_num, _) in doc.get_pages() {
        match doc.extract_text(&[page_num]) {
            Ok(page_text) => {
                text.push_str(&page_text);
                text.push('\n');
            }
            Err(e) => tracing::warn!("Skipping PDF page {}: {}", page_num, e),
        }
    }

    text
}
