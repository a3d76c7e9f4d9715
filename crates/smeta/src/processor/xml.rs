use std::io::Read;
use std::path::Path;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};

use crate::error::ProcessError;
use crate::processor::{
    file_name_or, DocumentContent, DocumentFormat, DocumentProcessor, ParsedDocument,
};

/// GrandSmeta estimates, either bare XML or a `.gsn` zip wrapping it.
///
/// Elements map to JSON objects: attributes under `@attributes`, repeated
/// child tags collapse into arrays, text next to children or attributes
/// lands in `#text`, a text-only element becomes a plain string and an empty
/// element becomes `null`. The result is `{root_tag: value}`.
pub struct XmlProcessor;

impl XmlProcessor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for XmlProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentProcessor for XmlProcessor {
    fn process(&self, path: &Path) -> Result<ParsedDocument, ProcessError> {
        let _span = tracing::info_span!("processor.xml").entered();

        let (format, value) = if has_extension(path, "gsn") {
            (DocumentFormat::Gsn, parse_gsn_archive(path)?)
        } else {
            let bytes = std::fs::read(path).map_err(|e| ProcessError::ReadDocument {
                path: path.to_path_buf(),
                source: e,
            })?;
            let xml = String::from_utf8_lossy(&bytes);
            (DocumentFormat::Xml, xml_to_value(&xml)?)
        };

        Ok(ParsedDocument::new(
            file_name_or(path, "estimate.xml"),
            format,
            DocumentContent::Structured(value),
        ))
    }

    fn supports(&self, format: DocumentFormat) -> bool {
        matches!(format, DocumentFormat::Xml | DocumentFormat::Gsn)
    }
}

fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ext))
}

/// Parses the first `.xml` member of the archive, in archive order.
fn parse_gsn_archive(path: &Path) -> Result<Value, ProcessError> {
    let file = std::fs::File::open(path).map_err(|e| ProcessError::ReadDocument {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut archive = zip::ZipArchive::new(file)
        .map_err(|e| ProcessError::ArchiveProcessing(format!("Failed to open archive: {}", e)))?;

    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| ProcessError::ArchiveProcessing(format!("Bad archive entry: {}", e)))?;

        if entry.is_dir() || !entry.name().to_lowercase().ends_with(".xml") {
            continue;
        }

        let mut bytes = Vec::new();
        entry.read_to_end(&mut bytes).map_err(|e| {
            ProcessError::ArchiveProcessing(format!("Failed to read '{}': {}", entry.name(), e))
        })?;
        return xml_to_value(&String::from_utf8_lossy(&bytes));
    }

    Err(ProcessError::ArchiveProcessing(
        "No XML files found in archive".to_string(),
    ))
}

struct Frame {
    name: String,
    attributes: Map<String, Value>,
    children: Map<String, Value>,
    text: String,
}

impl Frame {
    fn open(start: &BytesStart<'_>) -> Result<Self, ProcessError> {
        let mut attributes = Map::new();
        for attr in start.attributes() {
            let attr = attr.map_err(|e| ProcessError::XmlProcessing(e.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let raw = String::from_utf8_lossy(&attr.value).into_owned();
            let value = match quick_xml::escape::unescape(&raw) {
                Ok(unescaped) => unescaped.into_owned(),
                Err(_) => raw,
            };
            attributes.insert(key, Value::String(value));
        }

        Ok(Self {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            attributes,
            children: Map::new(),
            text: String::new(),
        })
    }

    fn close(self) -> (String, Value) {
        let text = self.text.trim().to_string();
        let has_structure = !self.children.is_empty() || !self.attributes.is_empty();

        if !text.is_empty() && !has_structure {
            return (self.name, Value::String(text));
        }

        let mut result = Map::new();
        if !self.attributes.is_empty() {
            result.insert("@attributes".to_string(), Value::Object(self.attributes));
        }
        result.extend(self.children);
        if !text.is_empty() {
            result.insert("#text".to_string(), Value::String(text));
        }

        let value = if result.is_empty() {
            Value::Null
        } else {
            Value::Object(result)
        };
        (self.name, value)
    }

    fn add_child(&mut self, name: String, value: Value) {
        match self.children.get_mut(&name) {
            Some(Value::Array(items)) => items.push(value),
            Some(existing) => {
                let first = existing.take();
                *existing = Value::Array(vec![first, value]);
            }
            None => {
                self.children.insert(name, value);
            }
        }
    }
}

pub(crate) fn xml_to_value(xml: &str) -> Result<Value, ProcessError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => stack.push(Frame::open(e)?),
            Ok(Event::Empty(ref e)) => {
                let (name, value) = Frame::open(e)?.close();
                match stack.last_mut() {
                    Some(parent) => parent.add_child(name, value),
                    None => root = Some((name, value)),
                }
            }
            Ok(Event::End(_)) => {
                let frame = stack.pop().ok_or_else(|| {
                    ProcessError::XmlProcessing("Unexpected closing tag".to_string())
                })?;
                let (name, value) = frame.close();
                match stack.last_mut() {
                    Some(parent) => parent.add_child(name, value),
                    None => root = Some((name, value)),
                }
            }
            Ok(Event::Text(e)) => {
                if let Some(frame) = stack.last_mut() {
                    let decoded = e.unescape().unwrap_or_default();
                    frame.text.push_str(&decoded);
                }
            }
            Ok(Event::CData(e)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&String::from_utf8_lossy(&e));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => {
                return Err(ProcessError::XmlProcessing(format!(
                    "Error at position {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err(ProcessError::XmlProcessing(
            "Unexpected end of document".to_string(),
        ));
    }

    let (name, value) =
        root.ok_or_else(|| ProcessError::XmlProcessing("Document has no root element".to_string()))?;
    let mut wrapped = Map::new();
    wrapped.insert(name, value);
    Ok(Value::Object(wrapped))
}
