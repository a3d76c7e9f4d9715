use std::collections::BTreeMap;
use std::sync::LazyLock;

use regex::Regex;

use crate::processor::ParsedDocument;
use crate::store::ArtifactRef;
use crate::worker::job::Job;

use super::stage::{Stage, StageOutput};

static RE_PROJECT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)проект|спец|project|spec").unwrap());

const PROJECT_MARKERS: [&str; 3] = ["спецификаци", "проектн", "specification"];

/// Mutable state of one pipeline run.
pub struct PipelineContext {
    // Input
    pub job: Job,

    /// `YYYY-MM-DD` stamped into artifact names; fixed when the run starts.
    pub date: String,

    // Filled by normalization, in upload order
    pub documents: Vec<ParsedDocument>,

    // Structured result of every stage run so far
    pub outputs: BTreeMap<Stage, StageOutput>,

    // Artifacts recorded so far; survives a later stage failing
    pub artifacts: BTreeMap<Stage, ArtifactRef>,
}

impl PipelineContext {
    pub fn new(job: Job) -> Self {
        Self {
            job,
            date: chrono::Local::now().format("%Y-%m-%d").to_string(),
            documents: Vec::new(),
            outputs: BTreeMap::new(),
            artifacts: BTreeMap::new(),
        }
    }

    pub fn request_id(&self) -> &str {
        &self.job.request_id
    }

    pub fn has_project_document(&self, excerpt_chars: usize) -> bool {
        self.documents
            .iter()
            .any(|doc| is_project_document(doc, excerpt_chars))
    }
}

/// Whether a document looks like project or specification material, judged
/// by its file name or the first `excerpt_chars` characters of its text.
pub fn is_project_document(doc: &ParsedDocument, excerpt_chars: usize) -> bool {
    if RE_PROJECT_NAME.is_match(&doc.filename) {
        return true;
    }
    let excerpt = doc.excerpt(excerpt_chars).to_lowercase();
    PROJECT_MARKERS.iter().any(|marker| excerpt.contains(marker))
}
