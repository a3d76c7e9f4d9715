//! Downloadable renderings of stage results.
//!
//! List and Estimate become workbooks, Comparison becomes a PDF report.

pub mod report;
pub mod workbook;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{Stage, StageOutput};

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("Failed to write archive: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("I/O error while rendering: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write PDF: {0}")]
    Pdf(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactKind {
    Workbook,
    Report,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::Workbook => "workbook",
            ArtifactKind::Report => "report",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "workbook" => Some(ArtifactKind::Workbook),
            "report" => Some(ArtifactKind::Report),
            _ => None,
        }
    }

    pub fn for_stage(stage: Stage) -> Self {
        match stage {
            Stage::List | Stage::Estimate => ArtifactKind::Workbook,
            Stage::Comparison => ArtifactKind::Report,
        }
    }
}

/// A rendered artifact that has not been stored yet.
#[derive(Debug, Clone)]
pub struct RenderedArtifact {
    pub file_name: String,
    pub kind: ArtifactKind,
    pub bytes: Vec<u8>,
}

const REQUEST_TAG_LEN: usize = 8;

/// File name of a stage's artifact for a given `YYYY-MM-DD` date.
///
/// The leading characters of the request id are part of the name, so two
/// requests rendered on the same day never advertise the same file.
pub fn artifact_file_name(stage: Stage, date: &str, request_id: &str) -> String {
    let tag: String = request_id
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(REQUEST_TAG_LEN)
        .collect();
    match stage {
        Stage::List => format!("Перечень_работ_и_материалов_{}_{}.xlsx", date, tag),
        Stage::Estimate => format!("Смета_{}_{}.xlsx", date, tag),
        Stage::Comparison => format!("Сравнительный_анализ_{}_{}.pdf", date, tag),
    }
}

/// Renders one stage output of `request_id` with the builder matching its
/// stage.
pub fn render(
    output: &StageOutput,
    request_id: &str,
    date: &str,
    vat_rate: f64,
) -> Result<RenderedArtifact, RenderError> {
    let stage = output.stage();
    let bytes = match output {
        StageOutput::Items(items) => workbook::list_workbook(items)?,
        StageOutput::Estimate(items) => workbook::estimate_workbook(items, vat_rate)?,
        StageOutput::Comparison(report) => report::comparison_report(report, date)?,
    };

    Ok(RenderedArtifact {
        file_name: artifact_file_name(stage, date, request_id),
        kind: ArtifactKind::for_stage(stage),
        bytes,
    })
}
