//! Fixed-location reference price catalogs used by the Estimate stage.

use std::path::{Path, PathBuf};

use calamine::{open_workbook_auto, Data, Reader};
use thiserror::Error;

use crate::artifacts::workbook::{price_list_workbook, PriceRow};
use crate::artifacts::RenderError;
use crate::config::CatalogConfig;
use crate::error::{ProcessError, StorageError};
use crate::sanitize::truncate_chars;
use crate::storage::filesystem::ensure_directory;

/// Stand-in text when a catalog is missing or unreadable.
pub const CATALOG_UNAVAILABLE: &str = "(прайс-лист не найден или ошибка при чтении)";

#[derive(Debug, Clone)]
pub struct PriceCatalogs {
    works_path: PathBuf,
    materials_path: PathBuf,
    max_rows: usize,
    max_chars: usize,
}

impl PriceCatalogs {
    pub fn from_config(config: &CatalogConfig) -> Self {
        Self {
            works_path: PathBuf::from(&config.works_path),
            materials_path: PathBuf::from(&config.materials_path),
            max_rows: config.max_rows,
            max_chars: config.max_chars,
        }
    }

    /// Prompt excerpt of the works catalog.
    pub fn works(&self) -> String {
        read_catalog(&self.works_path, self.max_rows, self.max_chars)
    }

    /// Prompt excerpt of the materials catalog.
    pub fn materials(&self) -> String {
        read_catalog(&self.materials_path, self.max_rows, self.max_chars)
    }
}

/// First `max_rows` rows of the first sheet, one line per row with cells
/// joined by ` | `, cut to `max_chars`. Never fails: problems degrade to
/// [`CATALOG_UNAVAILABLE`].
pub fn read_catalog(path: &Path, max_rows: usize, max_chars: usize) -> String {
    match read_rows(path, max_rows) {
        Ok(text) => truncate_chars(&text, max_chars).to_string(),
        Err(e) => {
            log::warn!("Price catalog {} unavailable: {}", path.display(), e);
            CATALOG_UNAVAILABLE.to_string()
        }
    }
}

fn read_rows(path: &Path, max_rows: usize) -> Result<String, ProcessError> {
    if !path.is_file() {
        return Err(ProcessError::ReadDocument {
            path: path.to_path_buf(),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "catalog file not found"),
        });
    }

    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ProcessError::SpreadsheetProcessing(e.to_string()))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ProcessError::SpreadsheetProcessing("workbook has no sheets".to_string()))?
        .map_err(|e| ProcessError::SpreadsheetProcessing(e.to_string()))?;

    let lines: Vec<String> = range
        .rows()
        .filter(|row| row.iter().any(|cell| !matches!(cell, Data::Empty)))
        .take(max_rows)
        .map(|row| {
            row.iter()
                .map(|cell| cell.to_string())
                .collect::<Vec<_>>()
                .join(" | ")
        })
        .collect();

    Ok(lines.join("\n"))
}

// ─── Sample catalogs ────────────────────────────────────────────────────────

const SAMPLE_WORKS: &[(&str, &str, [f64; 2])] = &[
    ("Демонтаж стен из кирпича", "м²", [450.0, 480.0]),
    ("Кладка стен из кирпича", "м²", [550.0, 600.0]),
    ("Штукатурка поверхностей", "м²", [320.0, 350.0]),
    ("Шпатлевание поверхностей", "м²", [280.0, 300.0]),
    ("Окраска стен", "м²", [200.0, 220.0]),
    ("Монтаж входной двери", "комп.", [3500.0, 4000.0]),
    ("Монтаж окна ПВХ", "комп.", [2000.0, 2200.0]),
    ("Укладка ламината", "м²", [400.0, 450.0]),
    ("Укладка керамической плитки", "м²", [600.0, 700.0]),
    ("Установка унитаза", "шт.", [2000.0, 2500.0]),
];

const SAMPLE_MATERIALS: &[(&str, &str, f64)] = &[
    ("Кирпич рядовой красный", "шт.", 14.5),
    ("Цемент М400", "кг", 8.5),
    ("Песок строительный", "м³", 450.0),
    ("Щебень фракция 20-40 мм", "м³", 650.0),
    ("Стекловидный блок", "м²", 280.0),
    ("Монтажная пена", "баллон", 250.0),
    ("Гипсокартон стандартный", "м²", 180.0),
    ("Ламинат класс 32", "м²", 350.0),
    ("Керамическая плитка", "м²", 550.0),
    ("Краска акриловая 14 кг", "л", 450.0),
    ("Грунтовка глубокого проникновения", "л", 180.0),
    ("Дверное полотно ДСП", "шт.", 1500.0),
    ("Окно ПВХ 1400х1400", "комп.", 8000.0),
    ("Унитаз керамический", "шт.", 5000.0),
    ("Раковина для ванной", "шт.", 3000.0),
];

#[derive(Debug, Error)]
pub enum SeedError {
    #[error("Failed to build sample catalog: {0}")]
    Render(#[from] RenderError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// What [`seed_sample_catalogs`] did with each catalog path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedReport {
    pub written: Vec<PathBuf>,
    pub kept: Vec<PathBuf>,
}

/// Writes the sample works and materials catalogs to the configured paths.
/// Existing files are kept unless `overwrite` is set.
pub fn seed_sample_catalogs(config: &CatalogConfig, overwrite: bool) -> Result<SeedReport, SeedError> {
    let works: Vec<PriceRow> = SAMPLE_WORKS
        .iter()
        .map(|(name, unit, prices)| PriceRow {
            name: name.to_string(),
            unit: unit.to_string(),
            prices: prices.to_vec(),
        })
        .collect();
    let materials: Vec<PriceRow> = SAMPLE_MATERIALS
        .iter()
        .map(|(name, unit, price)| PriceRow {
            name: name.to_string(),
            unit: unit.to_string(),
            prices: vec![*price],
        })
        .collect();

    let catalogs = [
        (
            PathBuf::from(&config.works_path),
            price_list_workbook(
                "Прайс на работы",
                &["Наименование", "Ед. изм.", "Подрядчик 1", "Подрядчик 2"],
                &works,
            )?,
        ),
        (
            PathBuf::from(&config.materials_path),
            price_list_workbook(
                "Прайс на материалы",
                &["Наименование", "Ед. изм.", "Цена, руб."],
                &materials,
            )?,
        ),
    ];

    let mut report = SeedReport::default();
    for (path, bytes) in catalogs {
        if path.exists() && !overwrite {
            log::info!("Keeping existing catalog {}", path.display());
            report.kept.push(path);
            continue;
        }
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_directory(parent)?;
        }
        std::fs::write(&path, &bytes).map_err(|source| StorageError::WriteFile {
            path: path.clone(),
            source,
        })?;
        log::info!("Wrote sample catalog {}", path.display());
        report.written.push(path);
    }
    Ok(report)
}
