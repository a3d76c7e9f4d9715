//! Comparison report as a paginated PDF.
//!
//! Uses the built-in Helvetica faces, so no font is embedded. Those faces
//! only cover Latin-1; Cyrillic is transliterated before layout.

use lopdf::{dictionary, Document, Object, ObjectId, Stream};

use super::RenderError;
use crate::results::{ComparisonReport, ComplianceBand, Discrepancy};

const PAGE_WIDTH: i64 = 595;
const PAGE_HEIGHT: i64 = 842;
const MARGIN: i64 = 50;
const BODY_SIZE: i64 = 10;
const HEADING_SIZE: i64 = 13;
const TITLE_SIZE: i64 = 18;
const LEADING: i64 = 14;
const WRAP_CHARS: usize = 92;

#[derive(Debug, Clone, PartialEq)]
enum Line {
    Title(String),
    Heading(String),
    Body(String),
    Verdict(String, ComplianceBand),
    Gap,
}

impl Line {
    fn height(&self) -> i64 {
        match self {
            Line::Title(_) => TITLE_SIZE + 12,
            Line::Heading(_) => HEADING_SIZE + 10,
            Line::Body(_) | Line::Verdict(..) => LEADING,
            Line::Gap => LEADING / 2,
        }
    }
}

/// Renders the report. `date` is printed under the title.
pub fn comparison_report(report: &ComparisonReport, date: &str) -> Result<Vec<u8>, RenderError> {
    let lines = layout(report, date);
    let pages = paginate(&lines);
    write_pdf(&pages)
}

fn layout(report: &ComparisonReport, date: &str) -> Vec<Line> {
    let mut lines = vec![
        Line::Title("Сравнительный анализ проекта и сметы".to_string()),
        Line::Body(format!("Smeta | {}", date)),
        Line::Gap,
    ];

    let verdict = match report.band() {
        ComplianceBand::High => "высокое соответствие",
        ComplianceBand::Medium => "среднее соответствие",
        ComplianceBand::Low => "низкое соответствие",
    };
    let pct = report
        .compliance_pct
        .map(|p| format!("{}%", p))
        .unwrap_or_else(|| "н/д".to_string());
    lines.push(Line::Verdict(
        format!("Соответствие проекту: {} ({})", pct, verdict),
        report.band(),
    ));
    lines.push(Line::Gap);

    if !report.summary.trim().is_empty() {
        lines.push(Line::Heading("Итоговый вывод".to_string()));
        push_wrapped(&mut lines, &report.summary);
        lines.push(Line::Gap);
    }

    if !report.critical_notes.is_empty() {
        lines.push(Line::Heading("Критические замечания".to_string()));
        for (i, note) in report.critical_notes.iter().enumerate() {
            push_wrapped(&mut lines, &format!("{}. {}", i + 1, note));
        }
        lines.push(Line::Gap);
    }

    let sections: [(&str, &[Discrepancy]); 4] = [
        ("Позиции, отсутствующие в смете", &report.missing_in_estimate),
        ("Лишние позиции в смете", &report.extra_in_estimate),
        ("Расхождения в объёмах", &report.quantity_discrepancies),
        ("Несоответствия единиц измерения", &report.unit_discrepancies),
    ];
    for (title, entries) in sections {
        if entries.is_empty() {
            continue;
        }
        lines.push(Line::Heading(title.to_string()));
        for (i, entry) in entries.iter().enumerate() {
            push_wrapped(&mut lines, &describe(i + 1, entry));
        }
        lines.push(Line::Gap);
    }

    lines
}

fn describe(number: usize, entry: &Discrepancy) -> String {
    let mut text = format!("{}. {}", number, entry.name);
    let details = entry.details();
    if !details.is_empty() {
        let joined: Vec<String> = details.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
        text.push_str(&format!(" ({})", joined.join("; ")));
    }
    if let Some(note) = &entry.note {
        text.push_str(&format!(". {}", note));
    }
    text
}

fn push_wrapped(lines: &mut Vec<Line>, text: &str) {
    for paragraph in text.lines() {
        for chunk in wrap(&transliterate(paragraph), WRAP_CHARS) {
            lines.push(Line::Body(chunk));
        }
    }
}

/// Greedy word wrap; words longer than `width` are split.
fn wrap(text: &str, width: usize) -> Vec<String> {
    let mut out = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();
        while word.len() > width {
            if !current.is_empty() {
                out.push(std::mem::take(&mut current));
            }
            out.push(word.drain(..width).collect());
        }
        let word: String = word.into_iter().collect();
        if word.is_empty() {
            continue;
        }

        let needed = if current.is_empty() {
            word.chars().count()
        } else {
            current.chars().count() + 1 + word.chars().count()
        };
        if needed > width {
            out.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(&word);
    }

    if !current.is_empty() || out.is_empty() {
        out.push(current);
    }
    out
}

fn paginate(lines: &[Line]) -> Vec<Vec<Line>> {
    let usable = PAGE_HEIGHT - 2 * MARGIN;
    let mut pages = vec![Vec::new()];
    let mut used = 0;

    for line in lines {
        if used + line.height() > usable {
            pages.push(Vec::new());
            used = 0;
            if *line == Line::Gap {
                continue;
            }
        }
        used += line.height();
        if let Some(page) = pages.last_mut() {
            page.push(line.clone());
        }
    }
    pages
}

fn page_content(lines: &[Line], page_number: usize, page_count: usize) -> String {
    let mut content = String::new();
    let mut y = PAGE_HEIGHT - MARGIN;

    for line in lines {
        y -= line.height();
        let (font, size, text, color) = match line {
            Line::Title(t) => ("F2", TITLE_SIZE, transliterate(t), None),
            Line::Heading(t) => ("F2", HEADING_SIZE, transliterate(t), None),
            Line::Body(t) => ("F1", BODY_SIZE, t.clone(), None),
            Line::Verdict(t, band) => ("F2", BODY_SIZE + 1, transliterate(t), Some(*band)),
            Line::Gap => continue,
        };
        let rgb = match color {
            Some(ComplianceBand::High) => "0 0.5 0",
            Some(ComplianceBand::Medium) => "1 0.65 0",
            Some(ComplianceBand::Low) => "1 0 0",
            None => "0 0 0",
        };
        content.push_str(&format!(
            "BT\n{} rg\n/{} {} Tf\n{} {} Td\n({}) Tj\nET\n",
            rgb,
            font,
            size,
            MARGIN,
            y,
            escape_pdf_string(&text)
        ));
    }

    content.push_str(&format!(
        "BT\n0 0 0 rg\n/F1 8 Tf\n{} {} Td\n(Page {} / {}) Tj\nET\n",
        PAGE_WIDTH - MARGIN - 50,
        MARGIN / 2,
        page_number,
        page_count
    ));
    content
}

fn write_pdf(pages: &[Vec<Line>]) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();
    let regular_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });
    let bold_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
        "Encoding" => "WinAnsiEncoding",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => regular_id,
            "F2" => bold_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for (i, lines) in pages.iter().enumerate() {
        let content = page_content(lines, i + 1, pages.len());
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.into_bytes()));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)
        .map_err(|e| RenderError::Pdf(e.to_string()))?;
    Ok(buffer)
}

fn escape_pdf_string(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '(' => "\\(".to_string(),
            ')' => "\\)".to_string(),
            '\\' => "\\\\".to_string(),
            c if c.is_ascii() && !c.is_control() => c.to_string(),
            _ => "?".to_string(),
        })
        .collect()
}

/// Latin transliteration of Russian text; other characters pass through,
/// with typographic punctuation folded to ASCII.
pub(crate) fn transliterate(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        let upper = c.is_uppercase();
        let lower = c.to_lowercase().next().unwrap_or(c);
        let latin = match lower {
            'а' => "a",
            'б' => "b",
            'в' => "v",
            'г' => "g",
            'д' => "d",
            'е' => "e",
            'ё' => "e",
            'ж' => "zh",
            'з' => "z",
            'и' => "i",
            'й' => "y",
            'к' => "k",
            'л' => "l",
            'м' => "m",
            'н' => "n",
            'о' => "o",
            'п' => "p",
            'р' => "r",
            'с' => "s",
            'т' => "t",
            'у' => "u",
            'ф' => "f",
            'х' => "kh",
            'ц' => "ts",
            'ч' => "ch",
            'ш' => "sh",
            'щ' => "shch",
            'ъ' => "",
            'ы' => "y",
            'ь' => "",
            'э' => "e",
            'ю' => "yu",
            'я' => "ya",
            '—' | '–' => "-",
            '«' | '»' | '“' | '”' => "\"",
            '№' => "No.",
            '²' => "2",
            '³' => "3",
            _ => {
                out.push(c);
                continue;
            }
        };
        if upper {
            let mut chars = latin.chars();
            if let Some(first) = chars.next() {
                out.extend(first.to_uppercase());
                out.push_str(chars.as_str());
            }
        } else {
            out.push_str(latin);
        }
    }
    out
}
