//! Minimal Office Open XML spreadsheet writer and the list/estimate layouts.
//!
//! Only what the two layouts need is supported: inline strings, numbers,
//! four cell styles, column widths and a frozen header row.

use std::io::{Cursor, Write};

use quick_xml::escape::escape;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use super::RenderError;
use crate::results::{EstimateItem, EstimateTotals, LineItem};

const SHEET_ALL: &str = "Перечень работ и материалов";
const SHEET_WORKS: &str = "Перечень работ";
const SHEET_MATERIALS: &str = "Перечень материалов";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Style {
    Normal = 0,
    Header = 1,
    Unpriced = 2,
    Total = 3,
}

#[derive(Debug, Clone, PartialEq)]
enum Cell {
    Empty,
    Text(String),
    Number(f64),
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Cell::Empty
        } else {
            Cell::Text(s.to_string())
        }
    }
}

impl From<Option<f64>> for Cell {
    fn from(n: Option<f64>) -> Self {
        match n {
            Some(n) if n.is_finite() => Cell::Number(n),
            _ => Cell::Empty,
        }
    }
}

struct Sheet {
    name: &'static str,
    widths: Vec<f64>,
    rows: Vec<(Style, Vec<Cell>)>,
}

impl Sheet {
    fn new(name: &'static str, headers: &[&str], widths: &[f64]) -> Self {
        let header_row = headers.iter().map(|h| Cell::from(*h)).collect();
        Self {
            name,
            widths: widths.to_vec(),
            rows: vec![(Style::Header, header_row)],
        }
    }

    fn push(&mut self, style: Style, cells: Vec<Cell>) {
        self.rows.push((style, cells));
    }

    fn to_xml(&self) -> String {
        let mut xml = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetViews><sheetView workbookViewId="0"><pane ySplit="1" topLeftCell="A2" activePane="bottomLeft" state="frozen"/></sheetView></sheetViews>"#,
        );

        if !self.widths.is_empty() {
            xml.push_str("<cols>");
            for (i, width) in self.widths.iter().enumerate() {
                xml.push_str(&format!(
                    r#"<col min="{n}" max="{n}" width="{width}" customWidth="1"/>"#,
                    n = i + 1
                ));
            }
            xml.push_str("</cols>");
        }

        xml.push_str("<sheetData>");
        for (r, (style, cells)) in self.rows.iter().enumerate() {
            let row_number = r + 1;
            xml.push_str(&format!(r#"<row r="{}">"#, row_number));
            for (c, cell) in cells.iter().enumerate() {
                let reference = format!("{}{}", column_letter(c), row_number);
                let s = *style as u8;
                match cell {
                    Cell::Empty if *style == Style::Normal => {}
                    Cell::Empty => {
                        xml.push_str(&format!(r#"<c r="{}" s="{}"/>"#, reference, s));
                    }
                    Cell::Text(text) => xml.push_str(&format!(
                        r#"<c r="{}" s="{}" t="inlineStr"><is><t xml:space="preserve">{}</t></is></c>"#,
                        reference,
                        s,
                        escape(text.as_str())
                    )),
                    Cell::Number(n) => xml.push_str(&format!(
                        r#"<c r="{}" s="{}"><v>{}</v></c>"#,
                        reference, s, n
                    )),
                }
            }
            xml.push_str("</row>");
        }
        xml.push_str("</sheetData></worksheet>");
        xml
    }
}

/// Spreadsheet column name for a zero-based index: 0 → A, 25 → Z, 26 → AA.
fn column_letter(mut index: usize) -> String {
    let mut letters = Vec::new();
    loop {
        letters.push((b'A' + (index % 26) as u8) as char);
        if index < 26 {
            break;
        }
        index = index / 26 - 1;
    }
    letters.iter().rev().collect()
}

const STYLES_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="2"><font><sz val="10"/><name val="Arial"/></font><font><b/><sz val="10"/><name val="Arial"/></font></fonts><fills count="5"><fill><patternFill patternType="none"/></fill><fill><patternFill patternType="gray125"/></fill><fill><patternFill patternType="solid"><fgColor rgb="FFD3D3D3"/><bgColor indexed="64"/></patternFill></fill><fill><patternFill patternType="solid"><fgColor rgb="FFFFE6E6"/><bgColor indexed="64"/></patternFill></fill><fill><patternFill patternType="solid"><fgColor rgb="FFFFFFCC"/><bgColor indexed="64"/></patternFill></fill></fills><borders count="1"><border><left/><right/><top/><bottom/><diagonal/></border></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="4"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="0" fontId="1" fillId="2" borderId="0" xfId="0" applyFont="1" applyFill="1" applyAlignment="1"><alignment horizontal="center" vertical="center" wrapText="1"/></xf><xf numFmtId="0" fontId="0" fillId="3" borderId="0" xfId="0" applyFill="1"/><xf numFmtId="0" fontId="1" fillId="4" borderId="0" xfId="0" applyFont="1" applyFill="1"/></cellXfs><cellStyles count="1"><cellStyle name="Normal" xfId="0" builtinId="0"/></cellStyles></styleSheet>"#;

const ROOT_RELS_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#;

fn write_package(sheets: &[Sheet]) -> Result<Vec<u8>, RenderError> {
    let mut content_types = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Override PartName="/xl/workbook.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#,
    );
    let mut workbook = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
    );
    let mut workbook_rels = String::from(
        r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
    );

    for (i, sheet) in sheets.iter().enumerate() {
        let n = i + 1;
        content_types.push_str(&format!(
            r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
        ));
        workbook.push_str(&format!(
            r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
            escape(sheet.name)
        ));
        workbook_rels.push_str(&format!(
            r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
        ));
    }
    content_types.push_str("</Types>");
    workbook.push_str("</sheets></workbook>");
    workbook_rels.push_str(&format!(
        r#"<Relationship Id="rId{}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/></Relationships>"#,
        sheets.len() + 1
    ));

    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    let mut add = |name: &str, body: &str| -> Result<(), RenderError> {
        zip.start_file(name, options)?;
        zip.write_all(body.as_bytes())?;
        Ok(())
    };
    add("[Content_Types].xml", &content_types)?;
    add("_rels/.rels", ROOT_RELS_XML)?;
    add("xl/workbook.xml", &workbook)?;
    add("xl/_rels/workbook.xml.rels", &workbook_rels)?;
    add("xl/styles.xml", STYLES_XML)?;
    for (i, sheet) in sheets.iter().enumerate() {
        add(&format!("xl/worksheets/sheet{}.xml", i + 1), &sheet.to_xml())?;
    }

    Ok(zip.finish()?.into_inner())
}

/// Works and materials list: everything, then works only, then materials only.
pub fn list_workbook(items: &[LineItem]) -> Result<Vec<u8>, RenderError> {
    let mut all = Sheet::new(
        SHEET_ALL,
        &["№ п/п", "Работа/Материал", "Наименование", "Ед. изм.", "Кол-во", "Примечание"],
        &[8.0, 18.0, 40.0, 12.0, 12.0, 30.0],
    );
    for (idx, item) in items.iter().enumerate() {
        all.push(
            Style::Normal,
            vec![
                Cell::Number((idx + 1) as f64),
                Cell::from(item.kind.label()),
                Cell::from(item.name.as_str()),
                Cell::from(item.unit.as_str()),
                Cell::from(item.quantity),
                Cell::from(item.note.as_deref().unwrap_or("")),
            ],
        );
    }

    let split = |name: &'static str, want_work: bool| {
        let mut sheet = Sheet::new(
            name,
            &["№ п/п", "Наименование", "Ед. изм.", "Кол-во"],
            &[8.0, 45.0, 12.0, 12.0],
        );
        let selected = items.iter().filter(|i| is_selected(&i.kind, want_work));
        for (idx, item) in selected.enumerate() {
            sheet.push(
                Style::Normal,
                vec![
                    Cell::Number((idx + 1) as f64),
                    Cell::from(item.name.as_str()),
                    Cell::from(item.unit.as_str()),
                    Cell::from(item.quantity),
                ],
            );
        }
        sheet
    };

    let works = split(SHEET_WORKS, true);
    let materials = split(SHEET_MATERIALS, false);
    write_package(&[all, works, materials])
}

fn is_selected(kind: &crate::results::ItemKind, want_work: bool) -> bool {
    use crate::results::ItemKind;
    match kind {
        ItemKind::Work => want_work,
        ItemKind::Material => !want_work,
        _ => false,
    }
}

/// Priced estimate with line costs and totals rows; unpriced rows highlighted.
pub fn estimate_workbook(items: &[EstimateItem], vat_rate: f64) -> Result<Vec<u8>, RenderError> {
    let vat_label = format!("НДС {}%", (vat_rate * 100.0).round());

    let mut all = Sheet::new(
        SHEET_ALL,
        &[
            "№ п/п",
            "Работа/Материал",
            "Наименование",
            "Ед. изм.",
            "Кол-во",
            "Цена за ед. (Работа)",
            "Стоимость (Работа), руб.",
            "Цена за ед. (Материал)",
            "Стоимость (Материал), руб.",
            "Наименование в прайсе",
            "Примечание",
        ],
        &[6.0, 12.0, 25.0, 10.0, 8.0, 12.0, 15.0, 12.0, 15.0, 25.0, 20.0],
    );
    for (idx, entry) in items.iter().enumerate() {
        let item = &entry.item;
        let (work_price, work_cost, material_price, material_cost) = if item.kind.is_work() {
            (entry.price_work_per_unit, entry.line_cost(), None, None)
        } else {
            (None, None, entry.price_material_per_unit, entry.line_cost())
        };
        all.push(
            row_style(entry),
            vec![
                Cell::Number((idx + 1) as f64),
                Cell::from(item.kind.label()),
                Cell::from(item.name.as_str()),
                Cell::from(item.unit.as_str()),
                Cell::from(item.quantity),
                Cell::from(work_price),
                Cell::from(work_cost),
                Cell::from(material_price),
                Cell::from(material_cost),
                Cell::from(entry.name_in_pricelist.as_deref().unwrap_or("")),
                Cell::from(item.note.as_deref().unwrap_or("")),
            ],
        );
    }
    let totals = EstimateTotals::compute(items, vat_rate);
    let works_part = EstimateTotals::compute(
        &items.iter().filter(|e| e.item.kind.is_work()).cloned().collect::<Vec<_>>(),
        vat_rate,
    );
    let materials_part = EstimateTotals::compute(
        &items.iter().filter(|e| !e.item.kind.is_work()).cloned().collect::<Vec<_>>(),
        vat_rate,
    );
    let totals_row = |label: &str, works: f64, materials: f64, grand: f64| {
        let mut cells = vec![Cell::from(label)];
        cells.extend((1..6).map(|_| Cell::Empty));
        cells.push(Cell::Number(works));
        cells.push(Cell::Empty);
        cells.push(Cell::Number(materials));
        cells.push(Cell::Empty);
        cells.push(Cell::Number(grand));
        cells
    };
    all.push(
        Style::Total,
        totals_row("ИТОГО БЕЗ НДС", works_part.without_vat, materials_part.without_vat, totals.without_vat),
    );
    all.push(
        Style::Total,
        totals_row(&vat_label, works_part.vat, materials_part.vat, totals.vat),
    );
    all.push(
        Style::Total,
        totals_row("ИТОГО С НДС", works_part.with_vat, materials_part.with_vat, totals.with_vat),
    );

    let split = |name: &'static str, want_work: bool| {
        let mut sheet = Sheet::new(
            name,
            &[
                "№ п/п",
                "Наименование",
                "Ед. изм.",
                "Кол-во",
                "Цена за ед.",
                "Стоимость, руб.",
                "Наименование в прайсе",
                "Примечание",
            ],
            &[6.0, 40.0, 10.0, 8.0, 12.0, 15.0, 25.0, 20.0],
        );
        let selected: Vec<EstimateItem> = items
            .iter()
            .filter(|e| is_selected(&e.item.kind, want_work))
            .cloned()
            .collect();
        for (idx, entry) in selected.iter().enumerate() {
            sheet.push(
                row_style(entry),
                vec![
                    Cell::Number((idx + 1) as f64),
                    Cell::from(entry.item.name.as_str()),
                    Cell::from(entry.item.unit.as_str()),
                    Cell::from(entry.item.quantity),
                    Cell::from(entry.unit_price()),
                    Cell::from(entry.line_cost()),
                    Cell::from(entry.name_in_pricelist.as_deref().unwrap_or("")),
                    Cell::from(entry.item.note.as_deref().unwrap_or("")),
                ],
            );
        }
        let part = EstimateTotals::compute(&selected, vat_rate);
        for (label, value) in [
            ("ИТОГО БЕЗ НДС", part.without_vat),
            (vat_label.as_str(), part.vat),
            ("ИТОГО С НДС", part.with_vat),
        ] {
            let mut cells = vec![Cell::from(label)];
            cells.extend((1..5).map(|_| Cell::Empty));
            cells.push(Cell::Number(value));
            sheet.push(Style::Total, cells);
        }
        sheet
    };

    let works = split(SHEET_WORKS, true);
    let materials = split(SHEET_MATERIALS, false);
    write_package(&[all, works, materials])
}

/// One reference price line: name, unit and one price per supplier column.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub name: String,
    pub unit: String,
    pub prices: Vec<f64>,
}

/// Single-sheet price list in the layout the catalog reader expects.
pub fn price_list_workbook(
    sheet_name: &'static str,
    headers: &[&str],
    rows: &[PriceRow],
) -> Result<Vec<u8>, RenderError> {
    let widths: Vec<f64> = headers
        .iter()
        .enumerate()
        .map(|(i, _)| match i {
            0 => 35.0,
            1 => 12.0,
            _ => 15.0,
        })
        .collect();

    let mut sheet = Sheet::new(sheet_name, headers, &widths);
    for row in rows {
        let mut cells = vec![Cell::from(row.name.as_str()), Cell::from(row.unit.as_str())];
        cells.extend(row.prices.iter().map(|p| Cell::Number(*p)));
        sheet.push(Style::Normal, cells);
    }
    write_package(&[sheet])
}

fn row_style(entry: &EstimateItem) -> Style {
    if entry.unit_price().is_some() {
        Style::Normal
    } else {
        Style::Unpriced
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::ItemKind;
    use calamine::{Data, Reader, Xlsx};

    fn item(kind: ItemKind, name: &str, qty: Option<f64>) -> LineItem {
        LineItem {
            kind,
            name: name.to_string(),
            unit: "м2".to_string(),
            quantity: qty,
            note: None,
        }
    }

    fn open(bytes: Vec<u8>) -> Xlsx<Cursor<Vec<u8>>> {
        Xlsx::new(Cursor::new(bytes)).unwrap()
    }

    fn sheet_rows(workbook: &mut Xlsx<Cursor<Vec<u8>>>, name: &str) -> Vec<Vec<Data>> {
        let range = workbook.worksheet_range(name).unwrap();
        range.rows().map(|r| r.to_vec()).collect()
    }

    #[test]
    fn test_column_letters() {
        assert_eq!(column_letter(0), "A");
        assert_eq!(column_letter(10), "K");
        assert_eq!(column_letter(25), "Z");
        assert_eq!(column_letter(26), "AA");
        assert_eq!(column_letter(27), "AB");
        assert_eq!(column_letter(701), "ZZ");
        assert_eq!(column_letter(702), "AAA");
    }

    // ── List workbook ──

    #[test]
    fn test_list_workbook_sheets_and_rows() {
        let items = vec![
            item(ItemKind::Work, "Штукатурка", Some(120.0)),
            item(ItemKind::Material, "Смесь <М150> & вода", Some(40.5)),
            item(ItemKind::Work, "Грунтовка", None),
        ];

        let mut workbook = open(list_workbook(&items).unwrap());
        assert_eq!(
            workbook.sheet_names(),
            vec![SHEET_ALL.to_string(), SHEET_WORKS.to_string(), SHEET_MATERIALS.to_string()]
        );

        let all = sheet_rows(&mut workbook, SHEET_ALL);
        assert_eq!(all.len(), 4);
        assert_eq!(all[0][2], Data::String("Наименование".into()));
        assert_eq!(all[1][1], Data::String("Работа".into()));
        assert_eq!(all[2][2], Data::String("Смесь <М150> & вода".into()));
        assert_eq!(all[2][4], Data::Float(40.5));

        let works = sheet_rows(&mut workbook, SHEET_WORKS);
        assert_eq!(works.len(), 3);
        assert_eq!(works[2][1], Data::String("Грунтовка".into()));

        let materials = sheet_rows(&mut workbook, SHEET_MATERIALS);
        assert_eq!(materials.len(), 2);
    }

    #[test]
    fn test_empty_list_still_has_headers() {
        let mut workbook = open(list_workbook(&[]).unwrap());
        let all = sheet_rows(&mut workbook, SHEET_ALL);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0][0], Data::String("№ п/п".into()));
    }

    #[test]
    fn test_list_sheet_freezes_header() {
        let items = vec![item(ItemKind::Work, "Кладка", Some(1.0))];
        let bytes = list_workbook(&items).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut sheet = String::new();
        std::io::Read::read_to_string(
            &mut archive.by_name("xl/worksheets/sheet1.xml").unwrap(),
            &mut sheet,
        )
        .unwrap();
        assert!(sheet.contains(r#"state="frozen""#));
        assert!(sheet.contains(r#"<c r="A1" s="1""#));
    }

    // ── Estimate workbook ──

    fn priced(kind: ItemKind, name: &str, qty: f64, work: Option<f64>, material: Option<f64>) -> EstimateItem {
        EstimateItem {
            item: item(kind, name, Some(qty)),
            price_work_per_unit: work,
            price_material_per_unit: material,
            name_in_pricelist: Some(format!("{} (прайс)", name)),
        }
    }

    #[test]
    fn test_estimate_workbook_costs_and_totals() {
        let items = vec![
            priced(ItemKind::Work, "Кладка", 10.0, Some(500.0), None),
            priced(ItemKind::Material, "Кирпич", 4.0, None, Some(250.0)),
            priced(ItemKind::Material, "Раствор", 2.0, None, None),
        ];

        let mut workbook = open(estimate_workbook(&items, 0.22).unwrap());
        let all = sheet_rows(&mut workbook, SHEET_ALL);

        assert_eq!(all.len(), 1 + 3 + 3);
        assert_eq!(all[1][6], Data::Float(5000.0));
        assert_eq!(all[2][8], Data::Float(1000.0));
        assert_eq!(all[3][8], Data::Empty);

        let without_vat = &all[4];
        assert_eq!(without_vat[0], Data::String("ИТОГО БЕЗ НДС".into()));
        assert_eq!(without_vat[6], Data::Float(5000.0));
        assert_eq!(without_vat[8], Data::Float(1000.0));
        assert_eq!(without_vat[10], Data::Float(6000.0));

        assert_eq!(all[5][0], Data::String("НДС 22%".into()));
        assert_eq!(all[5][10], Data::Float(1320.0));
        assert_eq!(all[6][0], Data::String("ИТОГО С НДС".into()));
        assert_eq!(all[6][10], Data::Float(7320.0));

        let materials = sheet_rows(&mut workbook, SHEET_MATERIALS);
        assert_eq!(materials.len(), 1 + 2 + 3);
        assert_eq!(materials[3][5], Data::Float(1000.0));
    }

    #[test]
    fn test_unpriced_rows_are_highlighted() {
        let items = vec![
            priced(ItemKind::Work, "Есть цена", 1.0, Some(10.0), None),
            priced(ItemKind::Work, "Нет цены", 1.0, None, None),
        ];
        let bytes = estimate_workbook(&items, 0.22).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut sheet = String::new();
        std::io::Read::read_to_string(
            &mut archive.by_name("xl/worksheets/sheet1.xml").unwrap(),
            &mut sheet,
        )
        .unwrap();

        assert!(sheet.contains(r#"<c r="A2" s="0">"#));
        assert!(sheet.contains(r#"<c r="A3" s="2">"#));
        assert!(sheet.contains(r#"<c r="A4" s="3""#));
    }

    #[test]
    fn test_price_list_workbook() {
        let rows = vec![PriceRow {
            name: "Укладка ламината".to_string(),
            unit: "м²".to_string(),
            prices: vec![400.0, 450.0],
        }];
        let mut workbook = open(
            price_list_workbook("Прайс на работы", &["Наименование", "Ед. изм.", "П1", "П2"], &rows)
                .unwrap(),
        );

        assert_eq!(workbook.sheet_names(), vec!["Прайс на работы".to_string()]);
        let sheet = sheet_rows(&mut workbook, "Прайс на работы");
        assert_eq!(sheet.len(), 2);
        assert_eq!(sheet[1][0], Data::String("Укладка ламината".into()));
        assert_eq!(sheet[1][3], Data::Float(450.0));
    }

    #[test]
    fn test_written_workbook_reads_as_catalog() {
        let items = vec![item(ItemKind::Work, "Стяжка", Some(45.0))];
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("price_works.xlsx");
        std::fs::write(&path, list_workbook(&items).unwrap()).unwrap();

        let text = crate::catalog::read_catalog(&path, 100, 3000);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("№ п/п | Работа/Материал | Наименование"));
        assert!(lines[1].contains("Стяжка | м2 | 45"));

        let truncated = crate::catalog::read_catalog(&path, 1, 5);
        assert_eq!(truncated, "№ п/п");
    }
}
