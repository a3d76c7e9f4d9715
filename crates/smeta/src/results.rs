//! Structured stage results: line items, priced estimate rows, and the
//! comparison report.
//!
//! Model output is loosely typed: quantities arrive as numbers, numeric
//! strings with either decimal separator, or `null`, and labels may be
//! missing. Individual fields deserialize leniently; only a response of the
//! wrong overall shape fails.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

/// Whether a row is labour or a material. Unknown labels are kept verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "Option<String>", into = "String")]
pub enum ItemKind {
    Work,
    Material,
    #[default]
    Unspecified,
    Other(String),
}

impl ItemKind {
    pub fn label(&self) -> &str {
        match self {
            ItemKind::Work => "Работа",
            ItemKind::Material => "Материал",
            ItemKind::Unspecified => "",
            ItemKind::Other(label) => label,
        }
    }

    pub fn is_work(&self) -> bool {
        matches!(self, ItemKind::Work)
    }
}

impl From<Option<String>> for ItemKind {
    fn from(raw: Option<String>) -> Self {
        let Some(raw) = raw else {
            return ItemKind::Unspecified;
        };
        match raw.trim().to_lowercase().as_str() {
            "работа" | "работы" | "work" => ItemKind::Work,
            "материал" | "материалы" | "material" => ItemKind::Material,
            "" => ItemKind::Unspecified,
            _ => ItemKind::Other(raw.trim().to_string()),
        }
    }
}

impl From<ItemKind> for String {
    fn from(kind: ItemKind) -> Self {
        kind.label().to_string()
    }
}

/// One row of the works and materials list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "type", default)]
    pub kind: ItemKind,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub unit: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub quantity: Option<f64>,
    #[serde(
        default,
        deserialize_with = "lenient_opt_string",
        skip_serializing_if = "Option::is_none"
    )]
    pub note: Option<String>,
}

/// A list row with the prices the Estimate stage attached to it.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EstimateItem {
    #[serde(flatten)]
    pub item: LineItem,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price_work_per_unit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub price_material_per_unit: Option<f64>,
    #[serde(default, deserialize_with = "lenient_opt_string")]
    pub name_in_pricelist: Option<String>,
}

impl EstimateItem {
    /// Unit price that applies to this row: labour for work items,
    /// material price for everything else.
    pub fn unit_price(&self) -> Option<f64> {
        if self.item.kind.is_work() {
            self.price_work_per_unit
        } else {
            self.price_material_per_unit
        }
    }

    /// `quantity × unit_price`, or `None` when either is missing.
    pub fn line_cost(&self) -> Option<f64> {
        Some(self.item.quantity? * self.unit_price()?)
    }

    pub fn is_priced(&self) -> bool {
        self.line_cost().is_some()
    }
}

/// Money totals of an estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct EstimateTotals {
    pub works: f64,
    pub materials: f64,
    pub without_vat: f64,
    pub vat: f64,
    pub with_vat: f64,
    /// Rows that contributed nothing because a quantity or price was missing.
    pub unpriced: usize,
}

impl EstimateTotals {
    pub fn compute(items: &[EstimateItem], vat_rate: f64) -> Self {
        let mut totals = EstimateTotals::default();

        for entry in items {
            match entry.line_cost() {
                Some(cost) if entry.item.kind.is_work() => totals.works += cost,
                Some(cost) => totals.materials += cost,
                None => totals.unpriced += 1,
            }
        }

        totals.without_vat = round2(totals.works + totals.materials);
        totals.vat = round2(totals.without_vat * vat_rate);
        totals.with_vat = round2(totals.without_vat + totals.vat);
        totals
    }
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Output of the Comparison stage. Every field tolerates absence.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComparisonReport {
    #[serde(default)]
    pub missing_in_estimate: Vec<Discrepancy>,
    #[serde(default)]
    pub extra_in_estimate: Vec<Discrepancy>,
    #[serde(default)]
    pub quantity_discrepancies: Vec<Discrepancy>,
    #[serde(default)]
    pub unit_discrepancies: Vec<Discrepancy>,
    #[serde(default, deserialize_with = "lenient_strings")]
    pub critical_notes: Vec<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub compliance_pct: Option<f64>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub summary: String,
}

/// One finding of the comparison. The named fields cover the shapes the
/// prompt asks for; anything else the model adds is kept in `extra`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Discrepancy {
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_opt_string", skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

impl Discrepancy {
    /// `key: value` pairs of the extra fields, in key order, for rendering.
    pub fn details(&self) -> Vec<(String, String)> {
        let mut details: Vec<(String, String)> = self
            .extra
            .iter()
            .filter(|(_, v)| !v.is_null())
            .map(|(k, v)| (k.clone(), value_to_text(v)))
            .collect();
        details.sort();
        details
    }
}

/// Compliance verdict band of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComplianceBand {
    High,
    Medium,
    Low,
}

impl ComparisonReport {
    pub fn band(&self) -> ComplianceBand {
        match self.compliance_pct {
            Some(pct) if pct >= 85.0 => ComplianceBand::High,
            Some(pct) if pct >= 60.0 => ComplianceBand::Medium,
            _ => ComplianceBand::Low,
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn parse_number_text(text: &str) -> Option<f64> {
    let cleaned: String = text
        .trim()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '\u{a0}')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    cleaned.parse::<f64>().ok().filter(|n| n.is_finite())
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_number_text(&s),
        _ => None,
    })
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(lenient_opt_string(deserializer)?.unwrap_or_default())
}

fn lenient_opt_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(value_to_text(&other)),
    })
}

fn lenient_strings<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(match value {
        Value::Array(items) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(value_to_text)
            .collect(),
        Value::Null => Vec::new(),
        other => vec![value_to_text(&other)],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // ── LineItem ──

    #[test]
    fn test_line_item_from_model_output() {
        let items: Vec<LineItem> = serde_json::from_value(json!([
            {"type": "Работа", "name": "Штукатурка стен", "unit": "м2", "quantity": 120},
            {"type": "Материал", "name": "Смесь", "unit": "кг", "quantity": "1 250,5"},
            {"type": "work", "name": "Демонтаж", "unit": null, "quantity": null, "note": "уточнить"}
        ]))
        .unwrap();

        assert_eq!(items[0].kind, ItemKind::Work);
        assert_eq!(items[0].quantity, Some(120.0));
        assert_eq!(items[1].kind, ItemKind::Material);
        assert_eq!(items[1].quantity, Some(1250.5));
        assert_eq!(items[2].kind, ItemKind::Work);
        assert_eq!(items[2].unit, "");
        assert_eq!(items[2].quantity, None);
        assert_eq!(items[2].note.as_deref(), Some("уточнить"));
    }

    #[test]
    fn test_unknown_kind_is_kept() {
        let item: LineItem =
            serde_json::from_value(json!({"type": "Оборудование", "name": "Котёл"})).unwrap();
        assert_eq!(item.kind, ItemKind::Other("Оборудование".to_string()));
        assert_eq!(serde_json::to_value(&item).unwrap()["type"], "Оборудование");
    }

    #[test]
    fn test_missing_kind_and_garbage_quantity() {
        let item: LineItem =
            serde_json::from_value(json!({"name": "Что-то", "quantity": "по месту"})).unwrap();
        assert_eq!(item.kind, ItemKind::Unspecified);
        assert_eq!(item.quantity, None);
    }

    #[test]
    fn test_kind_serializes_russian_label() {
        let item = LineItem {
            kind: ItemKind::Material,
            name: "Плитка".into(),
            unit: "м2".into(),
            quantity: Some(30.0),
            note: None,
        };
        let value = serde_json::to_value(&item).unwrap();
        assert_eq!(value, json!({"type": "Материал", "name": "Плитка", "unit": "м2", "quantity": 30.0}));
    }

    #[test]
    fn test_wrong_shape_is_rejected() {
        assert!(serde_json::from_value::<Vec<LineItem>>(json!({"items": []})).is_err());
        assert!(serde_json::from_value::<Vec<LineItem>>(json!([1, 2])).is_err());
    }

    // ── EstimateTotals ──

    fn priced(kind: ItemKind, qty: Option<f64>, work: Option<f64>, material: Option<f64>) -> EstimateItem {
        EstimateItem {
            item: LineItem {
                kind,
                name: "x".into(),
                unit: "шт".into(),
                quantity: qty,
                note: None,
            },
            price_work_per_unit: work,
            price_material_per_unit: material,
            name_in_pricelist: None,
        }
    }

    #[test]
    fn test_totals_follow_item_kind() {
        let items = vec![
            priced(ItemKind::Work, Some(10.0), Some(500.0), Some(999.0)),
            priced(ItemKind::Material, Some(4.0), Some(999.0), Some(250.0)),
            priced(ItemKind::Other("Оборудование".into()), Some(1.0), None, Some(1000.0)),
        ];

        let totals = EstimateTotals::compute(&items, 0.22);
        assert_eq!(totals.works, 5000.0);
        assert_eq!(totals.materials, 2000.0);
        assert_eq!(totals.without_vat, 7000.0);
        assert_eq!(totals.vat, 1540.0);
        assert_eq!(totals.with_vat, 8540.0);
        assert_eq!(totals.unpriced, 0);
    }

    #[test]
    fn test_totals_count_unpriced_rows() {
        let items = vec![
            priced(ItemKind::Work, None, Some(500.0), None),
            priced(ItemKind::Material, Some(3.0), None, None),
            priced(ItemKind::Material, Some(3.0), None, Some(0.1)),
        ];

        let totals = EstimateTotals::compute(&items, 0.22);
        assert_eq!(totals.unpriced, 2);
        assert_eq!(totals.without_vat, 0.3);
        assert_eq!(totals.vat, 0.07);
        assert_eq!(totals.with_vat, 0.37);
    }

    #[test]
    fn test_estimate_item_flattened_fields() {
        let item: EstimateItem = serde_json::from_value(json!({
            "type": "Работа", "name": "Кладка", "unit": "м3", "quantity": 2,
            "price_work_per_unit": "3500", "price_material_per_unit": null,
            "name_in_pricelist": "Кладка кирпичная", "note": "без НДС"
        }))
        .unwrap();

        assert_eq!(item.item.name, "Кладка");
        assert_eq!(item.line_cost(), Some(7000.0));
        assert_eq!(item.name_in_pricelist.as_deref(), Some("Кладка кирпичная"));
        assert_eq!(item.item.note.as_deref(), Some("без НДС"));
    }

    #[test]
    fn test_round2() {
        assert_eq!(round2(1.005 * 1000.0), 1005.0);
        assert_eq!(round2(2.345678), 2.35);
    }

    // ── ComparisonReport ──

    #[test]
    fn test_comparison_report_defaults() {
        let report: ComparisonReport = serde_json::from_value(json!({"summary": "OK"})).unwrap();
        assert!(report.missing_in_estimate.is_empty());
        assert_eq!(report.compliance_pct, None);
        assert_eq!(report.band(), ComplianceBand::Low);
    }

    #[test]
    fn test_comparison_report_full() {
        let report: ComparisonReport = serde_json::from_value(json!({
            "missing_in_estimate": [{"name": "Гидроизоляция", "unit": "м2", "quantity": 40, "note": "нет в смете"}],
            "quantity_discrepancies": [{"name": "Плитка", "project_qty": 30, "estimate_qty": 25, "diff_pct": -16.7}],
            "critical_notes": ["Проверить объёмы", null],
            "compliance_pct": "87",
            "summary": "Смета в целом соответствует"
        }))
        .unwrap();

        assert_eq!(report.missing_in_estimate[0].name, "Гидроизоляция");
        assert_eq!(report.missing_in_estimate[0].note.as_deref(), Some("нет в смете"));
        assert_eq!(
            report.quantity_discrepancies[0].details(),
            vec![
                ("diff_pct".to_string(), "-16.7".to_string()),
                ("estimate_qty".to_string(), "25".to_string()),
                ("project_qty".to_string(), "30".to_string()),
            ]
        );
        assert_eq!(report.critical_notes, vec!["Проверить объёмы".to_string()]);
        assert_eq!(report.band(), ComplianceBand::High);
    }

    #[test]
    fn test_compliance_bands() {
        let with = |pct| ComparisonReport {
            compliance_pct: Some(pct),
            ..Default::default()
        };
        assert_eq!(with(85.0).band(), ComplianceBand::High);
        assert_eq!(with(84.9).band(), ComplianceBand::Medium);
        assert_eq!(with(60.0).band(), ComplianceBand::Medium);
        assert_eq!(with(59.0).band(), ComplianceBand::Low);
    }
}
