//! Stage prompts. The wording is Russian because the documents, the price
//! catalogs and the expected item labels are.

use std::fmt::Write;

use crate::processor::ParsedDocument;
use crate::results::LineItem;
use crate::sanitize::truncate_chars;

pub const NO_ANNOTATION: &str = "(нет комментария)";

/// Prompt for extracting the works and materials list.
pub fn list_prompt(documents: &[ParsedDocument], annotation: Option<&str>, excerpt_chars: usize) -> String {
    let mut files = String::new();
    for doc in documents {
        let _ = write!(files, "\n--- Файл: {} ---\n{}", doc.filename, doc.excerpt(excerpt_chars));
    }

    let annotation = annotation
        .map(str::trim)
        .filter(|a| !a.is_empty())
        .unwrap_or(NO_ANNOTATION);

    format!(
        r#"Ты — опытный инженер-сметчик в строительстве.
На основании предоставленных документов (ТЗ, проект, спецификации, смета) составь полный и структурированный Перечень работ и материалов.

Требования:
1. Выдели ВСЕ виды работ и материалов из документов.
2. Для каждой позиции укажи тип (Работа или Материал), наименование, единицу измерения и количество.
3. Используй стандартные единицы измерения (м², м³, м.п., шт., т, кг, компл.).
4. Если количество не указано явно, поставь null в поле quantity и добавь примечание в поле note.
5. Не дублируй позиции.
6. Если загружена смета ГрандСмета, извлеки позиции напрямую из неё, сохраняя наименования.
7. Если загружен проект со спецификацией, бери объёмы из спецификации в приоритете.

Документы:
{files}

Комментарий пользователя:
{annotation}

Формат ответа: JSON-массив вида
[
  {{"type": "Работа" или "Материал", "name": "Наименование", "unit": "Ед. изм.", "quantity": число или null, "note": "Примечание"}}
]

Возвращай ТОЛЬКО JSON-массив, без пояснений."#
    )
}

/// Prompt for pricing list items against the two catalogs.
pub fn estimate_prompt(items: &[LineItem], works_catalog: &str, materials_catalog: &str, vat_rate: f64) -> String {
    let list = serde_json::to_string_pretty(items).unwrap_or_else(|_| "[]".to_string());
    let vat_pct = (vat_rate * 100.0).round();

    format!(
        r#"Ты — снабженец и сметчик с опытом в строительстве. На основании перечня подготовь полную смету для закупки и бюджетирования.

Найди позиции работ и материалов в соответствующих прайсах и проставь цены из них. В поле name_in_pricelist укажи найденное наименование из прайса.

Для позиций, которых нет в прайсе, укажи рыночную цену:
- Регион: Россия, г. Екатеринбург (Свердловская область)
- Период цен: актуальный на дату выполнения
- Нормальные бренды и квалифицированные подрядчики, без демпинга и сомнительных аналогов

НДС показывай отдельно. Цены указывай без НДС, ставка НДС {vat_pct}%. Если подрядчик на УСН, отрази это в примечании.

Перечень:
{list}

Прайс на работы:
{works_catalog}

Прайс на материалы:
{materials_catalog}

Формат ответа: JSON-массив вида
[
  {{"type": "Работа" или "Материал", "name": "Наименование", "unit": "Ед. изм.", "quantity": число,
    "price_work_per_unit": число или null, "price_material_per_unit": число или null,
    "name_in_pricelist": "Наименование в прайсе или источник", "note": "Примечание"}}
]

Возвращай ТОЛЬКО JSON-массив, без пояснений."#
    )
}

/// Prompt comparing project documentation against an estimate or list.
///
/// Both sides are cut to `excerpt_chars` characters.
pub fn comparison_prompt(project: &str, estimate: &str, excerpt_chars: usize) -> String {
    let project = truncate_chars(project, excerpt_chars);
    let estimate = truncate_chars(estimate, excerpt_chars);

    format!(
        r#"Ты — опытный строительный эксперт и сметчик. Проведи сравнительный анализ проектной документации (спецификация, ТЗ) и сметы или перечня работ и материалов.

Задача:
1. Найди позиции, которые есть в проекте, но отсутствуют в смете.
2. Найди позиции, которые есть в смете, но не фигурируют в проекте.
3. Выяви расхождения в объёмах по совпадающим позициям, укажи разницу в процентах.
4. Выяви несоответствия единиц измерения.
5. Сформируй 5–10 критических замечаний.
6. Оцени, насколько смета соответствует проекту, в процентах.

Проект и спецификация:
{project}

Смета/Перечень:
{estimate}

Формат ответа: JSON-объект вида
{{
  "missing_in_estimate": [{{"name": "...", "unit": "...", "quantity": 0, "note": "..."}}],
  "extra_in_estimate": [{{"name": "...", "unit": "...", "quantity": 0, "note": "..."}}],
  "quantity_discrepancies": [{{"name": "...", "project_qty": 0, "estimate_qty": 0, "diff_pct": 0, "note": "..."}}],
  "unit_discrepancies": [{{"name": "...", "project_unit": "...", "estimate_unit": "...", "note": "..."}}],
  "critical_notes": ["..."],
  "compliance_pct": 85,
  "summary": "Общий вывод"
}}

Возвращай ТОЛЬКО JSON, без пояснений."#
    )
}
