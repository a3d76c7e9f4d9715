//! Recovery of the JSON payload from free-form model output.
//!
//! Responses often wrap the payload in prose ("Here is the list: [...] Let me
//! know if..."). The extractor starts at the earliest `[` or `{`, walks the
//! text tracking string literals and escapes, and returns the first balanced
//! span. Brackets inside strings never count.

use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("no JSON array or object found in response")]
    NotFound,

    #[error("unbalanced JSON starting at byte {start}")]
    Unbalanced { start: usize },

    #[error("mismatched '{found}' at byte {position}, expected '{expected}'")]
    Mismatched {
        position: usize,
        found: char,
        expected: char,
    },

    #[error("extracted JSON does not match the expected shape: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Returns the first balanced bracketed region of `text`.
pub fn extract_json_span(text: &str) -> Result<&str, ExtractError> {
    let start = text.find(['[', '{']).ok_or(ExtractError::NotFound)?;

    let mut expected: Vec<char> = Vec::new();
    let mut in_string = false;
    let mut escape_next = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escape_next {
                escape_next = false;
            } else if c == '\\' {
                escape_next = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }

        match c {
            '"' => in_string = true,
            '[' => expected.push(']'),
            '{' => expected.push('}'),
            ']' | '}' => {
                let position = start + offset;
                match expected.pop() {
                    Some(closer) if closer == c => {
                        if expected.is_empty() {
                            return Ok(&text[start..position + 1]);
                        }
                    }
                    Some(closer) => {
                        return Err(ExtractError::Mismatched {
                            position,
                            found: c,
                            expected: closer,
                        });
                    }
                    None => return Err(ExtractError::Unbalanced { start }),
                }
            }
            _ => {}
        }
    }

    Err(ExtractError::Unbalanced { start })
}

/// Extracts the first balanced region and deserializes it into `T`.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T, ExtractError> {
    let span = extract_json_span(text)?;
    Ok(serde_json::from_str(span)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    // ── Happy paths ──

    #[test]
    fn test_bare_array() {
        assert_eq!(extract_json_span("[1, 2, 3]").unwrap(), "[1, 2, 3]");
    }

    #[test]
    fn test_bare_object() {
        assert_eq!(extract_json_span(r#"{"a": 1}"#).unwrap(), r#"{"a": 1}"#);
    }

    #[test]
    fn test_leading_prose_is_discarded() {
        let response = "Вот перечень работ:\n[{\"name\": \"Кладка\"}]";
        assert_eq!(extract_json_span(response).unwrap(), "[{\"name\": \"Кладка\"}]");
    }

    #[test]
    fn test_trailing_commentary_is_discarded() {
        let response = "[{\"a\": 1}]\n\nЕсли нужно, уточню объёмы [по запросу].";
        assert_eq!(extract_json_span(response).unwrap(), "[{\"a\": 1}]");
    }

    #[test]
    fn test_earliest_opening_bracket_wins() {
        let response = r#"Result: {"items": [1, 2]} and [3]"#;
        assert_eq!(extract_json_span(response).unwrap(), r#"{"items": [1, 2]}"#);

        let response = r#"[{"a": 1}, {"b": 2}]"#;
        assert_eq!(extract_json_span(response).unwrap(), response);
    }

    #[test]
    fn test_nested_structures() {
        let response = r#"x {"a": [{"b": [[], {}]}], "c": {"d": []}} y"#;
        assert_eq!(
            extract_json_span(response).unwrap(),
            r#"{"a": [{"b": [[], {}]}], "c": {"d": []}}"#
        );
    }

    #[test]
    fn test_brackets_inside_strings_are_ignored() {
        let response = r#"[{"name": "Труба ]} [ 50 мм", "note": "{не скобка"}]"#;
        assert_eq!(extract_json_span(response).unwrap(), response);
    }

    #[test]
    fn test_escaped_quotes_inside_strings() {
        let response = r#"[{"name": "Дверь \"Премиум]\"", "unit": "шт"}] tail"#;
        let span = extract_json_span(response).unwrap();
        assert!(span.ends_with("\"шт\"}]"));
        let value: Value = serde_json::from_str(span).unwrap();
        assert_eq!(value[0]["name"], "Дверь \"Премиум]\"");
    }

    #[test]
    fn test_escaped_backslash_before_quote() {
        let response = r#"["C:\\path\\", "]"]"#;
        assert_eq!(extract_json_span(response).unwrap(), response);
    }

    #[test]
    fn test_fenced_code_block() {
        let response = "```json\n[{\"a\": 1}]\n```";
        assert_eq!(extract_json_span(response).unwrap(), "[{\"a\": 1}]");
    }

    #[test]
    fn test_multibyte_text_before_and_inside() {
        let response = "Смета готова, итог: {\"итого\": \"100 ₽\"}. Конец";
        assert_eq!(extract_json_span(response).unwrap(), "{\"итого\": \"100 ₽\"}");
    }

    // ── Failures ──

    #[test]
    fn test_no_brackets() {
        assert!(matches!(
            extract_json_span("Не удалось составить перечень."),
            Err(ExtractError::NotFound)
        ));
        assert!(matches!(extract_json_span(""), Err(ExtractError::NotFound)));
    }

    #[test]
    fn test_unterminated_array() {
        assert!(matches!(
            extract_json_span("Here: [{\"a\": 1}, {\"b\": 2}"),
            Err(ExtractError::Unbalanced { start: 6 })
        ));
    }

    #[test]
    fn test_unterminated_string() {
        assert!(matches!(
            extract_json_span(r#"[{"a": "never closed]}"#),
            Err(ExtractError::Unbalanced { .. })
        ));
    }

    #[test]
    fn test_mismatched_closer() {
        match extract_json_span(r#"[{"a": 1]]"#) {
            Err(ExtractError::Mismatched {
                found, expected, ..
            }) => {
                assert_eq!(found, ']');
                assert_eq!(expected, '}');
            }
            other => panic!("Expected Mismatched, got {:?}", other),
        }
    }

    #[test]
    fn test_closer_before_opener_is_ignored() {
        assert_eq!(extract_json_span("] ) } [1]").unwrap(), "[1]");
    }

    // ── parse_json ──

    #[test]
    fn test_parse_json_typed() {
        let items: Vec<Value> = parse_json("Ответ:\n[{\"a\": 1}, {\"a\": 2}]").unwrap();
        assert_eq!(items, vec![json!({"a": 1}), json!({"a": 2})]);
    }

    #[test]
    fn test_parse_json_balanced_but_invalid() {
        let result: Result<Value, _> = parse_json("[1, 2,]");
        assert!(matches!(result, Err(ExtractError::Parse(_))));

        let result: Result<Value, _> = parse_json("{name: 'x'}");
        assert!(matches!(result, Err(ExtractError::Parse(_))));
    }

    #[test]
    fn test_parse_json_wrong_shape() {
        let result: Result<Vec<Value>, _> = parse_json(r#"{"not": "an array"}"#);
        assert!(matches!(result, Err(ExtractError::Parse(_))));
    }
}
