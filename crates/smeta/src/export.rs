//! CSV export of the request history.

use std::borrow::Cow;

use crate::store::RequestView;

pub const HISTORY_CSV_NAME: &str = "history.csv";

const HEADER: [&str; 7] = [
    "ID",
    "Дата",
    "Тип ввода",
    "Файлы",
    "Результаты",
    "Статус",
    "Ошибка",
];

/// One row per request in the given order, RFC 4180 quoting, CRLF line ends.
pub fn history_csv(requests: &[RequestView]) -> String {
    let mut out = String::new();
    push_record(&mut out, HEADER.iter().map(|h| Cow::Borrowed(*h)));

    for request in requests {
        let files = request
            .inputs
            .iter()
            .map(|i| i.name.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        let outputs = request
            .requested_outputs
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");

        push_record(
            &mut out,
            [
                Cow::Borrowed(request.request_id.as_str()),
                Cow::Owned(request.created_at.format("%Y-%m-%d %H:%M:%S").to_string()),
                Cow::Borrowed(request.input_type.as_str()),
                Cow::Owned(files),
                Cow::Owned(outputs),
                Cow::Borrowed(request.status.as_str()),
                Cow::Borrowed(request.error_message.as_deref().unwrap_or("")),
            ]
            .into_iter(),
        );
    }
    out
}

fn push_record<'a>(out: &mut String, fields: impl Iterator<Item = Cow<'a, str>>) {
    for (i, field) in fields.enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&quote(&field));
    }
    out.push_str("\r\n");
}

fn quote(field: &str) -> Cow<'_, str> {
    if field.contains([',', '"', '\r', '\n']) {
        Cow::Owned(format!("\"{}\"", field.replace('"', "\"\"")))
    } else {
        Cow::Borrowed(field)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::Stage;
    use crate::store::{InputDescriptor, RequestStatus};
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;

    fn view(error: Option<&str>) -> RequestView {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 30, 5).unwrap();
        RequestView {
            request_id: "req-1".to_string(),
            status: RequestStatus::Error,
            input_type: "project".to_string(),
            inputs: vec![
                InputDescriptor {
                    name: "план.pdf".to_string(),
                    size: 10,
                    content_kind: "application/pdf".to_string(),
                },
                InputDescriptor {
                    name: "ведомость.xlsx".to_string(),
                    size: 20,
                    content_kind: "application/vnd.ms-excel".to_string(),
                },
            ],
            requested_outputs: vec![Stage::List, Stage::Estimate],
            annotation: None,
            current_stage: None,
            outputs: BTreeMap::new(),
            error_message: error.map(str::to_string),
            created_at: at,
            updated_at: at,
            completed_at: None,
        }
    }

    #[test]
    fn test_header_only_when_empty() {
        assert_eq!(
            history_csv(&[]),
            "ID,Дата,Тип ввода,Файлы,Результаты,Статус,Ошибка\r\n"
        );
    }

    #[test]
    fn test_row_layout_and_quoting() {
        let csv = history_csv(&[view(Some("Estimate stage failed: \"пусто\""))]);
        let row = csv.lines().nth(1).unwrap();

        assert_eq!(
            row,
            "req-1,2026-03-01 09:30:05,project,\"план.pdf, ведомость.xlsx\",\"list, estimate\",error,\"Estimate stage failed: \"\"пусто\"\"\""
        );
    }

    #[test]
    fn test_multiline_error_stays_one_record() {
        let csv = history_csv(&[view(Some("line one\nline two"))]);
        assert!(csv.contains("\"line one\nline two\"\r\n"));
        assert_eq!(csv.matches("\r\n").count(), 2);
    }
}
