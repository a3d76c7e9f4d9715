//! Intake, worker pool and restart reconciliation working together.

mod common;

use std::time::Duration;

use common::{ScriptedGenerator, TestHarness};
use smeta::store::RequestStatus;
use smeta::{Intake, Stage, Submission, UploadedFile, WorkerPool};

const LIST_RESPONSE: &str = r#"[{"type": "Работа", "name": "Демонтаж перегородок", "unit": "м2", "quantity": 36}]"#;

fn submission(outputs: &str) -> Submission {
    Submission {
        input_type: "project".to_string(),
        files: vec![UploadedFile {
            name: "C:\\Users\\prorab\\Проект_перепланировки.txt".to_string(),
            content_type: None,
            bytes: "Проектное решение: демонтаж перегородок 36 м2".as_bytes().to_vec(),
        }],
        requested_outputs: outputs.to_string(),
        annotation: Some("Квартира 12".to_string()),
    }
}

#[test]
fn submitted_request_runs_in_background() {
    let harness = TestHarness::new(ScriptedGenerator::new().respond(LIST_RESPONSE));
    let pool = WorkerPool::new(harness.pipeline(), 2).unwrap();
    let intake = Intake::new(harness.store.clone(), harness.scratch(), pool.queue());

    let accepted = intake.submit(submission(r#"["list"]"#)).unwrap();
    assert_eq!(accepted.status, RequestStatus::Pending);

    let result = pool
        .results()
        .recv_timeout(Duration::from_secs(10))
        .expect("job finished");
    assert_eq!(result.request_id, accepted.request_id);
    assert!(result.success, "{:?}", result.error);

    let view = harness.store.status(&accepted.request_id).unwrap().unwrap();
    assert_eq!(view.status, RequestStatus::Success);
    assert_eq!(view.inputs[0].name, "Проект_перепланировки.txt");
    assert_eq!(view.inputs[0].content_kind, "text/plain");
    assert_eq!(view.annotation.as_deref(), Some("Квартира 12"));
    assert!(view.completed_at.is_some());
    assert!(view.outputs.contains_key(&Stage::List));

    pool.shutdown();
    pool.wait();
}

#[test]
fn history_is_newest_first_without_transcripts() {
    let harness = TestHarness::new(
        ScriptedGenerator::new()
            .respond(LIST_RESPONSE)
            .respond(LIST_RESPONSE),
    );
    let first = harness.run(&[("проект.txt", "Проект: стены")], &[Stage::List]);
    let second = harness.run(&[("проект.txt", "Проект: полы")], &[Stage::List]);

    let history = harness.store.history(10).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0].request_id, second.request_id);
    assert_eq!(history[1].request_id, first.request_id);

    let json = serde_json::to_value(&history[0]).unwrap();
    assert!(json.get("last_prompt").is_none());
    assert_eq!(json["requested_outputs"], serde_json::json!(["list"]));
}

#[test]
fn restart_reconciliation_closes_open_requests() {
    let harness = TestHarness::new(ScriptedGenerator::new());

    let interrupted = harness.prepare(&[("проект.txt", "x")], &[Stage::List]);
    assert!(harness.store.begin_processing(&interrupted.request_id).unwrap());
    let abandoned = harness.prepare(&[("проект.txt", "y")], &[Stage::List]);

    let report = harness.store.reconcile_interrupted().unwrap();
    assert_eq!(report.interrupted, 1);
    assert_eq!(report.abandoned, 1);

    for (job, expected) in [
        (&interrupted, "Processing interrupted by service restart"),
        (&abandoned, "Request was not started before service shutdown"),
    ] {
        let view = harness.store.status(&job.request_id).unwrap().unwrap();
        assert_eq!(view.status, RequestStatus::Error);
        assert_eq!(view.error_message.as_deref(), Some(expected));

        let raw: Vec<RequestStatus> = harness
            .store
            .events(&job.request_id)
            .unwrap()
            .into_iter()
            .map(|e| e.status)
            .collect();
        assert_eq!(
            raw,
            vec![
                RequestStatus::Pending,
                RequestStatus::Processing,
                RequestStatus::Error
            ]
        );
    }

    // A job that outlived its record's pending state is skipped, not rerun.
    let result = harness.pipeline().run(abandoned);
    assert!(result.skipped);
    assert_eq!(harness.generator.call_count(), 0);
}
