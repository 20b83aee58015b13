use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::json;
use survey_flow::{
    CompletionPayload, Direction, FlowError, HeadlessShell, JsonFileSink, MemorySlot, Navigation,
    PageDescriptor, Paginator, PaginatorOptions, ResponseSink, SurveyDocument,
};

const DOCUMENT: &str = r#"{
  "id": "onboarding",
  "title": "Onboarding",
  "direction": "rtl",
  "options": {
    "showProgress": false,
    "storageKey": "onboarding-progress",
    "storageVersion": "v3",
    "defaultErrorMessage": "Almost there"
  },
  "order": ["details", "welcome"],
  "pages": [
    {"type": "text", "id": "welcome", "props": {"title": "Hi", "body": "Welcome aboard"}},
    {"type": "questions", "id": "details", "paramKey": "team",
     "parameters": {"name": "core"},
     "props": {"questions": [{"id": "role", "type": "text", "required": true}]}}
  ]
}"#;

#[test]
fn document_options_flow_into_the_engine() {
    let document = SurveyDocument::from_json(DOCUMENT).unwrap();
    assert_eq!(document.page_keys(), vec!["details", "welcome"]);
    assert_eq!(
        document.pages[0].signature.as_deref(),
        Some(r#"team:{"name":"core"}"#)
    );

    let options = PaginatorOptions::from_document(&document);
    assert!(!options.show_progress);
    assert_eq!(options.storage_key.as_deref(), Some("onboarding-progress"));
    assert_eq!(options.storage_version, "v3");
    assert_eq!(options.default_error_message, "Almost there");
    assert_eq!(options.direction, Some(Direction::Rtl));
    assert!(options.resume_from_storage);
}

#[test]
fn malformed_documents_are_rejected() {
    assert!(matches!(
        SurveyDocument::from_json("{"),
        Err(FlowError::Json(_))
    ));
    let missing = std::path::Path::new("/definitely/not/here.json");
    assert!(matches!(
        SurveyDocument::load(missing),
        Err(FlowError::Read { .. })
    ));
}

#[tokio::test]
async fn document_run_produces_parameterized_payload() {
    let document = SurveyDocument::from_json(DOCUMENT).unwrap();
    let captured = Arc::new(Mutex::new(None));
    let sink = captured.clone();
    let options = PaginatorOptions {
        on_complete: Some(Arc::new(move |payload: &CompletionPayload| {
            *sink.lock().unwrap() = Some(payload.clone());
        })),
        ..PaginatorOptions::from_document(&document)
    };
    let shell = Arc::new(HeadlessShell::new());
    let paginator = Paginator::builder(document.pages.clone())
        .shell(shell.clone())
        .slot(Arc::new(MemorySlot::new()))
        .options(options)
        .build()
        .unwrap();

    paginator.start().await;
    assert_eq!(shell.direction(), Some(Direction::Rtl));
    assert!(shell.progress().is_none());
    let role = shell.mount().input("role").unwrap();
    role.field.set_value(Some(json!("Engineer")));
    assert_eq!(
        paginator.next().await,
        Navigation::Moved { from: 0, to: 1 }
    );
    assert_eq!(paginator.next().await, Navigation::Completed);

    let payload = captured.lock().unwrap().clone().unwrap();
    assert_eq!(payload.data_by_id["details"]["submission"], json!({"role": "Engineer"}));
    assert!(!payload.data_by_id.contains_key("welcome"));
    let meta = &payload.page_parameters["details"];
    assert_eq!(meta.param_key.as_deref(), Some("team"));
    assert_eq!(payload.page_parameters.len(), 1);
    assert_eq!(payload.descriptors[1].id.as_deref(), Some("welcome"));
}

#[test]
fn json_file_sink_appends_entries() {
    let dir = tempfile::tempdir().unwrap();
    let sink = JsonFileSink::new(dir.path().join("responses").join("survey.json"));
    let payload = CompletionPayload {
        descriptors: vec![PageDescriptor::new("text").with_id("intro")],
        data_by_id: BTreeMap::from([("intro".to_string(), json!({"seen": true}))]),
        page_durations_ms: BTreeMap::from([("intro".to_string(), 10)]),
        page_parameters: BTreeMap::new(),
    };

    assert!(sink.entries().unwrap().is_empty());
    sink.submit(&payload).unwrap();
    sink.submit(&payload).unwrap();

    let entries = sink.entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[1]["dataById"]["intro"]["seen"], true);
    let raw = std::fs::read_to_string(sink.path()).unwrap();
    assert!(raw.starts_with("[\n"));
}

#[test]
fn json_file_sink_refuses_non_array_storage() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("survey.json");
    std::fs::write(&path, "{}").unwrap();
    let sink = JsonFileSink::new(&path);
    let payload = CompletionPayload {
        descriptors: Vec::new(),
        data_by_id: BTreeMap::new(),
        page_durations_ms: BTreeMap::new(),
        page_parameters: BTreeMap::new(),
    };
    let err = sink.submit(&payload).unwrap_err();
    assert!(err.to_string().contains("not a JSON array"));
}
