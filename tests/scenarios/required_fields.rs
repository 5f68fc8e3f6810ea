//! Test: Required Fields - nothing is saved until required fields are filled

use crate::helpers::*;
use std::sync::Arc;
use stepform::{FieldIssue, FormError, FormEvent, FormState};

/// Test that a form with empty required fields never reaches the backend
#[tokio::test]
async fn test_missing_required_fields_block_save() {
    let backend = Arc::new(MockPersistence::new());
    let log = EventLog::default();
    let form = form_for(iotdb_graph(), backend.clone()).with_event_handler(log.handler());
    form.open().await.unwrap();

    let err = form.submit().await.unwrap_err();

    // Every missing field is reported at once
    match err {
        FormError::Validation(v) => {
            assert_eq!(v.field_names(), vec!["nodeUrls", "username", "password"]);
            assert_eq!(v.issue_for("password"), Some(&FieldIssue::Missing));
        }
        other => panic!("Expected validation error, got {:?}", other),
    }

    assert_eq!(backend.save_calls(), 0);
    assert_eq!(form.state().await, FormState::OpenWithErrors);
    assert_eq!(form.field_errors().await.len(), 3);
    assert_eq!(
        log.count(|e| matches!(e, FormEvent::ValidationFailed { .. })),
        1
    );
    assert_eq!(log.count(|e| matches!(e, FormEvent::SaveStarted { .. })), 0);
}

/// Test that whitespace does not count as a value
#[tokio::test]
async fn test_blank_text_is_missing() {
    let backend = Arc::new(MockPersistence::new());
    let form = form_for(iotdb_graph(), backend.clone());
    form.open().await.unwrap();

    form.set_field_text("nodeUrls", "   ").await.unwrap();
    form.set_field_text("username", "root").await.unwrap();
    form.set_field_text("password", "root").await.unwrap();

    let err = form.submit().await.unwrap_err();
    assert!(matches!(err, FormError::Validation(ref v) if v.field_names() == vec!["nodeUrls"]));
    assert_eq!(backend.save_calls(), 0);
}

/// Test that an emptied step title is reported like any required field
#[tokio::test]
async fn test_step_title_is_required() {
    let backend = Arc::new(MockPersistence::new());
    let form = form_for(iotdb_graph(), backend.clone());
    form.open().await.unwrap();

    form.set_field_text("nodeUrls", "127.0.0.1:6667").await.unwrap();
    form.set_field_text("username", "root").await.unwrap();
    form.set_field_text("password", "root").await.unwrap();
    form.clear_field("stepTitle").await.unwrap();

    let err = form.submit().await.unwrap_err();
    assert!(matches!(err, FormError::Validation(ref v) if v.field_names() == vec!["stepTitle"]));

    form.set_field_text("stepTitle", "x".repeat(121).as_str()).await.unwrap();
    let err = form.validate().await.unwrap_err();
    assert!(matches!(
        err,
        FormError::Validation(ref v)
            if v.issue_for("stepTitle") == Some(&FieldIssue::TooLong { max: 120, actual: 121 })
    ));
    assert_eq!(backend.save_calls(), 0);
}

/// Test that pattern rules are enforced on text fields
#[tokio::test]
async fn test_webhook_url_pattern() {
    let graph = stepform::JobGraph::from_json(
        r#"{"nodes":[{"id":"step1","displayName":"Notify","data":{"type":"sink","name":"WeChat","attrs":{"url":"ftp://hook"}}}]}"#,
    )
    .unwrap();
    let backend = Arc::new(MockPersistence::new());
    let form = form_for(graph, backend.clone());
    form.open().await.unwrap();

    let err = form.submit().await.unwrap_err();
    assert!(matches!(
        err,
        FormError::Validation(ref v) if matches!(v.issue_for("url"), Some(FieldIssue::PatternMismatch { .. }))
    ));

    form.set_field_text("url", "https://qyapi.weixin.qq.com/cgi-bin/webhook/send?key=k").await.unwrap();
    form.submit().await.unwrap();
    assert_eq!(backend.save_calls(), 1);
}
