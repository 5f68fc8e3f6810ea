//! Test: Options Loading - dictionary-backed selects fill in while opening

use crate::helpers::*;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use stepform::core::schema::{OptionSource, ParameterDescriptor, ParameterKind};
use stepform::form::OptionsState;
use stepform::{CancelOutcome, FieldIssue, FormError, FormEvent, FormState, JobGraph, StepFormController, StepParameterSchema};

fn k8s_graph() -> JobGraph {
    JobGraph::from_json(
        r#"{"nodes":[{"id":"step1","displayName":"Flink on K8s","data":{"type":"resource","name":"K8s","attrs":{"image":"flink:1.16"}}}],"edges":[]}"#,
    )
    .unwrap()
}

fn k8s_schema() -> StepParameterSchema {
    StepParameterSchema::new(
        "resource-k8s",
        vec![
            ParameterDescriptor::builder("image").required().build(),
            ParameterDescriptor::builder("imagePullPolicy")
                .kind(ParameterKind::Select {
                    options: OptionSource::Dictionary("imagePullPolicy".to_string()),
                })
                .default_value("IfNotPresent")
                .build(),
        ],
    )
}

fn k8s_form(backend: Arc<MockPersistence>) -> StepFormController<Arc<MockPersistence>> {
    StepFormController::new(k8s_graph(), "step1", "job-k8s", k8s_schema(), backend).unwrap()
}

/// Test that the form reports Opening until options arrive
#[tokio::test]
async fn test_options_load_during_open() {
    let backend = Arc::new(MockPersistence::new().with_options_delay(Duration::from_millis(40)));
    let log = EventLog::default();
    let form = k8s_form(backend).with_event_handler(log.handler());

    let (opened, during) = tokio::join!(form.open(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        (form.state().await, form.options("imagePullPolicy").await)
    });
    opened.unwrap();

    assert_eq!(during, (FormState::Opening, Some(OptionsState::Loading)));
    assert_eq!(form.state().await, FormState::Open);
    assert!(matches!(
        form.options("imagePullPolicy").await,
        Some(OptionsState::Loaded(options)) if options.len() == 3
    ));
    assert_eq!(
        log.count(|e| matches!(e, FormEvent::OptionsLoaded { count: 3, .. })),
        1
    );
}

/// Test that values outside the loaded options are rejected
#[tokio::test]
async fn test_value_must_be_a_loaded_option() {
    let form = k8s_form(Arc::new(MockPersistence::new()));
    form.open().await.unwrap();

    form.set_field_text("imagePullPolicy", "Sometimes").await.unwrap();
    let err = form.validate().await.unwrap_err();
    assert!(matches!(
        err,
        FormError::Validation(ref v)
            if v.issue_for("imagePullPolicy") == Some(&FieldIssue::NotAnOption { value: "Sometimes".to_string() })
    ));

    form.set_field_text("imagePullPolicy", "Always").await.unwrap();
    let patch = form.validate().await.unwrap();
    assert_eq!(patch.get("imagePullPolicy"), Some(&json!("Always")));
}

/// Test that a missing dictionary does not block the form
#[tokio::test]
async fn test_missing_dictionary() {
    let backend = Arc::new(MockPersistence::new().without_dictionaries());
    let log = EventLog::default();
    let form = k8s_form(backend.clone()).with_event_handler(log.handler());
    form.open().await.unwrap();

    assert_eq!(form.state().await, FormState::Open);
    assert!(matches!(form.options("imagePullPolicy").await, Some(OptionsState::Failed(_))));
    assert_eq!(log.count(|e| matches!(e, FormEvent::OptionsFailed { .. })), 1);

    // Without options to check against, any value passes
    form.set_field_text("imagePullPolicy", "Sometimes").await.unwrap();
    form.submit().await.unwrap();
    assert_eq!(backend.save_calls(), 1);
}

/// Test that cancelling while options load leaves the form closed
#[tokio::test]
async fn test_cancel_while_opening() {
    let backend = Arc::new(MockPersistence::new().with_options_delay(Duration::from_millis(40)));
    let log = EventLog::default();
    let form = k8s_form(backend).with_event_handler(log.handler());

    let (opened, cancelled) = tokio::join!(form.open(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        form.cancel().await
    });

    assert!(opened.is_ok());
    assert_eq!(cancelled, CancelOutcome::Closed);
    assert_eq!(form.state().await, FormState::Closed);
    assert!(form.values().await.is_empty());
    assert_eq!(log.count(|e| matches!(e, FormEvent::Opened { .. })), 0);
    assert!(matches!(form.set_field_text("image", "x").await, Err(FormError::NotOpen)));
}
