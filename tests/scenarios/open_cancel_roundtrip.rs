//! Test: Open/Cancel Round Trip - cancelling leaves the node untouched

use crate::helpers::*;
use serde_json::json;
use std::sync::Arc;
use stepform::{CancelOutcome, FormEvent, FormState};

/// Test that open, edit, cancel keeps the node byte-identical
#[tokio::test]
async fn test_cancel_discards_edits() {
    let graph = cassandra_graph();
    let original_graph = graph.to_json().unwrap();
    let original_attrs = graph.node("step1").unwrap().attrs_json();

    let backend = Arc::new(MockPersistence::new());
    let completions = CompletionCounter::default();
    let form = form_for(graph, backend.clone()).on_complete(completions.handler());

    form.open().await.unwrap();
    form.set_field_text("host", "10.9.9.9:9042").await.unwrap();
    form.set_field_text("stepTitle", "Renamed").await.unwrap();
    assert_eq!(form.cancel().await, CancelOutcome::Closed);

    assert_eq!(form.state().await, FormState::Closed);
    assert_eq!(form.node().await.unwrap().attrs_json(), original_attrs);
    assert_eq!(form.graph().await.to_json().unwrap(), original_graph);
    assert_eq!(backend.save_calls(), 0);
    assert_eq!(completions.count(), 0);
}

/// Test that reopening shows the stored values, not the discarded ones
#[tokio::test]
async fn test_reopen_after_cancel() {
    let log = EventLog::default();
    let form = form_for(cassandra_graph(), MockPersistence::new()).with_event_handler(log.handler());

    form.open().await.unwrap();
    form.set_field_text("host", "10.9.9.9:9042").await.unwrap();
    form.cancel().await;

    form.open().await.unwrap();
    assert_eq!(form.value("host").await, Some(json!("10.0.0.5:9042")));
    assert_eq!(form.value("consistency_level").await, Some(json!("QUORUM")));
    // Defaults fill gaps in stored attrs
    assert_eq!(form.value("datacenter").await, Some(json!("datacenter1")));

    assert_eq!(log.count(|e| matches!(e, FormEvent::Opened { .. })), 2);
    assert_eq!(log.count(|e| matches!(e, FormEvent::Closed { .. })), 1);
}

/// Test that attrs outside the schema are not sent with the patch
#[tokio::test]
async fn test_unknown_attrs_are_left_out_of_patch() {
    let backend = Arc::new(MockPersistence::new());
    let form = form_for(cassandra_graph(), backend.clone());
    form.open().await.unwrap();
    assert_eq!(form.value("x-ui-hint").await, Some(json!("wide")));

    form.submit().await.unwrap();
    let request = backend.last_request().unwrap();
    assert_eq!(request.step_attrs.get("x-ui-hint"), None);
    assert_eq!(request.step_attrs.get("host"), Some(&json!("10.0.0.5:9042")));
}

/// Test that cancelling a closed form is harmless
#[tokio::test]
async fn test_cancel_twice() {
    let form = form_for(cassandra_graph(), MockPersistence::new());
    form.open().await.unwrap();
    assert_eq!(form.cancel().await, CancelOutcome::Closed);
    assert_eq!(form.cancel().await, CancelOutcome::AlreadyClosed);
}
