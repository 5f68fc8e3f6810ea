//! Test: Deferred Close - closing during a save waits for the save

use crate::helpers::*;
use std::sync::Arc;
use std::time::Duration;
use stepform::{CancelOutcome, FormEvent, FormState, PersistenceError, SubmitOutcome};

/// Test that a close requested mid-save lands after a successful save
#[tokio::test]
async fn test_close_during_successful_save() {
    let backend = Arc::new(MockPersistence::new().with_delay(Duration::from_millis(50)));
    let completions = CompletionCounter::default();
    let log = EventLog::default();
    let form = form_for(cassandra_graph(), backend.clone())
        .on_complete(completions.handler())
        .with_event_handler(log.handler());
    form.open().await.unwrap();

    let (result, cancelled) = tokio::join!(form.submit(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        let outcome = form.cancel().await;
        (outcome, form.state().await)
    });

    assert_eq!(cancelled, (CancelOutcome::Deferred, FormState::Submitting));
    assert!(matches!(result.unwrap(), SubmitOutcome::Saved(_)));
    assert_eq!(form.state().await, FormState::Closed);
    assert_eq!(completions.count(), 1);
    assert_eq!(log.count(|e| matches!(e, FormEvent::Closed { .. })), 1);
}

/// Test that a close requested mid-save still closes when the save fails
#[tokio::test]
async fn test_close_during_failed_save() {
    let backend = Arc::new(
        MockPersistence::failing(PersistenceError::Network("timeout".to_string()))
            .with_delay(Duration::from_millis(50)),
    );
    let completions = CompletionCounter::default();
    let log = EventLog::default();
    let form = form_for(cassandra_graph(), backend.clone())
        .on_complete(completions.handler())
        .with_event_handler(log.handler());
    let original_attrs = form.node().await.unwrap().attrs_json();
    form.open().await.unwrap();

    let (result, outcome) = tokio::join!(form.submit(), async {
        tokio::time::sleep(Duration::from_millis(10)).await;
        form.cancel().await
    });

    assert_eq!(outcome, CancelOutcome::Deferred);
    assert!(result.is_err());
    assert_eq!(form.state().await, FormState::Closed);
    assert_eq!(form.node().await.unwrap().attrs_json(), original_attrs);
    assert_eq!(completions.count(), 0);
    assert_eq!(log.count(|e| matches!(e, FormEvent::Closed { .. })), 1);
}
