//! Test utility functions for stepform

#![allow(dead_code)]

use stepform::core::config::SchemaCatalog;
use stepform::core::schema::SelectOption;
use stepform::form::{FormEvent, RecordingNotifier};
use stepform::persistence::{default_dictionaries, PersistenceBackend, PersistenceError};
use stepform::{JobGraph, SaveRequest, SaveResponse, StepFormController};

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// How the mock answers a save
#[derive(Debug, Clone)]
pub enum SaveBehavior {
    Accept,
    Reject(String),
    Fail(PersistenceError),
}

/// Mock persistence that records every request it sees
pub struct MockPersistence {
    behavior: SaveBehavior,
    simulate_delay: Option<Duration>,
    options_delay: Option<Duration>,
    save_calls: Arc<AtomicUsize>,
    requests: Arc<Mutex<Vec<SaveRequest>>>,
    dictionaries: HashMap<String, Vec<SelectOption>>,
}

impl MockPersistence {
    pub fn new() -> Self {
        Self {
            behavior: SaveBehavior::Accept,
            simulate_delay: None,
            options_delay: None,
            save_calls: Arc::new(AtomicUsize::new(0)),
            requests: Arc::new(Mutex::new(Vec::new())),
            dictionaries: default_dictionaries(),
        }
    }

    pub fn failing(error: PersistenceError) -> Self {
        Self {
            behavior: SaveBehavior::Fail(error),
            ..Self::new()
        }
    }

    pub fn rejecting(message: &str) -> Self {
        Self {
            behavior: SaveBehavior::Reject(message.to_string()),
            ..Self::new()
        }
    }

    /// Delay every save by `delay`
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.simulate_delay = Some(delay);
        self
    }

    /// Delay every dictionary lookup by `delay`
    pub fn with_options_delay(mut self, delay: Duration) -> Self {
        self.options_delay = Some(delay);
        self
    }

    pub fn without_dictionaries(mut self) -> Self {
        self.dictionaries.clear();
        self
    }

    pub fn save_calls(&self) -> usize {
        self.save_calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<SaveRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> Option<SaveRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

impl Default for MockPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PersistenceBackend for MockPersistence {
    async fn save(&self, request: &SaveRequest) -> Result<SaveResponse, PersistenceError> {
        self.save_calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());

        if let Some(delay) = self.simulate_delay {
            tokio::time::sleep(delay).await;
        }

        match &self.behavior {
            SaveBehavior::Accept => Ok(SaveResponse::ok()),
            SaveBehavior::Reject(message) => Ok(SaveResponse::rejected(message.clone())),
            SaveBehavior::Fail(error) => Err(error.clone()),
        }
    }

    async fn list_options(&self, dict_type: &str) -> Result<Vec<SelectOption>, PersistenceError> {
        if let Some(delay) = self.options_delay {
            tokio::time::sleep(delay).await;
        }
        self.dictionaries
            .get(dict_type)
            .cloned()
            .ok_or_else(|| PersistenceError::UnknownDictionary(dict_type.to_string()))
    }
}

/// A graph holding one IoTDB sink `step1` with no attributes yet
pub fn iotdb_graph() -> JobGraph {
    JobGraph::from_json(
        r#"{"nodes":[{"id":"source1","displayName":"Fake Source","data":{"type":"source","name":"Fake","attrs":{"row.num":5}}},{"id":"step1","displayName":"IoTDB Sink","data":{"type":"sink","name":"IoTDB","attrs":{}}}],"edges":[{"source":"source1","target":"step1"}]}"#,
    )
    .unwrap()
}

/// A graph holding one Cassandra sink `step1` with saved attributes
pub fn cassandra_graph() -> JobGraph {
    JobGraph::from_json(
        r#"{"nodes":[{"id":"step1","displayName":"Cassandra","data":{"type":"sink","name":"Cassandra","attrs":{"stepTitle":"Cassandra","host":"10.0.0.5:9042","keyspace":"metrics","consistency_level":"QUORUM","x-ui-hint":"wide"}}}],"edges":[]}"#,
    )
    .unwrap()
}

/// Form for `step1` of `graph`, resolved through the built-in catalog
pub fn form_for<B: PersistenceBackend>(graph: JobGraph, backend: B) -> StepFormController<B> {
    let catalog = SchemaCatalog::builtin().unwrap();
    StepFormController::from_catalog(&catalog, graph, "step1", 42, backend).unwrap()
}

/// Records every event a form emits
#[derive(Clone, Default)]
pub struct EventLog(Arc<Mutex<Vec<FormEvent>>>);

impl EventLog {
    pub fn handler(&self) -> impl Fn(FormEvent) + Send + Sync + 'static {
        let events = self.0.clone();
        move |event| events.lock().unwrap().push(event)
    }

    pub fn events(&self) -> Vec<FormEvent> {
        self.0.lock().unwrap().clone()
    }

    pub fn count(&self, predicate: impl Fn(&FormEvent) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }
}

/// Counts completion callbacks
#[derive(Clone, Default)]
pub struct CompletionCounter(Arc<AtomicUsize>);

impl CompletionCounter {
    pub fn handler(&self) -> impl Fn(&stepform::GraphNode) + Send + Sync + 'static {
        let count = self.0.clone();
        move |_| {
            count.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

pub fn recording_notifier() -> Arc<RecordingNotifier> {
    Arc::new(RecordingNotifier::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_persistence_records_requests() {
        let backend = Arc::new(MockPersistence::rejecting("no"));
        let form = form_for(iotdb_graph(), backend.clone());
        form.open().await.unwrap();
        form.set_field_text("nodeUrls", "a:1").await.unwrap();
        form.set_field_text("username", "u").await.unwrap();
        form.set_field_text("password", "p").await.unwrap();

        assert!(form.submit().await.is_err());
        assert_eq!(backend.save_calls(), 1);
        assert_eq!(backend.requests().len(), 1);
        assert_eq!(backend.last_request().unwrap().step_code, "step1");
    }

    #[tokio::test]
    async fn test_mock_dictionaries() {
        let backend = MockPersistence::new();
        assert_eq!(backend.list_options("imagePullPolicy").await.unwrap().len(), 3);
        let backend = backend.without_dictionaries();
        assert!(backend.list_options("imagePullPolicy").await.is_err());
    }
}
