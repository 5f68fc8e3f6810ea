//! Persistence boundary for step attributes

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStepStore;

use crate::core::graph::{Attrs, JobId};
use crate::core::patch::{SaveRequest, SaveResponse};
use crate::core::schema::SelectOption;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::debug;

/// Dictionary type listing Kubernetes image pull policies
pub const DICT_IMAGE_PULL_POLICY: &str = "imagePullPolicy";

/// Failures reported by a persistence backend
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("Save rejected: {0}")]
    Rejected(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Unknown dictionary type: {0}")]
    UnknownDictionary(String),
}

/// A step as last saved for a job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredStep {
    pub job_id: JobId,
    pub step_code: String,
    pub step_title: String,
    pub step_attrs: Attrs,
    pub updated_at: DateTime<Utc>,
}

impl StoredStep {
    pub fn from_request(request: &SaveRequest) -> Self {
        Self {
            job_id: request.job_id.clone(),
            step_code: request.step_code.clone(),
            step_title: request.step_attrs.step_title().to_string(),
            step_attrs: request.step_attrs.attrs().clone(),
            updated_at: Utc::now(),
        }
    }
}

/// Write side used by the form controller
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Store the job graph and replace the step's attributes
    async fn save(&self, request: &SaveRequest) -> Result<SaveResponse, PersistenceError>;

    /// Choices of a dictionary-backed select field
    async fn list_options(&self, dict_type: &str) -> Result<Vec<SelectOption>, PersistenceError>;
}

/// Read side: what has been saved for a job
#[async_trait::async_trait]
pub trait StepRepository: Send + Sync {
    async fn load_step(&self, job_id: &JobId, step_code: &str) -> Result<Option<StoredStep>, PersistenceError>;

    async fn list_steps(&self, job_id: &JobId) -> Result<Vec<StoredStep>, PersistenceError>;

    /// Last serialized graph saved for a job
    async fn load_graph(&self, job_id: &JobId) -> Result<Option<String>, PersistenceError>;
}

#[async_trait::async_trait]
impl<T: PersistenceBackend + ?Sized> PersistenceBackend for Arc<T> {
    async fn save(&self, request: &SaveRequest) -> Result<SaveResponse, PersistenceError> {
        (**self).save(request).await
    }

    async fn list_options(&self, dict_type: &str) -> Result<Vec<SelectOption>, PersistenceError> {
        (**self).list_options(dict_type).await
    }
}

/// Dictionaries every backend starts with
pub fn default_dictionaries() -> HashMap<String, Vec<SelectOption>> {
    let mut dictionaries = HashMap::new();
    dictionaries.insert(
        DICT_IMAGE_PULL_POLICY.to_string(),
        vec![
            SelectOption::new("Always", "Always"),
            SelectOption::new("IfNotPresent", "IfNotPresent"),
            SelectOption::new("Never", "Never"),
        ],
    );
    dictionaries
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    graphs: RwLock<HashMap<JobId, String>>,
    steps: RwLock<HashMap<(JobId, String), StoredStep>>,
    dictionaries: RwLock<HashMap<String, Vec<SelectOption>>>,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            graphs: RwLock::new(HashMap::new()),
            steps: RwLock::new(HashMap::new()),
            dictionaries: RwLock::new(default_dictionaries()),
        }
    }

    /// Add or replace a dictionary
    pub async fn put_dictionary(&self, dict_type: impl Into<String>, options: Vec<SelectOption>) {
        self.dictionaries.write().await.insert(dict_type.into(), options);
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn save(&self, request: &SaveRequest) -> Result<SaveResponse, PersistenceError> {
        let key = request.job_id.clone();
        debug!("Saving step {} of job {} ({})", request.step_code, key, request.request_id);

        // Both maps are updated under their locks together so readers never see half a save
        let mut graphs = self.graphs.write().await;
        let mut steps = self.steps.write().await;
        graphs.insert(key.clone(), request.job_graph.clone());
        steps.insert((key, request.step_code.clone()), StoredStep::from_request(request));

        Ok(SaveResponse::ok())
    }

    async fn list_options(&self, dict_type: &str) -> Result<Vec<SelectOption>, PersistenceError> {
        let dictionaries = self.dictionaries.read().await;
        dictionaries
            .get(dict_type)
            .cloned()
            .ok_or_else(|| PersistenceError::UnknownDictionary(dict_type.to_string()))
    }
}

#[async_trait::async_trait]
impl StepRepository for InMemoryPersistence {
    async fn load_step(&self, job_id: &JobId, step_code: &str) -> Result<Option<StoredStep>, PersistenceError> {
        let steps = self.steps.read().await;
        Ok(steps.get(&(job_id.clone(), step_code.to_string())).cloned())
    }

    async fn list_steps(&self, job_id: &JobId) -> Result<Vec<StoredStep>, PersistenceError> {
        let steps = self.steps.read().await;
        let mut result: Vec<_> = steps
            .iter()
            .filter(|((job, _), _)| job == job_id)
            .map(|(_, step)| step.clone())
            .collect();
        result.sort_by(|a, b| a.step_code.cmp(&b.step_code));
        Ok(result)
    }

    async fn load_graph(&self, job_id: &JobId) -> Result<Option<String>, PersistenceError> {
        let graphs = self.graphs.read().await;
        Ok(graphs.get(job_id).cloned())
    }
}
