//! Step configuration form controller
//!
//! One controller serves every step type: the schema decides which fields
//! exist and how they are checked. The controller owns a copy of the job
//! graph and only ever rewrites the attrs of the node it was built for.

pub mod capabilities;

pub use capabilities::{KeyLabels, LabelResolver, Notifier, RecordingNotifier, SilentNotifier, Toast};

use crate::core::config::SchemaCatalog;
use crate::core::error::{FieldError, PreconditionError, ValidationError};
use crate::core::graph::{Attrs, GraphNode, JobGraph, JobId};
use crate::core::patch::{AttributePatch, SaveRequest};
use crate::core::schema::{ParameterKind, SelectOption, StepParameterSchema, STEP_TITLE};
use crate::core::validation::{self, LoadedOptions};
use crate::persistence::{PersistenceBackend, PersistenceError};
use serde_json::{Number, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Message key of the toast shown after a successful save
pub const SUCCESS_MESSAGE_KEY: &str = "app.common.operate.success";

/// Errors surfaced by the form controller
#[derive(Debug, Error)]
pub enum FormError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("Form is not open")]
    NotOpen,

    #[error("Unknown field '{0}'")]
    UnknownField(String),

    #[error("Field '{0}' is not numeric")]
    NotNumeric(String),

    #[error("Failed to serialize job graph: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Lifecycle of a form instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormState {
    Closed,
    /// Dictionary options are being fetched
    Opening,
    Open,
    /// Last validation failed; field errors are recorded
    OpenWithErrors,
    /// A save is in flight
    Submitting,
}

/// Loading state of a dictionary-backed select field
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionsState {
    Loading,
    Loaded(Vec<SelectOption>),
    Failed(String),
}

/// What became of a submit call
#[derive(Debug, Clone, PartialEq)]
pub enum SubmitOutcome {
    /// Saved; the node now carries this patch
    Saved(AttributePatch),
    /// Another submit was already in flight; nothing was sent
    Ignored,
}

/// What became of a cancel call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Closed,
    AlreadyClosed,
    /// A save is in flight; the form closes once it settles
    Deferred,
}

/// Events emitted over the form lifecycle
#[derive(Debug, Clone)]
pub enum FormEvent {
    Opened {
        step_id: String,
    },
    OptionsLoaded {
        field: String,
        count: usize,
    },
    OptionsFailed {
        field: String,
        error: String,
    },
    ValidationFailed {
        step_id: String,
        fields: Vec<String>,
    },
    SaveStarted {
        step_id: String,
        request_id: Uuid,
    },
    Saved {
        step_id: String,
        request_id: Uuid,
    },
    SaveFailed {
        step_id: String,
        error: String,
    },
    Closed {
        step_id: String,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(FormEvent) + Send + Sync>;

/// Called with the updated node after a successful save
pub type CompletionHandler = Arc<dyn Fn(&GraphNode) + Send + Sync>;

/// Mutable part of the controller
struct FormSession {
    state: FormState,
    graph: JobGraph,
    values: Attrs,
    errors: Vec<FieldError>,
    options: HashMap<String, OptionsState>,
    close_requested: bool,
    /// Bumped on every open and close so a stale open can tell it was cancelled
    generation: u64,
}

impl FormSession {
    fn reset(&mut self) {
        self.state = FormState::Closed;
        self.values.clear();
        self.errors.clear();
        self.options.clear();
        self.close_requested = false;
        self.generation += 1;
    }

    fn is_editable(&self) -> bool {
        matches!(
            self.state,
            FormState::Open | FormState::OpenWithErrors | FormState::Submitting
        )
    }

    fn loaded_options(&self) -> LoadedOptions {
        self.options
            .iter()
            .filter_map(|(field, state)| match state {
                OptionsState::Loaded(options) => Some((field.clone(), options.clone())),
                _ => None,
            })
            .collect()
    }
}

/// Clears the in-flight flag when a submit finishes, however it finishes
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Edits one graph node's attributes through its parameter schema
pub struct StepFormController<B> {
    backend: B,
    schema: StepParameterSchema,
    job_id: JobId,
    node_id: String,
    labels: Arc<dyn LabelResolver>,
    notifier: Arc<dyn Notifier>,
    event_handlers: Vec<EventHandler>,
    completion_handlers: Vec<CompletionHandler>,
    in_flight: AtomicBool,
    session: Mutex<FormSession>,
}

impl<B: PersistenceBackend> StepFormController<B> {
    /// Create a form for `node_id`, which must be part of `graph`
    pub fn new(
        graph: JobGraph,
        node_id: impl Into<String>,
        job_id: impl Into<JobId>,
        schema: StepParameterSchema,
        backend: B,
    ) -> Result<Self, PreconditionError> {
        let node_id = node_id.into();
        if graph.node(&node_id).is_none() {
            return Err(PreconditionError::NodeNotFound(node_id));
        }

        Ok(Self {
            backend,
            schema,
            job_id: job_id.into(),
            node_id,
            labels: Arc::new(KeyLabels),
            notifier: Arc::new(SilentNotifier),
            event_handlers: Vec::new(),
            completion_handlers: Vec::new(),
            in_flight: AtomicBool::new(false),
            session: Mutex::new(FormSession {
                state: FormState::Closed,
                graph,
                values: Attrs::new(),
                errors: Vec::new(),
                options: HashMap::new(),
                close_requested: false,
                generation: 0,
            }),
        })
    }

    /// Create a form, picking the schema from the node's step kind
    pub fn from_catalog(
        catalog: &SchemaCatalog,
        graph: JobGraph,
        node_id: impl Into<String>,
        job_id: impl Into<JobId>,
        backend: B,
    ) -> Result<Self, PreconditionError> {
        let node_id = node_id.into();
        let node = graph
            .node(&node_id)
            .ok_or_else(|| PreconditionError::NodeNotFound(node_id.clone()))?;
        let schema = catalog.schema_for_node(node)?.clone();
        Self::new(graph, node_id, job_id, schema, backend)
    }

    pub fn with_labels(mut self, labels: Arc<dyn LabelResolver>) -> Self {
        self.labels = labels;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Add an event handler
    pub fn with_event_handler<F>(mut self, handler: F) -> Self
    where
        F: Fn(FormEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
        self
    }

    /// Register the callback the canvas uses to refresh after a save
    pub fn on_complete<F>(mut self, handler: F) -> Self
    where
        F: Fn(&GraphNode) + Send + Sync + 'static,
    {
        self.completion_handlers.push(Arc::new(handler));
        self
    }

    pub fn schema(&self) -> &StepParameterSchema {
        &self.schema
    }

    pub fn node_id(&self) -> &str {
        &self.node_id
    }

    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    fn emit(&self, event: FormEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    fn emit_all(&self, events: Vec<FormEvent>) {
        for event in events {
            self.emit(event);
        }
    }

    /// Form title: the node's display name
    pub async fn title(&self) -> String {
        let session = self.session.lock().await;
        session
            .graph
            .node(&self.node_id)
            .map(|n| n.display_name.clone())
            .unwrap_or_default()
    }

    /// Localized label of a field
    pub fn label(&self, field: &str) -> Option<String> {
        self.schema.field(field).map(|f| self.labels.resolve(&f.label))
    }

    /// Open the form, seeding values from the node and fetching dictionary options
    pub async fn open(&self) -> Result<(), FormError> {
        let (generation, dictionary_fields) = {
            let mut session = self.session.lock().await;
            if session.state != FormState::Closed {
                debug!("Form for step {} already open", self.node_id);
                return Ok(());
            }

            let node = session
                .graph
                .node(&self.node_id)
                .ok_or_else(|| PreconditionError::NodeNotFound(self.node_id.clone()))?;
            let values = self.initial_values(node);

            session.reset();
            session.values = values;
            session.state = FormState::Opening;

            let dictionary_fields: Vec<(String, String)> = self
                .schema
                .dictionary_fields()
                .into_iter()
                .map(|(field, dict)| (field.to_string(), dict.to_string()))
                .collect();
            for (field, _) in &dictionary_fields {
                session.options.insert(field.clone(), OptionsState::Loading);
            }

            (session.generation, dictionary_fields)
        };

        info!("Opening form for step {} of job {}", self.node_id, self.job_id);

        for (field, dict_type) in dictionary_fields {
            let result = self.backend.list_options(&dict_type).await;

            let mut session = self.session.lock().await;
            if session.generation != generation || session.state != FormState::Opening {
                info!("Form for step {} was closed while opening", self.node_id);
                return Ok(());
            }

            let event = match result {
                Ok(options) => {
                    let count = options.len();
                    session.options.insert(field.clone(), OptionsState::Loaded(options));
                    FormEvent::OptionsLoaded { field, count }
                }
                Err(e) => {
                    warn!("Failed to load options for field {}: {}", field, e);
                    session
                        .options
                        .insert(field.clone(), OptionsState::Failed(e.to_string()));
                    FormEvent::OptionsFailed {
                        field,
                        error: e.to_string(),
                    }
                }
            };
            drop(session);
            self.emit(event);
        }

        {
            let mut session = self.session.lock().await;
            if session.generation != generation || session.state != FormState::Opening {
                info!("Form for step {} was closed while opening", self.node_id);
                return Ok(());
            }
            session.state = FormState::Open;
        }

        self.emit(FormEvent::Opened {
            step_id: self.node_id.clone(),
        });
        Ok(())
    }

    /// Current attrs first, then schema defaults for anything missing, then the title
    fn initial_values(&self, node: &GraphNode) -> Attrs {
        let mut values = node.data.attrs.clone();

        for param in &self.schema.parameters {
            let missing = values.get(&param.name).map_or(true, Value::is_null);
            if missing {
                if let Some(default) = &param.default_value {
                    values.insert(param.name.clone(), default.clone());
                }
            }
        }

        let has_title = values
            .get(STEP_TITLE)
            .and_then(Value::as_str)
            .is_some_and(|t| !t.trim().is_empty());
        if !has_title {
            values.insert(STEP_TITLE.to_string(), Value::String(node.display_name.clone()));
        }

        values
    }

    /// Set a field to a typed value
    pub async fn set_field(&self, name: &str, value: Value) -> Result<(), FormError> {
        if self.schema.field(name).is_none() {
            return Err(FormError::UnknownField(name.to_string()));
        }

        let mut session = self.session.lock().await;
        if !session.is_editable() {
            return Err(FormError::NotOpen);
        }
        session.values.insert(name.to_string(), value);
        session.errors.retain(|e| e.field != name);
        Ok(())
    }

    /// Set a field from user-typed text, converting it to the field's kind
    pub async fn set_field_text(&self, name: &str, text: &str) -> Result<(), FormError> {
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        let value = validation::coerce_text(&field.kind, text);
        self.set_field(name, value).await
    }

    /// Empty a field
    pub async fn clear_field(&self, name: &str) -> Result<(), FormError> {
        self.set_field(name, Value::Null).await
    }

    /// Move a numeric field by `steps` increments, clamped to its bounds
    pub async fn nudge(&self, name: &str, steps: i64) -> Result<Value, FormError> {
        let field = self
            .schema
            .field(name)
            .ok_or_else(|| FormError::UnknownField(name.to_string()))?;
        if field.kind != ParameterKind::Number {
            return Err(FormError::NotNumeric(name.to_string()));
        }
        let c = &field.constraints;

        let mut session = self.session.lock().await;
        if !session.is_editable() {
            return Err(FormError::NotOpen);
        }

        let current = match session.values.get(name) {
            Some(Value::Number(n)) => n.as_f64(),
            Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .or(c.min)
        .unwrap_or(0.0);

        let mut next = current + steps as f64 * c.step.unwrap_or(1.0);
        if let Some(min) = c.min {
            next = next.max(min);
        }
        if let Some(max) = c.max {
            next = next.min(max);
        }

        let value = if next.fract() == 0.0 && next.abs() < i64::MAX as f64 {
            Value::Number(Number::from(next as i64))
        } else {
            Number::from_f64(next).map(Value::Number).unwrap_or(Value::Null)
        };

        session.values.insert(name.to_string(), value.clone());
        session.errors.retain(|e| e.field != name);
        Ok(value)
    }

    /// Check the current values without saving
    pub async fn validate(&self) -> Result<AttributePatch, FormError> {
        let mut session = self.session.lock().await;
        if !session.is_editable() {
            return Err(FormError::NotOpen);
        }

        let result = validation::validate(&self.schema, &session.values, &session.loaded_options());
        match &result {
            Ok(_) => {
                session.errors.clear();
                if session.state == FormState::OpenWithErrors {
                    session.state = FormState::Open;
                }
            }
            Err(err) => {
                session.errors = err.fields.clone();
                if session.state == FormState::Open {
                    session.state = FormState::OpenWithErrors;
                }
            }
        }
        Ok(result?)
    }

    /// Validate and save
    ///
    /// Only one submit runs at a time per form; a submit arriving while
    /// another is pending returns [`SubmitOutcome::Ignored`] without calling
    /// the backend.
    pub async fn submit(&self) -> Result<SubmitOutcome, FormError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("Submit for step {} ignored: save already in flight", self.node_id);
            return Ok(SubmitOutcome::Ignored);
        }
        let _guard = InFlightGuard(&self.in_flight);

        let request = self.prepare_request().await?;
        let request_id = request.request_id;

        info!(
            "Saving step {} of job {} ({})",
            self.node_id, self.job_id, request_id
        );
        self.emit(FormEvent::SaveStarted {
            step_id: self.node_id.clone(),
            request_id,
        });

        let outcome = match self.backend.save(&request).await {
            Ok(response) if response.success => Ok(()),
            Ok(response) => Err(PersistenceError::Rejected(
                response.message.unwrap_or_else(|| "save was not accepted".to_string()),
            )),
            Err(e) => Err(e),
        };

        match outcome {
            Ok(()) => {
                let patch = request.step_attrs;
                let node = {
                    let mut session = self.session.lock().await;
                    let node = match session.graph.node_mut(&self.node_id) {
                        Some(node) => {
                            node.data.attrs = patch.attrs().clone();
                            node.display_name = patch.step_title().to_string();
                            node.clone()
                        }
                        None => return Err(PreconditionError::NodeNotFound(self.node_id.clone()).into()),
                    };
                    session.reset();
                    node
                };

                info!("Saved step {} of job {}", self.node_id, self.job_id);
                self.notifier.success(&self.labels.resolve(SUCCESS_MESSAGE_KEY));
                self.emit_all(vec![
                    FormEvent::Saved {
                        step_id: self.node_id.clone(),
                        request_id,
                    },
                    FormEvent::Closed {
                        step_id: self.node_id.clone(),
                    },
                ]);
                for handler in &self.completion_handlers {
                    handler(&node);
                }

                Ok(SubmitOutcome::Saved(patch))
            }
            Err(e) => {
                warn!("Failed to save step {}: {}", self.node_id, e);
                let closed = {
                    let mut session = self.session.lock().await;
                    if session.close_requested {
                        session.reset();
                        true
                    } else {
                        session.state = FormState::Open;
                        false
                    }
                };

                self.emit(FormEvent::SaveFailed {
                    step_id: self.node_id.clone(),
                    error: e.to_string(),
                });
                if closed {
                    self.emit(FormEvent::Closed {
                        step_id: self.node_id.clone(),
                    });
                }

                Err(FormError::Persistence(e))
            }
        }
    }

    /// Validate under the lock and move to `Submitting`
    async fn prepare_request(&self) -> Result<SaveRequest, FormError> {
        let mut session = self.session.lock().await;
        if !matches!(session.state, FormState::Open | FormState::OpenWithErrors) {
            return Err(FormError::NotOpen);
        }

        match validation::validate(&self.schema, &session.values, &session.loaded_options()) {
            Ok(patch) => {
                let job_graph = session.graph.to_json()?;
                session.errors.clear();
                session.state = FormState::Submitting;
                Ok(SaveRequest::new(
                    self.job_id.clone(),
                    job_graph,
                    self.node_id.clone(),
                    patch,
                ))
            }
            Err(err) => {
                session.errors = err.fields.clone();
                session.state = FormState::OpenWithErrors;
                drop(session);

                warn!("Step {} has invalid fields: {}", self.node_id, err);
                self.emit(FormEvent::ValidationFailed {
                    step_id: self.node_id.clone(),
                    fields: err.field_names().into_iter().map(String::from).collect(),
                });
                Err(FormError::Validation(err))
            }
        }
    }

    /// Discard edits and close
    ///
    /// While a save is in flight the close is deferred until the save settles.
    pub async fn cancel(&self) -> CancelOutcome {
        let mut session = self.session.lock().await;
        match session.state {
            FormState::Closed => {
                session.generation += 1;
                CancelOutcome::AlreadyClosed
            }
            FormState::Submitting => {
                warn!(
                    "Close of step {} requested while saving; closing once the save settles",
                    self.node_id
                );
                session.close_requested = true;
                CancelOutcome::Deferred
            }
            _ => {
                session.reset();
                drop(session);
                debug!("Form for step {} cancelled", self.node_id);
                self.emit(FormEvent::Closed {
                    step_id: self.node_id.clone(),
                });
                CancelOutcome::Closed
            }
        }
    }

    pub async fn state(&self) -> FormState {
        self.session.lock().await.state
    }

    /// Whether the confirm action should be enabled
    pub async fn is_confirm_enabled(&self) -> bool {
        matches!(
            self.session.lock().await.state,
            FormState::Open | FormState::OpenWithErrors
        )
    }

    /// Current field values
    pub async fn values(&self) -> Attrs {
        self.session.lock().await.values.clone()
    }

    pub async fn value(&self, name: &str) -> Option<Value> {
        self.session.lock().await.values.get(name).cloned()
    }

    /// Fields highlighted by the last validation
    pub async fn field_errors(&self) -> Vec<FieldError> {
        self.session.lock().await.errors.clone()
    }

    pub async fn options(&self, field: &str) -> Option<OptionsState> {
        self.session.lock().await.options.get(field).cloned()
    }

    /// Snapshot of the job graph as this form knows it
    pub async fn graph(&self) -> JobGraph {
        self.session.lock().await.graph.clone()
    }

    /// Snapshot of the edited node
    pub async fn node(&self) -> Option<GraphNode> {
        self.session.lock().await.graph.node(&self.node_id).cloned()
    }
}
