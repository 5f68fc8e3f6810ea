//! stepform - Schema-driven configuration forms for pipeline steps

pub mod cli;
pub mod core;
pub mod form;
pub mod persistence;

// Re-export commonly used types
pub use crate::core::config::{MessageCatalog, SchemaCatalog};
pub use crate::core::{AttributePatch, GraphNode, JobGraph, JobId, SaveRequest, SaveResponse, StepParameterSchema};
pub use crate::core::{FieldError, FieldIssue, PreconditionError, ValidationError};
pub use form::{CancelOutcome, FormError, FormEvent, FormState, StepFormController, SubmitOutcome};
pub use persistence::{InMemoryPersistence, PersistenceBackend, PersistenceError, StepRepository};
