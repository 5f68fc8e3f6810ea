//! Core domain models for step forms
//!
//! This module defines the job graph, per-step parameter schemas, the
//! validation rules derived from them, and the save payloads.

pub mod config;
pub mod error;
pub mod graph;
pub mod patch;
pub mod schema;
pub mod validation;

pub use error::*;
pub use graph::*;
pub use patch::*;
pub use schema::*;
