//! Services the form borrows from its host: label lookup and toasts

use std::sync::Mutex;

/// Resolves a message key to a localized string
pub trait LabelResolver: Send + Sync {
    fn resolve(&self, key: &str) -> String;
}

/// Returns keys unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyLabels;

impl LabelResolver for KeyLabels {
    fn resolve(&self, key: &str) -> String {
        key.to_string()
    }
}

/// Shows short-lived messages to the user
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);

    fn error(&self, message: &str);
}

/// Discards every message
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentNotifier;

impl Notifier for SilentNotifier {
    fn success(&self, _message: &str) {}

    fn error(&self, _message: &str) {}
}

/// A message captured by [`RecordingNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Toast {
    Success(String),
    Error(String),
}

/// Keeps every message, for tests and headless hosts
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    toasts: Mutex<Vec<Toast>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toasts(&self) -> Vec<Toast> {
        match self.toasts.lock() {
            Ok(toasts) => toasts.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    fn push(&self, toast: Toast) {
        match self.toasts.lock() {
            Ok(mut toasts) => toasts.push(toast),
            Err(poisoned) => poisoned.into_inner().push(toast),
        }
    }
}

impl Notifier for RecordingNotifier {
    fn success(&self, message: &str) {
        self.push(Toast::Success(message.to_string()));
    }

    fn error(&self, message: &str) {
        self.push(Toast::Error(message.to_string()));
    }
}
