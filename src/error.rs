//! Error types shared across the crate.

use std::fmt;

/// Errors surfaced to the immediate caller. None of them is fatal to the
/// process: the worst outcome is a skipped spawn or replacement opportunity.
#[derive(Debug, thiserror::Error)]
pub enum NpcError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Unknown custom NPC definition '{0}'")]
    UnknownDefinition(String),
    #[error("No free NPC slot to spawn '{0}'")]
    SlotsExhausted(String),
    #[error("Duplicate custom NPC definition '{0}'")]
    DuplicateDefinition(String),
    #[error("Definition '{name}' failed validation: {}", join_issues(.issues))]
    Validation {
        name: String,
        issues: Vec<ValidationIssue>,
    },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),
}

/// Faults raised by scripted hooks. Callers never propagate these; the hook
/// dispatcher logs them and substitutes the hook's neutral value.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScriptError {
    #[error("Script runtime error: {0}")]
    Runtime(String),
    #[error("Hook {hook} returned an unexpected value: {message}")]
    Type { hook: &'static str, message: String },
}

pub type ScriptResult<T> = Result<T, ScriptError>;

/// A single problem found while validating a definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    pub message: String,
    pub source: Option<String>,
}

impl ValidationIssue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Tag the issue with the file the definition was read from.
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(source) => write!(f, "{} ({})", self.message, source),
            None => f.write_str(&self.message),
        }
    }
}

fn join_issues(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
