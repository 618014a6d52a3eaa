//! Error types for the stack provisioning engine.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Errors returned by a cloud provider call.
///
/// `NotFound` is the only variant the engine treats as a normal signal: it
/// triggers creation in `ensure` and counts as success during removal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Resource already exists: {0}")]
    AlreadyExists(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Request throttled: {0}")]
    Throttled(String),

    #[error("Malformed request: {0}")]
    Malformed(String),

    #[error("Provider call failed: {0}")]
    Other(String),
}

impl ProviderError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ProviderError::NotFound(_))
    }
}

/// A single rejected input value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} = {value}: {constraint}")]
    OutOfRange {
        field: &'static str,
        value: String,
        constraint: String,
    },

    #[error("\"{value}\" is not a valid option for {field} (supported: {supported})")]
    NotInCatalog {
        field: &'static str,
        value: String,
        supported: String,
    },

    #[error("Missing: valid setting for {field} (required when {required_by} is enabled)")]
    MissingDependency {
        field: &'static str,
        required_by: &'static str,
    },

    #[error("Unsupported combination: {0}")]
    UnsupportedCombination(String),

    #[error("{field} = {value}: {reason}")]
    Malformed {
        field: &'static str,
        value: String,
        reason: String,
    },
}

impl ValidationError {
    /// Name of the offending input field, when the error is tied to one
    pub fn field(&self) -> Option<&'static str> {
        match self {
            ValidationError::OutOfRange { field, .. }
            | ValidationError::NotInCatalog { field, .. }
            | ValidationError::MissingDependency { field, .. }
            | ValidationError::Malformed { field, .. } => Some(field),
            ValidationError::UnsupportedCombination(_) => None,
        }
    }
}

/// All violations reported by one validation stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrors(pub Vec<ValidationError>);

impl ValidationErrors {
    pub fn single(error: ValidationError) -> Self {
        Self(vec![error])
    }

    pub fn iter(&self) -> impl Iterator<Item = &ValidationError> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lines: Vec<String> = self.0.iter().map(|e| format!("  - {}", e)).collect();
        write!(f, "{}", lines.join("\n"))
    }
}

impl std::error::Error for ValidationErrors {}

/// Errors surfaced by the build and teardown workflows
#[derive(Debug, Error)]
pub enum StackError {
    #[error("Parameter validation failed:\n{0}")]
    Validation(ValidationErrors),

    #[error("Stack {stack} already exists ({evidence}). Destroy it first:\n  $ {remediation}")]
    DuplicateStack {
        stack: String,
        evidence: String,
        remediation: String,
    },

    #[error("No active stack named {stack} (expected serial record at {record:?})")]
    NotFound { stack: String, record: PathBuf },

    #[error("Unresolved reference: {kind} \"{name}\" ({reason})")]
    UnresolvedReference {
        kind: &'static str,
        name: String,
        reason: String,
    },

    #[error("Failed to provision {resource}: {source}")]
    Provision {
        resource: String,
        #[source]
        source: ProviderError,
    },

    #[error("Teardown incomplete, {} deletion(s) failed: {}", .failures.len(), .failures.join("; "))]
    TeardownPartialFailure { failures: Vec<String> },

    #[error("Cancelled by operator: removed {removed} artifact(s), {} removal(s) failed", .failures.len())]
    Cancelled {
        removed: usize,
        failures: Vec<String>,
    },

    #[error("External command failed: {command} ({status})")]
    Invoke { command: String, status: String },

    #[error("No access script for {stack} at {path:?}; the engine has not completed this stack")]
    AccessUnavailable { stack: String, path: PathBuf },

    #[error("Corrupt serial record {path:?}: {reason}")]
    CorruptRecord { path: PathBuf, reason: String },

    #[error("Template error: {0}")]
    Template(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

impl From<ValidationErrors> for StackError {
    fn from(errors: ValidationErrors) -> Self {
        StackError::Validation(errors)
    }
}

impl From<config::ConfigError> for StackError {
    fn from(err: config::ConfigError) -> Self {
        StackError::ConfigError(err.to_string())
    }
}
