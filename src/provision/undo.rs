//! Undo log for resources created during one build.

use crate::error::ProviderError;
use crate::naming::ManagedResource;
use crate::provider::CloudProvider;
use std::fs;
use std::io;
use std::path::PathBuf;
use tracing::{info, warn};

type UndoAction = Box<dyn FnOnce(&dyn CloudProvider) -> Result<(), ProviderError>>;

struct UndoEntry {
    label: String,
    action: UndoAction,
}

/// Deletion closures in creation order
#[derive(Default)]
pub struct UndoLog {
    entries: Vec<UndoEntry>,
}

/// Outcome of a rollback or teardown pass
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RollbackReport {
    /// Labels of artifacts removed (or already absent)
    pub removed: Vec<String>,
    /// One `label: error` line per artifact that could not be removed
    pub failures: Vec<String>,
}

impl RollbackReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn merge(&mut self, other: RollbackReport) {
        self.removed.extend(other.removed);
        self.failures.extend(other.failures);
    }

    /// Remove local files; missing files count as removed.
    pub fn remove_files<'p>(&mut self, files: impl IntoIterator<Item = &'p PathBuf>) {
        for path in files {
            let label = format!("file {}", path.display());
            match fs::remove_file(path) {
                Ok(()) => {
                    info!(path = %path.display(), "Removed file");
                    self.removed.push(label);
                }
                Err(e) if e.kind() == io::ErrorKind::NotFound => self.removed.push(label),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove file");
                    self.failures.push(format!("{}: {}", label, e));
                }
            }
        }
    }
}

impl std::fmt::Debug for UndoLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| &e.label))
            .finish()
    }
}

impl UndoLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry labels in creation order
    pub fn labels(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.label.as_str()).collect()
    }

    pub fn push(&mut self, label: impl Into<String>, action: UndoAction) {
        self.entries.push(UndoEntry {
            label: label.into(),
            action,
        });
    }

    /// Record a plain provider resource.
    pub fn push_resource(&mut self, resource: ManagedResource) {
        let label = resource.to_string();
        self.push(label, Box::new(move |provider: &dyn CloudProvider| provider.delete(&resource)));
    }

    /// Record a key pair together with its secret file.
    pub fn push_key_pair(&mut self, resource: ManagedResource, secret_file: PathBuf) {
        let label = format!("{} and {}", resource, secret_file.display());
        self.push(
            label,
            Box::new(move |provider: &dyn CloudProvider| {
                match provider.delete(&resource) {
                    Err(e) if !e.is_not_found() => return Err(e),
                    _ => {}
                }
                match fs::remove_file(&secret_file) {
                    Err(e) if e.kind() != io::ErrorKind::NotFound => {
                        return Err(ProviderError::Other(format!(
                            "failed to remove {}: {}",
                            secret_file.display(),
                            e
                        )))
                    }
                    _ => {}
                }
                if let Some(parent) = secret_file.parent() {
                    // Only succeeds when the directory is empty.
                    let _ = fs::remove_dir(parent);
                }
                Ok(())
            }),
        );
    }

    /// Run every entry newest first. Failures are collected, never fatal.
    pub fn unwind(self, provider: &dyn CloudProvider) -> RollbackReport {
        let mut report = RollbackReport::default();
        for entry in self.entries.into_iter().rev() {
            match (entry.action)(provider) {
                Ok(()) => {
                    info!(artifact = %entry.label, "Rolled back");
                    report.removed.push(entry.label);
                }
                Err(e) if e.is_not_found() => report.removed.push(entry.label),
                Err(e) => {
                    warn!(artifact = %entry.label, error = %e, "Rollback step failed");
                    report.failures.push(format!("{}: {}", entry.label, e));
                }
            }
        }
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::InMemoryCloud;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tempfile::TempDir;

    #[test]
    fn test_unwind_runs_newest_first_and_continues_past_failures() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut log = UndoLog::new();
        for label in ["first", "second", "third"] {
            let order = Arc::clone(&order);
            log.push(
                label,
                Box::new(move |_: &dyn CloudProvider| {
                    order.lock().push(label);
                    if label == "second" {
                        Err(ProviderError::AccessDenied("nope".to_string()))
                    } else {
                        Ok(())
                    }
                }),
            );
        }
        assert_eq!(log.labels(), vec!["first", "second", "third"]);

        let report = log.unwind(&InMemoryCloud::new());
        assert_eq!(*order.lock(), vec!["third", "second", "first"]);
        assert_eq!(report.removed, vec!["third", "first"]);
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].starts_with("second: "));
        assert!(!report.is_clean());
    }

    #[test]
    fn test_remove_files_tolerates_missing() {
        let dir = TempDir::new().unwrap();
        let present = dir.path().join("present.yml");
        fs::write(&present, "x").unwrap();
        let missing = dir.path().join("missing.yml");

        let mut report = RollbackReport::default();
        report.remove_files([&present, &missing]);
        assert!(report.is_clean());
        assert_eq!(report.removed.len(), 2);
        assert!(!present.exists());
    }
}
