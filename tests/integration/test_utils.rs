//! Shared test utilities for integration tests
//!
//! A recording engine, a pre-populated in-memory cloud, cancellation windows
//! that elapse or abort immediately, and environment isolation for the
//! configuration tests.

use clustermaker::config::InvokerConfig;
use clustermaker::error::StackError;
use clustermaker::identity::{IdentityAllocator, StateLayout};
use clustermaker::invoke::{ExitStatus, Invocation, Orchestrator};
use clustermaker::params::{ConfigurationInput, JumphostInput};
use clustermaker::provider::InMemoryCloud;
use clustermaker::window::CancellationWindow;
use clustermaker::workflow::Workflow;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tempfile::TempDir;

/// Serializes tests that touch HOME, XDG_CONFIG_HOME or CLUSTERMAKER_* variables
static ENV_MUTEX: StdMutex<()> = StdMutex::new(());

/// Engine stand-in: records command lines, fails the first one containing
/// `fail_on`.
#[derive(Default)]
pub struct RecordingEngine {
    pub calls: Mutex<Vec<String>>,
    pub deployed: bool,
    pub fail_on: Option<&'static str>,
}

impl RecordingEngine {
    pub fn failing_on(needle: &'static str) -> Self {
        Self {
            fail_on: Some(needle),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

impl Orchestrator for RecordingEngine {
    fn invoke(&self, invocation: &Invocation) -> Result<ExitStatus, StackError> {
        let line = invocation.command_line();
        let failed = self.fail_on.is_some_and(|needle| line.contains(needle));
        self.calls.lock().push(line);
        Ok(ExitStatus {
            code: Some(if failed { 1 } else { 0 }),
        })
    }

    fn stack_exists(&self, _region: &str, _stack_name: &str) -> Result<bool, StackError> {
        Ok(self.deployed)
    }

    fn tool_version(&self, program: &str) -> Result<String, StackError> {
        Ok(if program.contains("terraform") {
            "0.12.24".to_string()
        } else {
            "2.9.6".to_string()
        })
    }
}

/// Cloud with one zone, a spot price for the default instance type and the
/// default jump host security group.
pub fn cloud() -> InMemoryCloud {
    InMemoryCloud::new()
        .with_zone("us-east-1a")
        .with_spot_price("c5.xlarge", 0.0612)
        .with_spot_price("c5.2xlarge", 0.1224)
        .with_security_group("pcluster_jumphost", "sg-0123")
        .with_bucket("alice-staging")
}

/// Elapses almost immediately; never interrupted.
pub fn elapsing_window() -> CancellationWindow {
    CancellationWindow::new(Duration::from_millis(5)).with_interrupt(futures::future::pending::<()>)
}

/// Interrupted as soon as it opens.
pub fn interrupted_window() -> CancellationWindow {
    CancellationWindow::new(Duration::from_secs(60)).with_interrupt(|| async {})
}

pub fn workflow<'a>(
    root: &Path,
    cloud: &'a InMemoryCloud,
    engine: &'a RecordingEngine,
    window: CancellationWindow,
) -> Workflow<'a> {
    Workflow::new(
        IdentityAllocator::new(StateLayout::new(root)),
        cloud,
        cloud,
        engine,
        window,
        InvokerConfig::default(),
    )
}

/// Default cluster flags plus the required owner email and zone
pub fn cluster_input() -> ConfigurationInput {
    ConfigurationInput {
        az: "us-east-1a".to_string(),
        owner_email: "alice@example.com".to_string(),
        ..ConfigurationInput::default()
    }
}

pub fn jumphost_input() -> JumphostInput {
    JumphostInput {
        az: "us-east-1a".to_string(),
        owner_email: "bob@example.com".to_string(),
        ..JumphostInput::default()
    }
}

/// Every file under `root`, relative, sorted
pub fn files_under(root: &Path) -> Vec<String> {
    fn walk(dir: &Path, root: &Path, out: &mut Vec<String>) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.is_dir() {
                walk(&path, root, out);
            } else if let Ok(relative) = path.strip_prefix(root) {
                out.push(relative.display().to_string());
            }
        }
    }
    let mut out = Vec::new();
    walk(root, root, &mut out);
    out.sort();
    out
}

/// Run `f` with HOME and XDG_CONFIG_HOME inside `test_dir` and every
/// CLUSTERMAKER_* variable cleared; the previous environment is restored.
pub fn with_isolated_env<F, R>(test_dir: &TempDir, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
    let saved: Vec<(String, String)> = std::env::vars()
        .filter(|(key, _)| {
            key == "HOME" || key == "XDG_CONFIG_HOME" || key.starts_with("CLUSTERMAKER")
        })
        .collect();
    for (key, _) in &saved {
        std::env::remove_var(key);
    }

    let home = test_dir.path().join("home");
    let config_home = test_dir.path().join("xdg");
    std::fs::create_dir_all(&home).unwrap();
    std::fs::create_dir_all(&config_home).unwrap();
    std::env::set_var("HOME", &home);
    std::env::set_var("XDG_CONFIG_HOME", &config_home);

    let result = f();

    let leaked: Vec<String> = std::env::vars()
        .map(|(key, _)| key)
        .filter(|key| key.starts_with("CLUSTERMAKER"))
        .collect();
    for key in leaked {
        std::env::remove_var(key);
    }
    std::env::remove_var("HOME");
    std::env::remove_var("XDG_CONFIG_HOME");
    for (key, value) in saved {
        std::env::set_var(key, value);
    }
    result
}
