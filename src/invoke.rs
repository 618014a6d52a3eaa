//! Orchestration engine boundary.
//!
//! The engine (playbooks for clusters, playbook plus terraform for jump
//! hosts) consumes the composed document; this module only builds its
//! command lines and runs them. `Orchestrator` is the seam tests replace.

use crate::config::InvokerConfig;
use crate::error::StackError;
use crate::identity::StackIdentity;
use crate::params::ValidatedParams;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info, warn};

pub const CLUSTER_BUILD_PLAYBOOK: &str = "create_pcluster.yml";
pub const CLUSTER_TEARDOWN_PLAYBOOK: &str = "delete_pcluster.yml";
pub const JUMPHOST_TEMPLATE_PLAYBOOK: &str = "create_pcluster_jumphost_terraform_templates.yml";
pub const TERRAFORM_PLAN: &str = "terraform_environment";

/// One external command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
    /// Working directory; the current one when `None`
    pub cwd: Option<PathBuf>,
}

impl Invocation {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            cwd: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn current_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    /// Shell-style rendering, arguments with spaces double quoted.
    pub fn command_line(&self) -> String {
        std::iter::once(self.program.clone())
            .chain(self.args.iter().map(|arg| {
                if arg.is_empty() || arg.contains(char::is_whitespace) {
                    format!("\"{}\"", arg)
                } else {
                    arg.clone()
                }
            }))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.command_line())
    }
}

/// Exit status of an invocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// `None` when the process was killed by a signal
    pub code: Option<i32>,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for ExitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "exit code {}", code),
            None => f.write_str("terminated by signal"),
        }
    }
}

/// Runs the orchestration engine and queries the tools around it.
pub trait Orchestrator {
    fn invoke(&self, invocation: &Invocation) -> Result<ExitStatus, StackError>;

    /// Whether a cluster stack of this name is deployed in `region`.
    fn stack_exists(&self, region: &str, stack_name: &str) -> Result<bool, StackError>;

    /// Version string reported by a build tool
    fn tool_version(&self, program: &str) -> Result<String, StackError>;
}

/// Runs real subprocesses, inheriting the terminal.
#[derive(Debug, Clone)]
pub struct ProcessOrchestrator {
    pcluster: String,
}

impl ProcessOrchestrator {
    pub fn new(config: &InvokerConfig) -> Self {
        Self {
            pcluster: config.pcluster.clone(),
        }
    }
}

impl Orchestrator for ProcessOrchestrator {
    fn invoke(&self, invocation: &Invocation) -> Result<ExitStatus, StackError> {
        info!(command = %invocation, "Running");
        let mut command = Command::new(&invocation.program);
        command.args(&invocation.args);
        if let Some(dir) = &invocation.cwd {
            command.current_dir(dir);
        }
        let status = command.status().map_err(|e| StackError::Invoke {
            command: invocation.command_line(),
            status: format!("failed to start: {}", e),
        })?;
        Ok(ExitStatus {
            code: status.code(),
        })
    }

    fn stack_exists(&self, region: &str, stack_name: &str) -> Result<bool, StackError> {
        let result = Command::new(&self.pcluster)
            .args(["status", "--region", region, stack_name])
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match result {
            Ok(status) => {
                debug!(stack = stack_name, code = ?status.code(), "pcluster status");
                Ok(status.success())
            }
            Err(e) => {
                warn!(
                    binary = %self.pcluster,
                    error = %e,
                    "Unable to run pcluster; assuming the stack is not deployed"
                );
                Ok(false)
            }
        }
    }

    fn tool_version(&self, program: &str) -> Result<String, StackError> {
        let flag = if program.ends_with("terraform") {
            "-version"
        } else {
            "--version"
        };
        let output = Command::new(program)
            .arg(flag)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| StackError::Invoke {
                command: format!("{} {}", program, flag),
                status: format!("failed to start: {}", e),
            })?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        parse_version(&stdout).ok_or_else(|| StackError::Invoke {
            command: format!("{} {}", program, flag),
            status: format!("unrecognised version output: {:?}", stdout.lines().next()),
        })
    }
}

/// First version-looking token on the first line: `ansible 2.9.6`,
/// `ansible [core 2.12.1]`, `Terraform v0.12.24`.
pub fn parse_version(output: &str) -> Option<String> {
    output
        .lines()
        .next()?
        .split_whitespace()
        .map(|token| token.trim_matches(|c| c == '[' || c == ']'))
        .map(|token| token.strip_prefix('v').unwrap_or(token))
        .find(|token| token.starts_with(|c: char| c.is_ascii_digit()))
        .map(str::to_string)
}

fn verbosity(invocation: Invocation, verbose: bool) -> Invocation {
    if verbose {
        invocation.arg("-vvv")
    } else {
        invocation
    }
}

/// Playbook run that builds the cluster from its document.
pub fn cluster_build(
    identity: &StackIdentity,
    params: &ValidatedParams,
    config: &InvokerConfig,
    verbose: bool,
) -> Invocation {
    let features = params.storage.features;
    let mut vars = vec![
        format!("cluster_name={}", identity.stack_name),
        format!("cluster_birth_name={}", identity.logical_name),
        format!("cluster_serial_number={}", identity.serial),
        format!("enable_hpc_performance_tests={}", params.perftests.enabled),
        format!("enable_efs={}", features.efs),
        format!("enable_external_nfs={}", features.external_nfs),
    ];
    if features.external_nfs {
        vars.push(format!(
            "external_nfs_server={}",
            params.storage.external_nfs_server
        ));
    }
    vars.push(format!("enable_fsx={}", features.fsx));
    vars.push(format!(
        "ansible_python_interpreter={}",
        config.python_interpreter
    ));

    let invocation = Invocation::new(&config.ansible_playbook)
        .arg("--extra-vars")
        .arg(vars.join(" "))
        .arg(CLUSTER_BUILD_PLAYBOOK);
    verbosity(invocation, verbose)
}

/// What the cluster teardown playbook removes besides the stack itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TeardownOptions {
    pub delete_bucket: bool,
    pub delete_efs: bool,
    pub delete_fsx: bool,
}

impl Default for TeardownOptions {
    fn default() -> Self {
        Self {
            delete_bucket: true,
            delete_efs: true,
            delete_fsx: true,
        }
    }
}

/// Playbook run that deletes the cluster stack.
pub fn cluster_teardown(
    identity: &StackIdentity,
    options: TeardownOptions,
    config: &InvokerConfig,
    verbose: bool,
) -> Invocation {
    let vars = [
        format!("cluster_name={}", identity.stack_name),
        format!("cluster_birth_name={}", identity.logical_name),
        format!("cluster_serial_number={}", identity.serial),
        format!("delete_s3_bucketname={}", options.delete_bucket),
        format!("delete_efs={}", options.delete_efs),
        format!("delete_fsx={}", options.delete_fsx),
        format!("ansible_python_interpreter={}", config.python_interpreter),
    ];
    let invocation = Invocation::new(&config.ansible_playbook)
        .arg("--extra-vars")
        .arg(vars.join(" "))
        .arg(CLUSTER_TEARDOWN_PLAYBOOK);
    verbosity(invocation, verbose)
}

/// Template generation, then terraform init/plan/apply in the data directory.
pub fn jumphost_build(
    identity: &StackIdentity,
    data_dir: &Path,
    config: &InvokerConfig,
    verbose: bool,
) -> Vec<Invocation> {
    let templates = Invocation::new(&config.ansible_playbook)
        .arg("--extra-vars")
        .arg(format!(
            "instance_name={} instance_serial_number={}",
            identity.stack_name, identity.serial
        ))
        .arg(JUMPHOST_TEMPLATE_PLAYBOOK);
    vec![
        verbosity(templates, verbose),
        Invocation::new(&config.terraform)
            .arg("init")
            .arg("-input=false")
            .current_dir(data_dir),
        Invocation::new(&config.terraform)
            .arg("plan")
            .arg("-out")
            .arg(TERRAFORM_PLAN)
            .current_dir(data_dir),
        Invocation::new(&config.terraform)
            .arg("apply")
            .arg(TERRAFORM_PLAN)
            .current_dir(data_dir),
    ]
}

/// Destroy the jump host instance terraform created.
pub fn jumphost_teardown(data_dir: &Path, config: &InvokerConfig) -> Invocation {
    Invocation::new(&config.terraform)
        .arg("destroy")
        .arg("-auto-approve")
        .current_dir(data_dir)
}

/// Run invocations in order, stopping at the first failure.
pub fn run_all(
    orchestrator: &dyn Orchestrator,
    invocations: &[Invocation],
) -> Result<(), StackError> {
    for invocation in invocations {
        let status = orchestrator.invoke(invocation)?;
        if !status.success() {
            return Err(StackError::Invoke {
                command: invocation.command_line(),
                status: status.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compose::tests::{identity, params};
    use crate::params::StorageFeatures;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("ansible 2.9.6\n  config file = None"), Some("2.9.6".to_string()));
        assert_eq!(parse_version("ansible [core 2.12.1]"), Some("2.12.1".to_string()));
        assert_eq!(parse_version("Terraform v0.12.24\n"), Some("0.12.24".to_string()));
        assert_eq!(parse_version("no version here"), None);
        assert_eq!(parse_version(""), None);
    }

    #[test]
    fn test_cluster_build_command() {
        let config = InvokerConfig::default();
        let invocation = cluster_build(&identity(), &params(), &config, false);
        let line = invocation.command_line();
        assert!(line.starts_with("ansible-playbook --extra-vars \"cluster_name=alice-dev01 cluster_birth_name=dev01 "));
        assert!(line.contains("enable_external_nfs=false enable_fsx=false"));
        assert!(!line.contains("external_nfs_server="));
        assert!(line.ends_with("ansible_python_interpreter=/usr/bin/python3\" create_pcluster.yml"));
    }

    #[test]
    fn test_cluster_build_passes_nfs_server() {
        let mut p = params();
        p.storage.features = StorageFeatures {
            external_nfs: true,
            efs: false,
            fsx: false,
        };
        p.storage.external_nfs_server = "10.0.0.5".to_string();
        let invocation = cluster_build(&identity(), &p, &InvokerConfig::default(), true);
        let line = invocation.command_line();
        assert!(line.contains("enable_external_nfs=true external_nfs_server=10.0.0.5 enable_fsx=false"));
        assert_eq!(invocation.args.last().map(String::as_str), Some("-vvv"));
    }

    #[test]
    fn test_cluster_teardown_command() {
        let options = TeardownOptions {
            delete_efs: false,
            ..TeardownOptions::default()
        };
        let invocation = cluster_teardown(&identity(), options, &InvokerConfig::default(), false);
        assert_eq!(invocation.args.last().map(String::as_str), Some(CLUSTER_TEARDOWN_PLAYBOOK));
        assert!(invocation.args[1].contains("delete_efs=false delete_fsx=true"));
    }

    #[test]
    fn test_jumphost_build_runs_terraform_in_data_dir() {
        let data_dir = PathBuf::from("/state/pcluster_jumphost_data/bob-jh");
        let steps = jumphost_build(&identity(), &data_dir, &InvokerConfig::default(), false);
        assert_eq!(steps.len(), 4);
        assert!(steps[0].cwd.is_none());
        assert_eq!(steps[3].command_line(), "terraform apply terraform_environment");
        assert!(steps[1..].iter().all(|s| s.cwd.as_deref() == Some(data_dir.as_path())));
    }

    #[test]
    fn test_exit_status() {
        assert!(ExitStatus { code: Some(0) }.success());
        assert!(!ExitStatus { code: Some(2) }.success());
        assert_eq!(ExitStatus { code: None }.to_string(), "terminated by signal");
    }

    #[test]
    fn test_missing_program_is_invoke_error() {
        let orchestrator = ProcessOrchestrator::new(&InvokerConfig::default());
        let err = orchestrator
            .invoke(&Invocation::new("/nonexistent/clustermaker-test-binary"))
            .unwrap_err();
        assert!(matches!(err, StackError::Invoke { .. }));
    }
}
