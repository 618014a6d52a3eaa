//! Operator access to a live stack.
//!
//! A successful engine run leaves an access script in the stack's data
//! directory (`access_cluster.<stack>.py` for clusters,
//! `access_jumphost.<stack>.sh` for jump hosts). Access looks the stack up,
//! finds that script, and either prints or runs the command for it.

use crate::error::StackError;
use crate::identity::{IdentityAllocator, StackIdentity, StackKind, StateLayout};
use crate::invoke::{Invocation, Orchestrator};
use crate::params::{Choice, ProdLevel};
use std::path::{Path, PathBuf};
use tracing::info;

const CLUSTER_SCRIPT_RUNNER: &str = "python3";
const JUMPHOST_SCRIPT_RUNNER: &str = "sh";

/// The access script of one live stack
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessScript {
    pub identity: StackIdentity,
    pub path: PathBuf,
    pub invocation: Invocation,
}

impl AccessScript {
    /// Shell line an operator can paste, e.g. `cd <dir> && sh access_jumphost.bob-jh.sh`
    pub fn shell_line(&self) -> String {
        match &self.invocation.cwd {
            Some(dir) => format!("cd {} && {}", dir.display(), self.invocation),
            None => self.invocation.command_line(),
        }
    }
}

/// Where the engine writes the access script for `stack_name`. Cluster data
/// is further split by deployment tier.
pub fn script_path(
    layout: &StateLayout,
    kind: StackKind,
    stack_name: &str,
    prod_level: ProdLevel,
) -> PathBuf {
    match kind {
        StackKind::Cluster => layout
            .root()
            .join(kind.data_dir())
            .join(prod_level.as_str())
            .join(stack_name)
            .join(format!("access_cluster.{}.py", stack_name)),
        StackKind::Jumphost => layout
            .data_dir(kind, stack_name)
            .join(format!("access_jumphost.{}.sh", stack_name)),
    }
}

/// Find the access script of a live stack.
///
/// Fails with `NotFound` when no stack is recorded under the name, and with
/// `AccessUnavailable` when the stack exists but its script does not.
pub fn locate(
    allocator: &IdentityAllocator,
    kind: StackKind,
    owner: &str,
    logical_name: &str,
    prod_level: ProdLevel,
) -> Result<AccessScript, StackError> {
    let identity = allocator.lookup(kind, owner, logical_name)?;
    let path = script_path(allocator.layout(), kind, &identity.stack_name, prod_level);
    if !path.is_file() {
        return Err(StackError::AccessUnavailable {
            stack: identity.stack_name,
            path,
        });
    }

    let runner = match kind {
        StackKind::Cluster => CLUSTER_SCRIPT_RUNNER,
        StackKind::Jumphost => JUMPHOST_SCRIPT_RUNNER,
    };
    let invocation = script_invocation(runner, &path);
    Ok(AccessScript {
        identity,
        path,
        invocation,
    })
}

fn script_invocation(runner: &str, path: &Path) -> Invocation {
    let file = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    let invocation = Invocation::new(runner).arg(file);
    match path.parent() {
        Some(dir) => invocation.current_dir(dir),
        None => invocation,
    }
}

/// Run the access script, handing it the terminal.
pub fn connect(orchestrator: &dyn Orchestrator, script: &AccessScript) -> Result<(), StackError> {
    info!(stack = %script.identity.stack_name, script = %script.path.display(), "Opening access session");
    let status = orchestrator.invoke(&script.invocation)?;
    if status.success() {
        Ok(())
    } else {
        Err(StackError::Invoke {
            command: script.invocation.command_line(),
            status: status.to_string(),
        })
    }
}
