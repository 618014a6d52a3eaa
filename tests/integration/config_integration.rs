//! Layered configuration loading and its effect on the CLI

use crate::integration::test_utils::with_isolated_env;
use clap::Parser;
use clustermaker::cli::{Cli, RunContext};
use clustermaker::config::ConfigLoader;
use clustermaker::error::StackError;
use clustermaker::identity::{IdentityAllocator, StackKind, StateLayout};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn write_workspace_config(workspace: &Path, file: &str, content: &str) {
    let dir = workspace.join("config");
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join(file), content).unwrap();
}

#[test]
fn test_defaults_without_any_file() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("workspace");
        fs::create_dir_all(&workspace).unwrap();

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.window.delay_secs, 5);
        assert_eq!(config.window.verbose_delay_secs, 15);
        assert!(config.window.before_teardown);
        assert_eq!(config.cloud.binary, "aws");
        assert_eq!(config.invoker.terraform, "terraform");
        assert_eq!(config.state.resolve(&workspace), workspace.join("."));
    });
}

#[test]
fn test_workspace_file_overrides_global_file() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let global = test_dir.path().join("xdg").join("clustermaker");
        fs::create_dir_all(&global).unwrap();
        fs::write(
            global.join("config.toml"),
            "[window]\ndelay_secs = 20\nline_length = 100\n\n[cloud]\nprofile = \"hpc\"\n",
        )
        .unwrap();

        let workspace = test_dir.path().join("workspace");
        write_workspace_config(&workspace, "config.toml", "[window]\ndelay_secs = 8\n");

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.window.delay_secs, 8);
        assert_eq!(config.window.line_length, 100);
        assert_eq!(config.cloud.profile.as_deref(), Some("hpc"));
    });
}

#[test]
fn test_named_environment_file_layers_on_base() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("workspace");
        write_workspace_config(
            &workspace,
            "config.toml",
            "[state]\nroot = \"state\"\n\n[window]\ndelay_secs = 8\n",
        );
        write_workspace_config(&workspace, "ci.toml", "[window]\ndelay_secs = 1\n");
        std::env::set_var("CLUSTERMAKER_ENV", "ci");

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(config.window.delay_secs, 1);
        assert_eq!(config.state.resolve(&workspace), workspace.join("state"));
    });
}

#[test]
fn test_environment_variables_win() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("workspace");
        write_workspace_config(
            &workspace,
            "config.toml",
            "[invoker]\nansible_playbook = \"/opt/ansible/bin/ansible-playbook\"\n",
        );
        std::env::set_var(
            "CLUSTERMAKER_INVOKER__ANSIBLE_PLAYBOOK",
            "/usr/local/bin/ansible-playbook",
        );
        std::env::set_var("CLUSTERMAKER_WINDOW__BEFORE_TEARDOWN", "false");

        let config = ConfigLoader::load(&workspace).unwrap();
        assert_eq!(
            config.invoker.ansible_playbook,
            "/usr/local/bin/ansible-playbook"
        );
        assert!(!config.window.before_teardown);
    });
}

#[test]
fn test_invalid_config_is_rejected_by_run_context() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("workspace");
        write_workspace_config(&workspace, "config.toml", "[window]\nline_length = 10\n");

        let err = RunContext::new(workspace, None, false).err().unwrap();
        match err {
            StackError::ConfigError(msg) => assert!(msg.contains("line_length")),
            other => panic!("expected config error, got {other:?}"),
        }
    });
}

#[test]
fn test_explicit_config_file_sets_state_root() {
    let test_dir = TempDir::new().unwrap();
    with_isolated_env(&test_dir, || {
        let workspace = test_dir.path().join("workspace");
        let state = test_dir.path().join("shared-state");
        fs::create_dir_all(&workspace).unwrap();
        let config_file = test_dir.path().join("clustermaker.toml");
        fs::write(
            &config_file,
            format!("[state]\nroot = \"{}\"\n", state.display()),
        )
        .unwrap();

        IdentityAllocator::new(StateLayout::new(&state))
            .allocate(StackKind::Cluster, "alice", "dev01")
            .unwrap();

        let cli = Cli::try_parse_from(["clustermaker", "list", "--format", "json"]).unwrap();
        let context = RunContext::new(workspace, Some(config_file), false).unwrap();
        let output = context.execute(&cli.command).unwrap();
        assert!(output.contains("\"stack_name\": \"alice-dev01\""));
    });
}
