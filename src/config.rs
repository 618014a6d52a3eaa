//! Configuration System
//!
//! Layered configuration for the state root, the cancellation window, the
//! cloud client and the external tools. Sources, lowest precedence first:
//! built-in defaults, the global file, workspace files, `CLUSTERMAKER_*`
//! environment variables. Command line flags are applied last by the CLI.

use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

mod loader;
mod merge;
mod sources;

pub use loader::ConfigLoader;
pub use sources::global_file::global_config_path;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClusterMakerConfig {
    #[serde(default)]
    pub state: StateConfig,

    #[serde(default)]
    pub window: WindowConfig,

    #[serde(default)]
    pub cloud: CloudConfig,

    #[serde(default)]
    pub invoker: InvokerConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where serial records, documents and per-stack data live
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateConfig {
    #[serde(default = "default_state_root")]
    pub root: PathBuf,
}

fn default_state_root() -> PathBuf {
    PathBuf::from(".")
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            root: default_state_root(),
        }
    }
}

impl StateConfig {
    /// The state root, relative paths taken against `workspace_root`.
    pub fn resolve(&self, workspace_root: &Path) -> PathBuf {
        if self.root.is_absolute() {
            self.root.clone()
        } else {
            workspace_root.join(&self.root)
        }
    }
}

/// Cancellation window timing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowConfig {
    #[serde(default = "default_delay_secs")]
    pub delay_secs: u64,

    #[serde(default = "default_verbose_delay_secs")]
    pub verbose_delay_secs: u64,

    /// Banner width
    #[serde(default = "default_line_length")]
    pub line_length: usize,

    /// Also hold a window before teardown
    #[serde(default = "default_true")]
    pub before_teardown: bool,
}

fn default_delay_secs() -> u64 {
    5
}

fn default_verbose_delay_secs() -> u64 {
    15
}

fn default_line_length() -> usize {
    80
}

fn default_true() -> bool {
    true
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            delay_secs: default_delay_secs(),
            verbose_delay_secs: default_verbose_delay_secs(),
            line_length: default_line_length(),
            before_teardown: true,
        }
    }
}

/// Cloud API client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudConfig {
    /// `aws` executable
    #[serde(default = "default_aws_binary")]
    pub binary: String,

    /// Named credentials profile
    #[serde(default)]
    pub profile: Option<String>,

    /// Region used when a command has no zone to derive it from
    #[serde(default)]
    pub default_region: Option<String>,
}

fn default_aws_binary() -> String {
    "aws".to_string()
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            binary: default_aws_binary(),
            profile: None,
            default_region: None,
        }
    }
}

/// External orchestration tools
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvokerConfig {
    #[serde(default = "default_ansible_playbook")]
    pub ansible_playbook: String,

    #[serde(default = "default_ansible")]
    pub ansible: String,

    #[serde(default = "default_terraform")]
    pub terraform: String,

    #[serde(default = "default_pcluster")]
    pub pcluster: String,

    /// Interpreter the playbooks run under
    #[serde(default = "default_python_interpreter")]
    pub python_interpreter: String,
}

fn default_ansible_playbook() -> String {
    "ansible-playbook".to_string()
}

fn default_ansible() -> String {
    "ansible".to_string()
}

fn default_terraform() -> String {
    "terraform".to_string()
}

fn default_pcluster() -> String {
    "pcluster".to_string()
}

fn default_python_interpreter() -> String {
    "/usr/bin/python3".to_string()
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            ansible_playbook: default_ansible_playbook(),
            ansible: default_ansible(),
            terraform: default_terraform(),
            pcluster: default_pcluster(),
            python_interpreter: default_python_interpreter(),
        }
    }
}

/// Configuration validation errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    State(String),
    Window(String),
    Cloud(String),
    Invoker(String),
    Logging(String),
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::State(msg) => write!(f, "State: {}", msg),
            ValidationError::Window(msg) => write!(f, "Window: {}", msg),
            ValidationError::Cloud(msg) => write!(f, "Cloud: {}", msg),
            ValidationError::Invoker(msg) => write!(f, "Invoker: {}", msg),
            ValidationError::Logging(msg) => write!(f, "Logging: {}", msg),
        }
    }
}

impl std::error::Error for ValidationError {}

impl ClusterMakerConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.state.root.as_os_str().is_empty() {
            errors.push(ValidationError::State("root cannot be empty".to_string()));
        }

        if self.window.delay_secs == 0 || self.window.verbose_delay_secs == 0 {
            errors.push(ValidationError::Window(
                "delays must be at least one second".to_string(),
            ));
        }
        if self.window.line_length < 40 {
            errors.push(ValidationError::Window(format!(
                "line_length {} is too short (minimum 40)",
                self.window.line_length
            )));
        }

        if self.cloud.binary.trim().is_empty() {
            errors.push(ValidationError::Cloud("binary cannot be empty".to_string()));
        }

        for (name, value) in [
            ("ansible_playbook", &self.invoker.ansible_playbook),
            ("ansible", &self.invoker.ansible),
            ("terraform", &self.invoker.terraform),
            ("pcluster", &self.invoker.pcluster),
            ("python_interpreter", &self.invoker.python_interpreter),
        ] {
            if value.trim().is_empty() {
                errors.push(ValidationError::Invoker(format!("{} cannot be empty", name)));
            }
        }

        if !matches!(self.logging.format.as_str(), "json" | "text") {
            errors.push(ValidationError::Logging(format!(
                "format '{}' must be 'json' or 'text'",
                self.logging.format
            )));
        }
        if !matches!(self.logging.output.as_str(), "stdout" | "stderr" | "file") {
            errors.push(ValidationError::Logging(format!(
                "output '{}' must be 'stdout', 'stderr' or 'file'",
                self.logging.output
            )));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Serializes tests that touch HOME, XDG_CONFIG_HOME or CLUSTERMAKER_*.
    pub(crate) static ENV_MUTEX: Mutex<()> = Mutex::new(());

    struct EnvGuard {
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        fn set(vars: &[(&'static str, Option<&str>)]) -> Self {
            let saved = vars
                .iter()
                .map(|(name, _)| (*name, std::env::var(name).ok()))
                .collect();
            for (name, value) in vars {
                match value {
                    Some(v) => std::env::set_var(name, v),
                    None => std::env::remove_var(name),
                }
            }
            Self { saved }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => std::env::set_var(name, v),
                    None => std::env::remove_var(name),
                }
            }
        }
    }

    fn isolated_home(temp: &TempDir) -> EnvGuard {
        let home = temp.path().join("home");
        std::fs::create_dir_all(&home).unwrap();
        EnvGuard::set(&[
            ("HOME", Some(home.to_str().unwrap())),
            ("XDG_CONFIG_HOME", None),
            ("CLUSTERMAKER_ENV", None),
            ("CLUSTERMAKER_WINDOW__DELAY_SECS", None),
        ])
    }

    #[test]
    fn test_default_config() {
        let config = ClusterMakerConfig::default();
        assert_eq!(config.state.root, PathBuf::from("."));
        assert_eq!(config.window.delay_secs, 5);
        assert_eq!(config.window.verbose_delay_secs, 15);
        assert_eq!(config.cloud.binary, "aws");
        assert_eq!(config.invoker.ansible_playbook, "ansible-playbook");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut config = ClusterMakerConfig::default();
        config.window.delay_secs = 0;
        config.invoker.terraform = " ".to_string();
        config.logging.format = "xml".to_string();
        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors.contains(&ValidationError::Invoker(
            "terraform cannot be empty".to_string()
        )));
    }

    #[test]
    fn test_state_root_resolution() {
        let state = StateConfig::default();
        assert_eq!(state.resolve(Path::new("/work")), PathBuf::from("/work/."));
        let absolute = StateConfig {
            root: PathBuf::from("/var/lib/clustermaker"),
        };
        assert_eq!(
            absolute.resolve(Path::new("/work")),
            PathBuf::from("/var/lib/clustermaker")
        );
    }

    #[test]
    fn test_load_defaults_without_files() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let temp = TempDir::new().unwrap();
        let _env = isolated_home(&temp);

        let config = ConfigLoader::load(temp.path()).unwrap();
        assert_eq!(config, ClusterMakerConfig::default());
    }

    #[test]
    fn test_layering_precedence() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let temp = TempDir::new().unwrap();
        let _env = isolated_home(&temp);

        let global_dir = temp.path().join("home").join(".config").join("clustermaker");
        std::fs::create_dir_all(&global_dir).unwrap();
        std::fs::write(
            global_dir.join("config.toml"),
            "[window]\ndelay_secs = 7\nline_length = 100\n\n[cloud]\nprofile = \"global\"\n",
        )
        .unwrap();

        let workspace_dir = temp.path().join("config");
        std::fs::create_dir_all(&workspace_dir).unwrap();
        std::fs::write(
            workspace_dir.join("config.toml"),
            "[window]\ndelay_secs = 9\n\n[state]\nroot = \"state\"\n",
        )
        .unwrap();
        std::fs::write(
            workspace_dir.join("development.toml"),
            "[cloud]\nprofile = \"dev\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load(temp.path()).unwrap();
        assert_eq!(config.window.delay_secs, 9);
        assert_eq!(config.window.line_length, 100);
        assert_eq!(config.cloud.profile.as_deref(), Some("dev"));
        assert_eq!(config.state.root, PathBuf::from("state"));

        let _override = EnvGuard::set(&[("CLUSTERMAKER_WINDOW__DELAY_SECS", Some("11"))]);
        let config = ConfigLoader::load(temp.path()).unwrap();
        assert_eq!(config.window.delay_secs, 11);
    }

    #[test]
    fn test_env_selects_workspace_file() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let temp = TempDir::new().unwrap();
        let _env = isolated_home(&temp);
        let _selected = EnvGuard::set(&[("CLUSTERMAKER_ENV", Some("production"))]);

        let workspace_dir = temp.path().join("config");
        std::fs::create_dir_all(&workspace_dir).unwrap();
        std::fs::write(
            workspace_dir.join("development.toml"),
            "[window]\nbefore_teardown = true\n",
        )
        .unwrap();
        std::fs::write(
            workspace_dir.join("production.toml"),
            "[window]\nbefore_teardown = false\n",
        )
        .unwrap();

        let config = ConfigLoader::load(temp.path()).unwrap();
        assert!(!config.window.before_teardown);
    }

    #[test]
    fn test_load_from_file() {
        let temp = TempDir::new().unwrap();
        let file = temp.path().join("custom.toml");
        std::fs::write(
            &file,
            "[invoker]\npython_interpreter = \"/opt/python/bin/python3\"\n\n[logging]\nlevel = \"debug\"\n",
        )
        .unwrap();
        let config = ConfigLoader::load_from_file(&file).unwrap();
        assert_eq!(config.invoker.python_interpreter, "/opt/python/bin/python3");
        assert_eq!(config.invoker.terraform, "terraform");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_global_config_path_follows_home() {
        let _lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
        let temp = TempDir::new().unwrap();
        let _env = isolated_home(&temp);
        assert_eq!(
            global_config_path(),
            Some(
                temp.path()
                    .join("home")
                    .join(".config")
                    .join("clustermaker")
                    .join("config.toml")
            )
        );
    }
}
