//! Merge rules: defaults, override order, conflict handling.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;

/// Create a Config builder with merge policy defaults applied.
///
/// Later sources override these key by key; tables are merged, not replaced.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("state.root", ".")?
        .set_default("window.delay_secs", 5)?
        .set_default("window.verbose_delay_secs", 15)?
        .set_default("window.line_length", 80)?
        .set_default("window.before_teardown", true)?
        .set_default("cloud.binary", "aws")?
        .set_default("invoker.ansible_playbook", "ansible-playbook")?
        .set_default("invoker.ansible", "ansible")?
        .set_default("invoker.terraform", "terraform")?
        .set_default("invoker.pcluster", "pcluster")?
        .set_default("invoker.python_interpreter", "/usr/bin/python3")
}
