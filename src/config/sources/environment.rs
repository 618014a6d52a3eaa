//! Environment source: `CLUSTERMAKER_<SECTION>__<KEY>`, e.g.
//! `CLUSTERMAKER_WINDOW__DELAY_SECS=10`.

use config::builder::DefaultState;
use config::ConfigBuilder;
use config::Environment;

pub const PREFIX: &str = "CLUSTERMAKER";

pub fn add_to_builder(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix(PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    )
}
