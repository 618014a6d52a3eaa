//! CLI domain: parse, route, output, and presentation only.
//! No workflow logic; the single route table dispatches to `workflow`.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{
    Cli, ClusterBuildArgs, ClusterCommands, ClusterDestroyArgs, Commands, JumphostBuildArgs,
    JumphostCommands, JumphostDestroyArgs, StackArgs,
};
pub use presentation::{
    format_build_report, format_stack_list_text, format_stack_show_text, format_teardown_report,
    StackSummary,
};
pub use route::RunContext;
