//! CLI domain: parse, route, output, and presentation only.
//! No domain orchestration; single route table dispatches to domain services.

mod output;
mod parse;
mod presentation;
mod route;

pub use output::map_error;
pub use parse::{Cli, Commands};
pub use presentation::{
    format_checkpoint_summary, format_plan, format_provider_list, format_report,
    format_validation_result,
};
pub use route::{ProcessArgs, RunContext};
