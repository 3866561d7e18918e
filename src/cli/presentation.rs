//! CLI presentation: text and json formatters per command family.

mod batch;
mod provider;
mod shared;

pub use batch::{format_plan, format_report};
pub use provider::format_provider_list;
pub use shared::{format_checkpoint_summary, format_validation_result, to_json};
