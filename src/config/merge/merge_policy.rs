//! Merge rules: defaults, override order, conflict handling.
//!
//! Tables merge key by key across layers; arrays (such as `[[providers]]`) are replaced
//! wholesale by the highest layer that sets them.

use config::Config;
use config::ConfigBuilder;
use config::ConfigError;
use config::Environment;

/// Prefix of `ADBATCH__SECTION__KEY` overrides.
pub const ENV_PREFIX: &str = "ADBATCH";
pub const ENV_SEPARATOR: &str = "__";

/// Create a Config builder with merge policy defaults applied.
pub fn builder_with_defaults() -> Result<ConfigBuilder<config::builder::DefaultState>, ConfigError>
{
    Config::builder()
        .set_default("dispatch.concurrency", 3)?
        .set_default("dispatch.max_retries", 3)?
        .set_default("output.dir", "./product_ads")
}

/// Environment layer, applied last.
pub fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator(ENV_SEPARATOR)
        .separator(ENV_SEPARATOR)
        .try_parsing(true)
}
