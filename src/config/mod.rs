mod settings;

use config::{Config, ConfigError, Environment, File};

use settings::PartialSettings;

pub use settings::{HubSettings, LogSettings, ServerSettings, Settings};

/// Loads the configuration from `config/default.*` and `WSHUB_` environment
/// variables, merged over defaults.
///
/// Nested keys use a double underscore, e.g. `WSHUB_SERVER__PORT=9000` or
/// `WSHUB_HUB__DEFAULT_TOPICS=news,sports`.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(
            Environment::with_prefix("WSHUB")
                .prefix_separator("_")
                .separator("__")
                .list_separator(",")
                .with_list_parse_key("hub.default_topics")
                .try_parsing(true),
        );

    let config = builder.build()?;

    // Try to deserialize what is available, then fill the gaps.
    let partial: PartialSettings = config.try_deserialize()?;
    Ok(partial.merge_defaults())
}
