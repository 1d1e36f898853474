pub mod loader;
pub mod schema;

pub use loader::{
    default_config, load_from_path, load_from_str, resolve_config, ConfigError, ConfigSource,
    CONFIG_FILE_NAME, DEFAULT_CONFIG,
};
pub use schema::{
    CommandDefinition, ExampleBadges, Metadata, PermalinkDefinition, ReleaseConfig,
    RuleDefinition, TargetDefinition, ValidationError, ValidationIssue, DEFAULT_BADGE_TEMPLATE,
};
