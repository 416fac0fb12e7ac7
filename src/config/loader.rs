use std::path::Path;

use config::{Config, Environment, File, FileFormat, Map};
use eyre::{Context, Result};

use crate::config::models::ServiceConfig;

/// Prefix for environment overrides, e.g. `TRELLIS__PORT=8080`
pub const ENV_PREFIX: &str = "TRELLIS";

/// Load configuration from a file using the config crate
/// Supports multiple formats: YAML, JSON, TOML, etc.
pub async fn load_config(config_path: &str) -> Result<ServiceConfig> {
    load_config_sync(config_path)
}

/// Load configuration synchronously, layering environment overrides on top of the file
pub fn load_config_sync(config_path: &str) -> Result<ServiceConfig> {
    load_with_env(config_path, None)
}

/// `env` replaces the process environment when given.
fn load_with_env(config_path: &str, env: Option<Map<String, String>>) -> Result<ServiceConfig> {
    let config_path = Path::new(config_path);

    // Determine file format based on extension
    let format = match config_path.extension().and_then(|ext| ext.to_str()) {
        Some("yaml") | Some("yml") => FileFormat::Yaml,
        Some("json") => FileFormat::Json,
        Some("ini") => FileFormat::Ini,
        _ => FileFormat::Toml, // Default to TOML
    };

    let settings = Config::builder()
        .add_source(File::new(
            config_path
                .to_str()
                .ok_or_else(|| eyre::eyre!("Invalid UTF-8 path: {}", config_path.display()))?,
            format,
        ))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env),
        )
        .build()
        .with_context(|| format!("Failed to build config from {}", config_path.display()))?;

    let service_config: ServiceConfig = settings.try_deserialize().with_context(|| {
        format!(
            "Failed to deserialize config from {}",
            config_path.display()
        )
    })?;

    Ok(service_config)
}
