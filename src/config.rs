//! Runner configuration, loaded from file and environment

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// What to do when a resolved checksum disagrees with the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DriftPolicy {
    /// Log each drifted migration and continue
    #[default]
    Warn,
    /// Refuse to migrate until the drift is resolved
    Fail,
}

/// What a failed migration leaves behind in the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Roll back the unit of work, then record a FAILED row in a fresh
    /// transaction so the failure survives for the next run to see
    #[default]
    MarkFailed,
    /// Roll back the unit of work and leave the ledger untouched
    Rollback,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MigrationConfig {
    /// Name of the ledger table
    #[serde(default = "default_table")]
    pub table: String,
    #[serde(default)]
    pub drift: DriftPolicy,
    #[serde(default)]
    pub on_failure: FailurePolicy,
    /// Allow pending migrations below the current version to run
    #[serde(default)]
    pub out_of_order: bool,
    #[serde(default = "default_baseline_version")]
    pub baseline_version: String,
    #[serde(default = "default_baseline_description")]
    pub baseline_description: String,
}

fn default_table() -> String {
    "schema_version".to_string()
}

fn default_baseline_version() -> String {
    "1".to_string()
}

fn default_baseline_description() -> String {
    "initial schema".to_string()
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            table: default_table(),
            drift: DriftPolicy::default(),
            on_failure: FailurePolicy::default(),
            out_of_order: false,
            baseline_version: default_baseline_version(),
            baseline_description: default_baseline_description(),
        }
    }
}

impl MigrationConfig {
    /// Load the `[migrations]` section from `config/floodgate.toml`, falling back to env vars.
    pub fn load() -> Result<Self, ConfigError> {
        // Build configuration by reading the TOML file (optional) and environment variables
        let builder = Config::builder()
            .add_source(File::with_name("config/floodgate.toml").required(false))
            .add_source(Environment::with_prefix("FLOODGATE").separator("__"));

        // Try to build the configuration, handling missing or unreadable file
        let settings = match builder.build() {
            Ok(cfg) => cfg,
            Err(err) => {
                // If the file existed but was unreadable (parse error, permission issue, etc.), warn and retry with env only
                if std::path::Path::new("config/floodgate.toml").exists() {
                    log::warn!("failed to load config file, falling back to env: {err}");
                }
                // Retry using only environment variables as source
                Config::builder()
                    .add_source(Environment::with_prefix("FLOODGATE").separator("__"))
                    .build()
                    .map_err(|env_err| {
                        ConfigError::Message(format!(
                            "Failed to load configuration from file and env: {}, then env-only error: {}",
                            err, env_err
                        ))
                    })?
            }
        };

        // A missing section just means defaults everywhere
        match settings.get::<MigrationConfig>("migrations") {
            Ok(config) => Ok(config),
            Err(ConfigError::NotFound(_)) => Ok(Self::default()),
            Err(err) => Err(ConfigError::Message(format!(
                "Migration configuration could not be loaded from file or environment: {}",
                err
            ))),
        }
    }
}
