use std::{
    collections::HashSet,
    env,
    path::{Path, PathBuf},
};

use anyhow::Context;
use config as cfg;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::Result;

/// Capacity used when neither the caller nor the settings name one.
pub const DEFAULT_MAX_SIZE: usize = 10_000;

/// Per-cache override of the tracked entry bound.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct NamedCacheSettings {
    pub name: String,
    #[serde(default)]
    pub max_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheSettings {
    #[serde(default = "CacheSettings::default_max_size")]
    pub default_max_size: usize,
    #[serde(default)]
    pub caches: Vec<NamedCacheSettings>,
}

impl CacheSettings {
    fn default_max_size() -> usize {
        DEFAULT_MAX_SIZE
    }

    /// Effective bound for the cache registered under `name`.
    pub fn max_size_for(&self, name: &str) -> usize {
        self.caches
            .iter()
            .find(|c| c.name == name)
            .and_then(|c| c.max_size)
            .unwrap_or(self.default_max_size)
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            default_max_size: Self::default_max_size(),
            caches: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct LoggingConfig {
    #[serde(default = "LoggingConfig::default_level")]
    pub level: String,
    /// Emit JSON lines instead of the human readable format
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    fn default_level() -> String {
        "info".to_string()
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            json: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Settings {
    #[serde(default = "Settings::default_env")]
    pub env: String,
    #[serde(default)]
    pub cache: CacheSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            env: Self::default_env(),
            cache: CacheSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    fn default_env() -> String {
        env::var("APP_ENV")
            .ok()
            .or_else(|| env::var("RUST_ENV").ok())
            .unwrap_or_else(|| "development".to_string())
    }

    pub fn max_size_for(&self, name: &str) -> usize {
        self.cache.max_size_for(name)
    }

    pub fn validate(&self) -> Result<()> {
        self.check().map_err(Into::into)
    }

    fn check(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.cache.default_max_size > 0,
            "cache.default_max_size must be > 0"
        );

        let mut seen = HashSet::new();
        for named in &self.cache.caches {
            anyhow::ensure!(
                !named.name.trim().is_empty(),
                "cache.caches[].name cannot be empty"
            );
            anyhow::ensure!(
                seen.insert(named.name.as_str()),
                "cache.caches contains duplicate name {:?}",
                named.name
            );
            if let Some(max_size) = named.max_size {
                anyhow::ensure!(
                    max_size > 0,
                    "cache.caches[{}].max_size must be > 0",
                    named.name
                );
            }
        }

        anyhow::ensure!(
            !self.logging.level.trim().is_empty(),
            "logging.level cannot be empty"
        );
        Ok(())
    }

    /// Directory consulted by [`Settings::load`] when none is given.
    pub fn default_config_dir() -> PathBuf {
        env::var("STREAMCHANGE_CONFIG_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("config"))
    }

    /// Load settings for the current environment from the default config dir.
    pub fn load(env_override: Option<String>) -> Result<Self> {
        let env_name = env_override.unwrap_or_else(Self::default_env);
        Self::load_from_sources(&Self::default_config_dir(), &env_name)
    }

    /// Layered load: `default.*`, `{env}.*`, `local.toml`, then
    /// `STREAMCHANGE__*` environment variables. Every file is optional.
    pub fn load_from_sources(config_dir: &Path, env_name: &str) -> Result<Self> {
        let settings = Self::build(config_dir, env_name)?;
        settings.validate()?;
        info!(
            "Loaded stream change settings for env {:?} from {:?}",
            env_name, config_dir
        );
        Ok(settings)
    }

    fn build(config_dir: &Path, env_name: &str) -> anyhow::Result<Self> {
        debug!("Reading configuration from {:?}", config_dir);
        let settings: Settings = cfg::Config::builder()
            .set_default("env", env_name)
            .context("setting default env")?
            .add_source(cfg::File::from(config_dir.join("default.toml")).required(false))
            .add_source(cfg::File::from(config_dir.join("default.yaml")).required(false))
            .add_source(cfg::File::from(config_dir.join("default.json")).required(false))
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.toml", env_name))).required(false),
            )
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.yaml", env_name))).required(false),
            )
            .add_source(
                cfg::File::from(config_dir.join(format!("{}.json", env_name))).required(false),
            )
            .add_source(cfg::File::from(config_dir.join("local.toml")).required(false))
            .add_source(cfg::Environment::with_prefix("STREAMCHANGE").separator("__"))
            .build()
            .context("building configuration")?
            .try_deserialize()
            .context("deserializing configuration")?;
        Ok(settings)
    }
}
