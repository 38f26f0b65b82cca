use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;

use crate::embedding::{EmbedMode, ProviderKind, Tier};
use crate::error::{MnemoError, Result};
use crate::memory::decay::DecayConfig;

/// Engine configuration, loaded from a TOML file with environment
/// overrides. Every section has complete defaults so an empty file (or
/// no file at all) yields a working synthetic-tier engine.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct MnemoConfig {
    pub storage: StorageConfig,
    pub engine: EngineConfig,
    pub provider: ProviderConfig,
    pub decay: DecayConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub db_path: String,
}

/// Scoring and graph knobs.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EngineConfig {
    pub tier: Tier,
    pub embed_mode: EmbedMode,
    /// Default floor for the query composite score.
    pub min_score: f64,
    /// Minimum mean-vector cosine for waypoint creation.
    pub waypoint_threshold: f64,
    /// Salience added to every recalled or reinforced memory.
    pub salience_reinforce_delta: f64,
    /// Weight added to every traversed waypoint.
    pub waypoint_reinforce_delta: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ProviderConfig {
    pub kind: ProviderKind,
    /// HTTP base URL. Required for `ollama` and `aws`, optional elsewhere.
    pub endpoint: Option<String>,
    /// Provider model name; per-provider default when unset.
    pub model: Option<String>,
    /// Environment variable holding the provider API key.
    pub api_key_env: String,
    /// Budget for one provider call, in seconds.
    pub timeout_secs: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_mnemo_dir()
            .join("memory.db")
            .to_string_lossy()
            .into_owned();
        Self { db_path }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tier: Tier::Fast,
            embed_mode: EmbedMode::Simple,
            min_score: 0.3,
            waypoint_threshold: 0.75,
            salience_reinforce_delta: 0.1,
            waypoint_reinforce_delta: 0.05,
        }
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            kind: ProviderKind::Synthetic,
            endpoint: None,
            model: None,
            api_key_env: "MNEMO_API_KEY".into(),
            timeout_secs: 30,
        }
    }
}

/// Returns `~/.mnemo/`.
pub fn default_mnemo_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".mnemo")
}

/// Returns the default config file path: `~/.mnemo/config.toml`.
pub fn default_config_path() -> PathBuf {
    default_mnemo_dir().join("config.toml")
}

impl MnemoConfig {
    /// Load config from the default TOML file (if it exists) then apply
    /// env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| MnemoError::Config(format!("failed to read config file: {e}")))?;
            toml::from_str(&contents)
                .map_err(|e| MnemoError::Config(format!("failed to parse config TOML: {e}")))?
        } else {
            info!("no config file at {}, using defaults", path.display());
            MnemoConfig::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply environment variable overrides (MNEMO_DB, MNEMO_TIER,
    /// MNEMO_PROVIDER, MNEMO_PROVIDER_ENDPOINT).
    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("MNEMO_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("MNEMO_TIER") {
            self.engine.tier = val.parse().map_err(MnemoError::Config)?;
        }
        if let Ok(val) = std::env::var("MNEMO_PROVIDER") {
            self.provider.kind = val.parse().map_err(MnemoError::Config)?;
        }
        if let Ok(val) = std::env::var("MNEMO_PROVIDER_ENDPOINT") {
            self.provider.endpoint = Some(val);
        }
        Ok(())
    }

    /// Resolve the database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest)
    } else {
        PathBuf::from(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = MnemoConfig::default();
        assert_eq!(config.engine.tier, Tier::Fast);
        assert_eq!(config.engine.min_score, 0.3);
        assert_eq!(config.engine.waypoint_threshold, 0.75);
        assert_eq!(config.engine.salience_reinforce_delta, 0.1);
        assert_eq!(config.engine.waypoint_reinforce_delta, 0.05);
        assert_eq!(config.provider.kind, ProviderKind::Synthetic);
        assert_eq!(config.provider.timeout_secs, 30);
        assert_eq!(config.decay.interval_minutes, 120);
        assert_eq!(config.decay.prune_weight, 0.05);
        assert_eq!(config.decay.prune_days, 7);
        assert!(config.storage.db_path.ends_with("memory.db"));
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[storage]
db_path = "/tmp/test.db"

[engine]
tier = "hybrid"
embed_mode = "advanced"
min_score = 0.4

[provider]
kind = "ollama"
endpoint = "http://localhost:11434"
model = "nomic-embed-text"

[decay]
interval_minutes = 30
"#;
        let config: MnemoConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.storage.db_path, "/tmp/test.db");
        assert_eq!(config.engine.tier, Tier::Hybrid);
        assert_eq!(config.engine.embed_mode, EmbedMode::Advanced);
        assert_eq!(config.engine.min_score, 0.4);
        assert_eq!(config.provider.kind, ProviderKind::Ollama);
        assert_eq!(
            config.provider.endpoint.as_deref(),
            Some("http://localhost:11434")
        );
        assert_eq!(config.decay.interval_minutes, 30);
        // defaults still apply for unset fields
        assert_eq!(config.engine.waypoint_threshold, 0.75);
        assert_eq!(config.decay.prune_days, 7);
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = MnemoConfig::default();
        std::env::set_var("MNEMO_DB", "/tmp/override.db");
        std::env::set_var("MNEMO_TIER", "deep");
        std::env::set_var("MNEMO_PROVIDER", "openai");

        config.apply_env_overrides().unwrap();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.engine.tier, Tier::Deep);
        assert_eq!(config.provider.kind, ProviderKind::OpenAi);

        // Clean up
        std::env::remove_var("MNEMO_DB");
        std::env::remove_var("MNEMO_TIER");
        std::env::remove_var("MNEMO_PROVIDER");
    }

    #[test]
    fn bad_env_tier_is_a_config_error() {
        let mut config = MnemoConfig::default();
        std::env::set_var("MNEMO_TIER", "turbo");
        let result = config.apply_env_overrides();
        std::env::remove_var("MNEMO_TIER");
        assert!(matches!(result, Err(MnemoError::Config(_))));
    }
}
