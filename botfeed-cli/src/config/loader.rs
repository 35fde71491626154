use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use botfeed_agent::AgentConfig;
use botfeed_core::{DatafeedConfig, StaticAuthSession};
use secrecy::SecretString;

use super::types::{
    AuthSection, BotfeedConfig, RawAgentSection, RawAuthSection, RawBotfeedConfig,
    RawDatafeedSection, RawRetrySection,
};

/// Environment variable overriding `auth.session_token`
pub const SESSION_TOKEN_ENV: &str = "BOTFEED_SESSION_TOKEN";
/// Environment variable overriding `auth.key_manager_token`
pub const KM_TOKEN_ENV: &str = "BOTFEED_KM_TOKEN";
/// Environment variable overriding the project config directory
pub const PROJECT_CONFIG_DIR_ENV: &str = "BOTFEED_PROJECT_CONFIG_DIR";

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project + environment)
    pub fn load() -> Result<BotfeedConfig> {
        let layers = [Self::user_config_path(), Self::project_config_path()];
        let mut raw = Self::load_layers(&layers)?;
        Self::apply_env(&mut raw);
        Ok(Self::finalize(raw))
    }

    /// Get user config path (`$XDG_CONFIG_HOME/botfeed/config.toml`)
    pub fn user_config_path() -> PathBuf {
        botfeed_paths::user_config_file()
    }

    /// Get project config path
    /// Can be overridden with BOTFEED_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var(PROJECT_CONFIG_DIR_ENV) {
            PathBuf::from(dir).join(botfeed_paths::CONFIG_FILE_NAME)
        } else {
            PathBuf::from(".botfeed").join(botfeed_paths::CONFIG_FILE_NAME)
        }
    }

    /// Read and merge config files in order; later files win, missing files are skipped.
    fn load_layers(paths: &[PathBuf]) -> Result<RawBotfeedConfig> {
        let mut raw = RawBotfeedConfig::default();
        for path in paths {
            if let Some(layer) = Self::read_raw(path)? {
                raw = Self::merge_raw(raw, layer);
            }
        }
        Ok(raw)
    }

    fn read_raw(path: &Path) -> Result<Option<RawBotfeedConfig>> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let raw = toml::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(Some(raw))
    }

    /// Token environment variables override both files.
    fn apply_env(raw: &mut RawBotfeedConfig) {
        if let Ok(token) = std::env::var(SESSION_TOKEN_ENV) {
            raw.auth.session_token = Some(token);
        }
        if let Ok(token) = std::env::var(KM_TOKEN_ENV) {
            raw.auth.key_manager_token = Some(token);
        }
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawBotfeedConfig, overlay: RawBotfeedConfig) -> RawBotfeedConfig {
        RawBotfeedConfig {
            agent: RawAgentSection {
                base_url: overlay.agent.base_url.or(base.agent.base_url),
                timeout: overlay.agent.timeout.or(base.agent.timeout),
            },
            auth: RawAuthSection {
                session_token: overlay.auth.session_token.or(base.auth.session_token),
                key_manager_token: overlay.auth.key_manager_token.or(base.auth.key_manager_token),
            },
            datafeed: RawDatafeedSection {
                bot_username: overlay.datafeed.bot_username.or(base.datafeed.bot_username),
                setup_attempts: overlay.datafeed.setup_attempts.or(base.datafeed.setup_attempts),
                retry: RawRetrySection {
                    initial_interval: overlay
                        .datafeed
                        .retry
                        .initial_interval
                        .or(base.datafeed.retry.initial_interval),
                    multiplier: overlay
                        .datafeed
                        .retry
                        .multiplier
                        .or(base.datafeed.retry.multiplier),
                    max_interval: overlay
                        .datafeed
                        .retry
                        .max_interval
                        .or(base.datafeed.retry.max_interval),
                },
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawBotfeedConfig) -> BotfeedConfig {
        let agent_defaults = AgentConfig::default();
        let datafeed_defaults = DatafeedConfig::default();

        BotfeedConfig {
            agent: AgentConfig {
                base_url: raw.agent.base_url.unwrap_or(agent_defaults.base_url),
                timeout: raw.agent.timeout.unwrap_or(agent_defaults.timeout),
            },
            auth: AuthSection {
                session_token: raw.auth.session_token.map(SecretString::from),
                key_manager_token: raw.auth.key_manager_token.map(SecretString::from),
            },
            datafeed: DatafeedConfig {
                retry: raw.datafeed.retry.finalize(),
                setup_attempts: raw
                    .datafeed
                    .setup_attempts
                    .unwrap_or(datafeed_defaults.setup_attempts),
                bot_username: raw.datafeed.bot_username,
            },
        }
    }
}

impl BotfeedConfig {
    /// Auth session over the configured tokens.
    pub fn auth_session(&self) -> Result<StaticAuthSession> {
        let (session, key_manager) = self.auth.tokens().with_context(|| {
            format!(
                "Agent tokens not configured: set auth.session_token and \
                 auth.key_manager_token, or {SESSION_TOKEN_ENV} and {KM_TOKEN_ENV}"
            )
        })?;
        Ok(StaticAuthSession::new(session, key_manager))
    }
}
