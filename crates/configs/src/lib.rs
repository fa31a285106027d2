//! # configs
//!
//! Typed runtime settings for the voting core, layered from an optional
//! `agora.toml` file and `AGORA_`-prefixed environment variables (with a
//! `.env` overlay in development). Policy values — the persuasion window,
//! rate-limit quotas, the sweeper interval — live here so nothing in
//! `services` hard-codes them.

use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Deadline/phase policy.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct VotingSettings {
    /// Length of the persuasion window preceding a deadline, in seconds.
    pub persuasion_window_secs: u64,
}

impl Default for VotingSettings {
    fn default() -> Self {
        VotingSettings { persuasion_window_secs: 3600 }
    }
}

impl VotingSettings {
    pub fn persuasion_window(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.persuasion_window_secs as i64)
    }
}

/// Client-side fixed-window rate limits. Advisory; the server keeps its
/// own authoritative limits.
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(default)]
pub struct RateLimitSettings {
    pub vote_capacity: u32,
    pub vote_window_secs: u64,
    pub comment_capacity: u32,
    pub comment_window_secs: u64,
    /// How often elapsed window entries are swept out of memory.
    pub sweep_interval_secs: u64,
}

impl Default for RateLimitSettings {
    fn default() -> Self {
        RateLimitSettings {
            vote_capacity: 10,
            vote_window_secs: 60,
            comment_capacity: 5,
            comment_window_secs: 60,
            sweep_interval_secs: 30,
        }
    }
}

impl RateLimitSettings {
    pub fn sweep_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.sweep_interval_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub voting: VotingSettings,
    pub rate_limits: RateLimitSettings,
}

impl Settings {
    /// Load settings: defaults, then `agora.toml` if present, then
    /// `AGORA_*` environment variables (e.g.
    /// `AGORA_VOTING__PERSUASION_WINDOW_SECS=1800`).
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let settings: Settings = config::Config::builder()
            .add_source(config::File::with_name("agora").required(false))
            .add_source(config::Environment::with_prefix("AGORA").separator("__"))
            .build()?
            .try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.voting.persuasion_window_secs == 0 {
            return Err(ConfigError::Invalid(
                "voting.persuasion_window_secs must be positive".into(),
            ));
        }
        if self.rate_limits.vote_capacity == 0 || self.rate_limits.comment_capacity == 0 {
            return Err(ConfigError::Invalid("rate limit capacities must be positive".into()));
        }
        Ok(())
    }
}

/// Install the global tracing subscriber, honoring `RUST_LOG` and
/// defaulting to `info`. Call once at startup; repeated calls are no-ops.
pub fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
