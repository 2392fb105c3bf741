use anyhow::{Context, Result};
use std::time::Duration;

use crate::audio::retry::{self, RetryPolicy};

#[derive(Debug, Clone)]
pub struct Config {
    // Discord
    pub discord_token: String,
    pub application_id: u64,
    pub guild_id: u64,

    // Playback
    pub reconnect_timeout: Duration,
    pub retry_max_attempts: u32, // 0 = unbounded
    pub retry_backoff: Duration,

    // Extraction
    pub ytdlp_path: String,
}

impl Config {
    pub fn load() -> Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = |key: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .with_context(|| format!("{} must be set", key))
        };
        let optional = |key: &str, default: &str| {
            lookup(key)
                .filter(|value| !value.trim().is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let config = Self {
            // Discord
            discord_token: required("DISCORD_TOKEN")?,
            application_id: required("DISCORD_CLIENT_ID")?
                .trim()
                .parse()
                .context("DISCORD_CLIENT_ID must be a numeric id")?,
            guild_id: required("DISCORD_GUILD_ID")?
                .trim()
                .parse()
                .context("DISCORD_GUILD_ID must be a numeric id")?,

            // Playback
            reconnect_timeout: humantime::parse_duration(&optional("RECONNECT_TIMEOUT", "5s"))
                .context("RECONNECT_TIMEOUT must be a duration like 5s")?,
            retry_max_attempts: optional("PLAYBACK_RETRY_MAX_ATTEMPTS", "0")
                .trim()
                .parse()
                .context("PLAYBACK_RETRY_MAX_ATTEMPTS must be a number")?,
            retry_backoff: humantime::parse_duration(&optional("PLAYBACK_RETRY_BACKOFF", "0s"))
                .context("PLAYBACK_RETRY_BACKOFF must be a duration like 500ms")?,

            // Extraction
            ytdlp_path: optional("YTDLP_PATH", "yt-dlp"),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validates configuration values for correctness.
    pub fn validate(&self) -> Result<()> {
        if self.application_id == 0 {
            anyhow::bail!("DISCORD_CLIENT_ID cannot be 0");
        }

        if self.guild_id == 0 {
            anyhow::bail!("DISCORD_GUILD_ID cannot be 0");
        }

        if self.reconnect_timeout.is_zero() {
            anyhow::bail!("Reconnect timeout must be greater than 0");
        }

        Ok(())
    }

    pub fn retry_policy(&self) -> Box<dyn RetryPolicy> {
        retry::from_settings(self.retry_max_attempts, self.retry_backoff)
    }

    /// Returns a summary of the current configuration for logging.
    ///
    /// The token is never included.
    pub fn summary(&self) -> String {
        let retry = if self.retry_max_attempts == 0 {
            "unbounded".to_string()
        } else {
            format!(
                "{} attempts, {} backoff",
                self.retry_max_attempts,
                humantime::format_duration(self.retry_backoff)
            )
        };

        format!(
            "Config Summary:\n  \
            Discord: App ID {} (Guild: {})\n  \
            Playback: reconnect window {}, retry {}\n  \
            Extractor: {}",
            self.application_id,
            self.guild_id,
            humantime::format_duration(self.reconnect_timeout),
            retry,
            self.ytdlp_path,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Result<Config> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        Config::from_lookup(|key| env.get(key).cloned())
    }

    const REQUIRED: [(&str, &str); 3] = [
        ("DISCORD_TOKEN", "token"),
        ("DISCORD_CLIENT_ID", "1234"),
        ("DISCORD_GUILD_ID", "5678"),
    ];

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = config_from(&REQUIRED).unwrap();

        assert_eq!(config.discord_token, "token");
        assert_eq!(config.application_id, 1234);
        assert_eq!(config.guild_id, 5678);
        assert_eq!(config.reconnect_timeout, Duration::from_secs(5));
        assert_eq!(config.retry_max_attempts, 0);
        assert_eq!(config.retry_backoff, Duration::ZERO);
        assert_eq!(config.ytdlp_path, "yt-dlp");
    }

    #[test]
    fn missing_token_is_an_error() {
        let err = config_from(&REQUIRED[1..]).unwrap_err();
        assert!(err.to_string().contains("DISCORD_TOKEN"));
    }

    #[test]
    fn non_numeric_guild_is_an_error() {
        let err = config_from(&[
            ("DISCORD_TOKEN", "token"),
            ("DISCORD_CLIENT_ID", "1234"),
            ("DISCORD_GUILD_ID", "my-server"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("DISCORD_GUILD_ID"));
    }

    #[test]
    fn playback_settings_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("RECONNECT_TIMEOUT", "10s"),
            ("PLAYBACK_RETRY_MAX_ATTEMPTS", "3"),
            ("PLAYBACK_RETRY_BACKOFF", "500ms"),
        ]);

        let config = config_from(&pairs).unwrap();

        assert_eq!(config.reconnect_timeout, Duration::from_secs(10));
        assert_eq!(config.retry_max_attempts, 3);
        assert_eq!(config.retry_backoff, Duration::from_millis(500));
        assert!(!config.summary().contains("token"));
    }

    #[test]
    fn zero_reconnect_timeout_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("RECONNECT_TIMEOUT", "0s"));

        assert!(config_from(&pairs).is_err());
    }
}
