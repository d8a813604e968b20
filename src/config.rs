//! Configuration management

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::retry::RetryPolicy;
use crate::slack::SLACK_API_BASE;

/// Relay configuration, loaded once at startup
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Slack API token (bot or legacy user token with RTM access)
    #[serde(rename = "slackApiToken", default)]
    pub slack_api_token: String,

    /// Channel every relayed message is posted to
    #[serde(rename = "timelineChannelID", default)]
    pub timeline_channel_id: String,

    /// Public channels never relayed
    #[serde(rename = "blackListChannelIDs", default)]
    pub blacklist_channel_ids: Vec<String>,

    /// SQLite database holding relay records
    #[serde(rename = "databasePath", default = "default_db_path")]
    pub db_path: PathBuf,

    /// Attempts per outbound call before giving up
    #[serde(rename = "maxAttempts", default = "default_max_attempts")]
    pub max_attempts: u32,

    /// User cache TTL in seconds (entries never expire when unset)
    #[serde(rename = "userCacheTtlSecs", default)]
    pub user_cache_ttl_secs: Option<u64>,

    /// Web API base URL
    #[serde(rename = "apiBaseUrl", default = "default_api_base_url")]
    pub api_base_url: String,
}

fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("slack-timeline")
        .join("relay.db")
}

fn default_max_attempts() -> u32 {
    10
}

fn default_api_base_url() -> String {
    SLACK_API_BASE.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            slack_api_token: String::new(),
            timeline_channel_id: String::new(),
            blacklist_channel_ids: Vec::new(),
            db_path: default_db_path(),
            max_attempts: default_max_attempts(),
            user_cache_ttl_secs: None,
            api_base_url: default_api_base_url(),
        }
    }
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        serde_json::from_str(&raw)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Let environment variables win over file values
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides(|key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(token) = lookup("SLACK_TOKEN") {
            self.slack_api_token = token;
        }

        if let Some(channel) = lookup("SLACK_TIMELINE_CHANNEL_ID") {
            self.timeline_channel_id = channel;
        }

        if let Some(ids) = lookup("SLACK_BLACKLIST_CHANNEL_IDS") {
            self.blacklist_channel_ids = ids
                .split(',')
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(path) = lookup("TIMELINE_DB_PATH") {
            self.db_path = PathBuf::from(path);
        }

        if let Some(attempts) = lookup("TIMELINE_MAX_ATTEMPTS") {
            self.max_attempts = attempts
                .parse()
                .with_context(|| format!("TIMELINE_MAX_ATTEMPTS is not a number: {}", attempts))?;
        }

        if let Some(ttl) = lookup("TIMELINE_USER_CACHE_TTL") {
            self.user_cache_ttl_secs = Some(
                ttl.parse()
                    .with_context(|| format!("TIMELINE_USER_CACHE_TTL is not a number: {}", ttl))?,
            );
        }

        Ok(())
    }

    /// Reject configurations the relay cannot start with
    pub fn validate(&self) -> Result<()> {
        if self.slack_api_token.trim().is_empty() {
            bail!("Slack API token is not set (slackApiToken / SLACK_TOKEN)");
        }
        if self.timeline_channel_id.trim().is_empty() {
            bail!("Timeline channel is not set (timelineChannelID / SLACK_TIMELINE_CHANNEL_ID)");
        }
        if self.max_attempts == 0 {
            bail!("maxAttempts must be at least 1");
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::with_attempts(self.max_attempts)
    }

    pub fn user_cache_ttl(&self) -> Option<Duration> {
        self.user_cache_ttl_secs.map(Duration::from_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_from_file_reads_json_keys() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "slackApiToken": "xoxb-1",
                "timelineChannelID": "CTIMELINE",
                "blackListChannelIDs": ["Caaa", "Cbbb"],
                "sentry": {{"dsn": "ignored"}}
            }}"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.slack_api_token, "xoxb-1");
        assert_eq!(config.timeline_channel_id, "CTIMELINE");
        assert_eq!(config.blacklist_channel_ids, vec!["Caaa", "Cbbb"]);
        assert_eq!(config.max_attempts, 10);
        assert_eq!(config.api_base_url, SLACK_API_BASE);
        assert!(config.user_cache_ttl().is_none());
    }

    #[test]
    fn test_default_db_path_under_data_dir() {
        let path = Config::default().db_path;
        assert!(path.ends_with("slack-timeline/relay.db"));
        if let Some(data_dir) = dirs::data_local_dir() {
            assert!(path.starts_with(data_dir));
        }
    }

    #[test]
    fn test_from_file_missing_is_error() {
        assert!(Config::from_file(Path::new("/nonexistent/timeline.json")).is_err());
    }

    #[test]
    fn test_env_overrides_file_values() {
        let mut config = Config {
            slack_api_token: "from-file".into(),
            timeline_channel_id: "CFILE".into(),
            ..Default::default()
        };

        config
            .apply_overrides(lookup(&[
                ("SLACK_TOKEN", "from-env"),
                ("SLACK_BLACKLIST_CHANNEL_IDS", "Caaa, Cbbb,,"),
                ("TIMELINE_MAX_ATTEMPTS", "3"),
                ("TIMELINE_USER_CACHE_TTL", "600"),
                ("TIMELINE_DB_PATH", "/tmp/relay.db"),
            ]))
            .unwrap();

        assert_eq!(config.slack_api_token, "from-env");
        assert_eq!(config.timeline_channel_id, "CFILE");
        assert_eq!(config.blacklist_channel_ids, vec!["Caaa", "Cbbb"]);
        assert_eq!(config.retry_policy().max_attempts, 3);
        assert_eq!(config.user_cache_ttl(), Some(Duration::from_secs(600)));
        assert_eq!(config.db_path, PathBuf::from("/tmp/relay.db"));
    }

    #[test]
    fn test_bad_number_is_error() {
        let mut config = Config::default();
        assert!(config
            .apply_overrides(lookup(&[("TIMELINE_MAX_ATTEMPTS", "many")]))
            .is_err());
    }

    #[test]
    fn test_validate() {
        assert!(Config::default().validate().is_err());

        let config = Config {
            slack_api_token: "xoxb-1".into(),
            timeline_channel_id: "CTIMELINE".into(),
            ..Default::default()
        };
        assert!(config.validate().is_ok());

        let config = Config {
            max_attempts: 0,
            ..config
        };
        assert!(config.validate().is_err());
    }
}
