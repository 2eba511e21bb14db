use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use url::Url;

pub const DEFAULT_SERVER: &str = "http://127.0.0.1:8000";
pub const DEFAULT_ENDPOINT: &str = "/api/chat/";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid chat endpoint {endpoint:?}: {source}")]
    InvalidEndpoint {
        endpoint: String,
        #[source]
        source: url::ParseError,
    },
}

/// Built-in message sets. Each one matches a deployment of the widget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Profile {
    #[default]
    English,
    Persian,
}

/// Bot messages shown when the server gives no usable answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FallbackMessages {
    /// Success response without an `answer`.
    pub no_answer: String,
    /// The request never completed or its body could not be parsed.
    pub connection_error: String,
    /// Appended to a server error when the error body is empty.
    pub retry_prompt: String,
    /// Label in front of the status code of a failed request.
    pub server_error: String,
}

impl FallbackMessages {
    pub fn english() -> Self {
        Self {
            no_answer: "Sorry, I could not find an answer.".to_string(),
            connection_error: "❌ Connection error. Please check the server and try again.".to_string(),
            retry_prompt: "Please try again.".to_string(),
            server_error: "Server error".to_string(),
        }
    }

    pub fn persian() -> Self {
        Self {
            no_answer: "خطایی رخ داد.".to_string(),
            connection_error: "❌ خطا در ارتباط با سرور".to_string(),
            retry_prompt: "لطفاً دوباره تلاش کنید.".to_string(),
            server_error: "خطای سرور".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetConfig {
    /// Absolute URL the widget posts to.
    pub endpoint: String,
    pub fallback_messages: FallbackMessages,
    pub has_typing_indicator: bool,
}

impl WidgetConfig {
    pub fn preset(profile: Profile) -> Self {
        let endpoint = format!("{}{}", DEFAULT_SERVER, DEFAULT_ENDPOINT);
        match profile {
            Profile::English => Self {
                endpoint,
                fallback_messages: FallbackMessages::english(),
                has_typing_indicator: true,
            },
            Profile::Persian => Self {
                endpoint,
                fallback_messages: FallbackMessages::persian(),
                has_typing_indicator: false,
            },
        }
    }

    /// Layer the config file and then `overrides` on top of the selected preset.
    pub fn build(file: ConfigFile, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let profile = overrides.profile.or(file.profile).unwrap_or_default();
        let mut config = Self::preset(profile);

        if let Some(messages) = file.fallback_messages {
            messages.apply_to(&mut config.fallback_messages);
        }
        if let Some(has_typing_indicator) = file.has_typing_indicator {
            config.has_typing_indicator = has_typing_indicator;
        }
        if overrides.no_typing {
            config.has_typing_indicator = false;
        }

        let server = overrides
            .server
            .as_deref()
            .or(file.server.as_deref())
            .unwrap_or(DEFAULT_SERVER);
        let endpoint = overrides
            .endpoint
            .as_deref()
            .or(file.endpoint.as_deref())
            .unwrap_or(DEFAULT_ENDPOINT);
        config.endpoint = resolve_endpoint(server, endpoint)?.to_string();

        debug!("Resolved widget config: {:?}", config);
        Ok(config)
    }
}

/// Settings given on the command line or through the environment.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub profile: Option<Profile>,
    pub server: Option<String>,
    pub endpoint: Option<String>,
    pub no_typing: bool,
}

/// On-disk configuration. Every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConfigFile {
    pub profile: Option<Profile>,
    pub server: Option<String>,
    pub endpoint: Option<String>,
    pub has_typing_indicator: Option<bool>,
    pub fallback_messages: Option<PartialFallbackMessages>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PartialFallbackMessages {
    pub no_answer: Option<String>,
    pub connection_error: Option<String>,
    pub retry_prompt: Option<String>,
    pub server_error: Option<String>,
}

impl PartialFallbackMessages {
    fn apply_to(self, messages: &mut FallbackMessages) {
        if let Some(no_answer) = self.no_answer {
            messages.no_answer = no_answer;
        }
        if let Some(connection_error) = self.connection_error {
            messages.connection_error = connection_error;
        }
        if let Some(retry_prompt) = self.retry_prompt {
            messages.retry_prompt = retry_prompt;
        }
        if let Some(server_error) = self.server_error {
            messages.server_error = server_error;
        }
    }
}

impl ConfigFile {
    /// Load the user's config file, or an empty one if it does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            debug!("No config file at {}", path.display());
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("chat-widget").join("config.json"))
    }
}

/// An `http(s)` URL is used as given; anything else is a path under `server`.
pub fn resolve_endpoint(server: &str, endpoint: &str) -> Result<Url, ConfigError> {
    let invalid = |source: url::ParseError| ConfigError::InvalidEndpoint {
        endpoint: endpoint.to_string(),
        source,
    };

    if let Ok(url) = Url::parse(endpoint) {
        if matches!(url.scheme(), "http" | "https") {
            return Ok(url);
        }
    }

    let base = Url::parse(server).map_err(invalid)?;
    base.join(endpoint).map_err(invalid)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn presets_differ_in_messages_and_indicator() {
        let english = WidgetConfig::preset(Profile::English);
        let persian = WidgetConfig::preset(Profile::Persian);

        assert!(english.has_typing_indicator);
        assert!(!persian.has_typing_indicator);
        assert_ne!(english.fallback_messages, persian.fallback_messages);
        assert_eq!(english.endpoint, "http://127.0.0.1:8000/api/chat/");
    }

    #[test]
    fn endpoint_path_joins_server() {
        let url = resolve_endpoint("http://example.com:9000", "/api/chat/").unwrap();
        assert_eq!(url.as_str(), "http://example.com:9000/api/chat/");
    }

    #[test]
    fn absolute_endpoint_wins_over_server() {
        let url = resolve_endpoint("http://example.com", "https://bot.internal/chat").unwrap();
        assert_eq!(url.as_str(), "https://bot.internal/chat");
    }

    #[test]
    fn bad_server_is_rejected() {
        let err = resolve_endpoint("not a url", "/api/chat/").unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEndpoint { .. }));
    }

    #[test]
    fn overrides_beat_file_settings() {
        let file = ConfigFile {
            profile: Some(Profile::Persian),
            server: Some("http://file.example".to_string()),
            has_typing_indicator: Some(true),
            ..Default::default()
        };
        let overrides = ConfigOverrides {
            profile: Some(Profile::English),
            server: Some("http://cli.example".to_string()),
            no_typing: true,
            ..Default::default()
        };

        let config = WidgetConfig::build(file, &overrides).unwrap();
        assert_eq!(config.fallback_messages, FallbackMessages::english());
        assert_eq!(config.endpoint, "http://cli.example/api/chat/");
        assert!(!config.has_typing_indicator);
    }

    #[test]
    fn file_replaces_single_fallback_message() {
        let file: ConfigFile = serde_json::from_str(
            r#"{"profile": "persian", "fallback_messages": {"no_answer": "پاسخی پیدا نشد."}}"#,
        )
        .unwrap();

        let config = WidgetConfig::build(file, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.fallback_messages.no_answer, "پاسخی پیدا نشد.");
        assert_eq!(config.fallback_messages.connection_error, FallbackMessages::persian().connection_error);
    }

    #[test]
    fn missing_file_loads_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let file = ConfigFile::load_from(&dir.path().join("config.json")).unwrap();
        assert!(file.profile.is_none());
        assert!(file.endpoint.is_none());
    }

    #[test]
    fn file_is_read_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"endpoint": "/bot/api/chat/", "has_typing_indicator": false}"#).unwrap();

        let file = ConfigFile::load_from(&path).unwrap();
        let config = WidgetConfig::build(file, &ConfigOverrides::default()).unwrap();
        assert_eq!(config.endpoint, "http://127.0.0.1:8000/bot/api/chat/");
        assert!(!config.has_typing_indicator);
    }

    #[test]
    fn unknown_keys_are_parse_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"endpont": "/typo/"}"#).unwrap();

        let err = ConfigFile::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}
