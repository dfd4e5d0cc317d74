use std::{collections::HashMap, fs, path::Path};

use tracing::warn;

use crate::optimistic::{
    FallbackMessages, DEFAULT_DELETE_FAILED, DEFAULT_NETWORK_ERROR, DEFAULT_UPSERT_FAILED,
};

pub const DEFAULT_SETTINGS_FILE: &str = "client.toml";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientSettings {
    pub server_url: String,
    /// Applies to the HTTP client only. The coordinator waits for the remote
    /// however long it takes.
    pub http_timeout_seconds: Option<u64>,
    pub strict_keys: bool,
    pub upsert_failed_message: String,
    pub delete_failed_message: String,
    pub network_error_message: String,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            server_url: "http://127.0.0.1:8080".into(),
            http_timeout_seconds: None,
            strict_keys: false,
            upsert_failed_message: DEFAULT_UPSERT_FAILED.into(),
            delete_failed_message: DEFAULT_DELETE_FAILED.into(),
            network_error_message: DEFAULT_NETWORK_ERROR.into(),
        }
    }
}

impl ClientSettings {
    pub fn fallback_messages(&self) -> FallbackMessages {
        FallbackMessages {
            upsert_failed: self.upsert_failed_message.clone(),
            delete_failed: self.delete_failed_message.clone(),
            network_error: self.network_error_message.clone(),
        }
    }
}

pub fn load_settings() -> ClientSettings {
    load_settings_from(Path::new(DEFAULT_SETTINGS_FILE), |name| {
        std::env::var(name).ok()
    })
}

/// Defaults, then the flat `key = "value"` file at `path` if readable, then
/// environment variables looked up through `env`.
pub fn load_settings_from(path: &Path, env: impl Fn(&str) -> Option<String>) -> ClientSettings {
    let mut settings = ClientSettings::default();

    if let Ok(raw) = fs::read_to_string(path) {
        match toml::from_str::<HashMap<String, String>>(&raw) {
            Ok(file_cfg) => {
                for (key, value) in &file_cfg {
                    apply(&mut settings, key, value);
                }
            }
            Err(err) => warn!(path = %path.display(), error = %err, "ignoring malformed settings file"),
        }
    }

    for (var, key) in [
        ("SERVER_URL", "server_url"),
        ("APP__SERVER_URL", "server_url"),
        ("APP__HTTP_TIMEOUT_SECONDS", "http_timeout_seconds"),
        ("APP__STRICT_KEYS", "strict_keys"),
        ("APP__FEEDBACK_SUBMIT_FAILED", "upsert_failed_message"),
        ("APP__FEEDBACK_REMOVE_FAILED", "delete_failed_message"),
        ("APP__NETWORK_ERROR", "network_error_message"),
    ] {
        if let Some(value) = env(var) {
            apply(&mut settings, key, &value);
        }
    }

    settings
}

fn apply(settings: &mut ClientSettings, key: &str, value: &str) {
    match key {
        "server_url" => settings.server_url = value.trim().to_string(),
        "http_timeout_seconds" => match value.trim().parse::<u64>() {
            Ok(0) => settings.http_timeout_seconds = None,
            Ok(seconds) => settings.http_timeout_seconds = Some(seconds),
            Err(_) => warn!(key, value, "ignoring non-numeric timeout"),
        },
        "strict_keys" => match parse_bool(value) {
            Some(strict) => settings.strict_keys = strict,
            None => warn!(key, value, "ignoring non-boolean setting"),
        },
        "upsert_failed_message" => settings.upsert_failed_message = value.to_string(),
        "delete_failed_message" => settings.delete_failed_message = value.to_string(),
        "network_error_message" => settings.network_error_message = value.to_string(),
        other => warn!(key = other, "ignoring unknown setting"),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
