//! `set` / `unset` handling for configuration keys.

use std::fmt;

use crate::core::config::Config;

/// Errors that can occur when modifying configuration settings.
#[derive(Debug, PartialEq, Eq)]
pub enum SettingError {
    /// The provided setting key is not recognized.
    UnknownKey(String),
    /// The value could not be parsed for this key.
    InvalidValue { key: &'static str, input: String },
    /// A value is required for this key.
    MissingValue { example: &'static str },
}

impl fmt::Display for SettingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingError::UnknownKey(key) => write!(
                f,
                "Unknown config key: {key} (expected base-url, chat-path or connect-timeout)"
            ),
            SettingError::InvalidValue { key, input } => {
                write!(f, "Invalid value for {key}: {input}")
            }
            SettingError::MissingValue { example } => {
                write!(f, "A value is required. Example: {example}")
            }
        }
    }
}

impl std::error::Error for SettingError {}

/// Apply `set <key> <value>`; returns the confirmation line.
pub fn set_value(config: &mut Config, key: &str, value: &str) -> Result<String, SettingError> {
    let value = value.trim();
    match key {
        "base-url" => {
            if value.is_empty() {
                return Err(SettingError::MissingValue {
                    example: "codex-chat set base-url http://localhost:8000",
                });
            }
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(SettingError::InvalidValue {
                    key: "base-url",
                    input: value.to_string(),
                });
            }
            config.base_url = Some(value.to_string());
            Ok(format!("✅ Set base-url to: {value}"))
        }
        "chat-path" => {
            if value.is_empty() {
                return Err(SettingError::MissingValue {
                    example: "codex-chat set chat-path api/chat",
                });
            }
            config.chat_path = Some(value.to_string());
            Ok(format!("✅ Set chat-path to: {value}"))
        }
        "connect-timeout" => {
            let secs = value
                .trim_end_matches('s')
                .parse::<u64>()
                .map_err(|_| SettingError::InvalidValue {
                    key: "connect-timeout",
                    input: value.to_string(),
                })?;
            config.connect_timeout_secs = Some(secs);
            Ok(format!("✅ Set connect-timeout to: {secs}s"))
        }
        other => Err(SettingError::UnknownKey(other.to_string())),
    }
}

pub fn unset_value(config: &mut Config, key: &str) -> Result<String, SettingError> {
    match key {
        "base-url" => config.base_url = None,
        "chat-path" => config.chat_path = None,
        "connect-timeout" => config.connect_timeout_secs = None,
        other => return Err(SettingError::UnknownKey(other.to_string())),
    }
    Ok(format!("✅ Unset {key}"))
}
