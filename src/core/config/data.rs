use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::core::constants::{DEFAULT_BASE_URL, DEFAULT_CHAT_PATH};
use crate::utils::url::construct_api_url;

#[derive(Debug, Serialize, Deserialize, Default, Clone, PartialEq, Eq)]
pub struct Config {
    /// Backend root, e.g. "http://localhost:8000"
    pub base_url: Option<String>,
    /// Path of the streaming endpoint relative to `base_url`
    pub chat_path: Option<String>,
    pub connect_timeout_secs: Option<u64>,
}

/// Everything a session needs to reach the backend, after overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSettings {
    pub base_url: String,
    pub chat_path: String,
    pub connect_timeout: Option<Duration>,
}

impl ChatSettings {
    pub fn chat_url(&self) -> String {
        construct_api_url(&self.base_url, &self.chat_path)
    }
}

impl Default for ChatSettings {
    fn default() -> Self {
        Config::default().resolve(None, None)
    }
}

impl Config {
    /// Merge the file values with command-line and environment overrides.
    ///
    /// The flag wins over the environment, which wins over the file. Blank
    /// values count as unset.
    pub fn resolve(&self, base_url_flag: Option<&str>, base_url_env: Option<&str>) -> ChatSettings {
        let non_blank = |value: &&str| !value.trim().is_empty();
        let base_url = base_url_flag
            .filter(non_blank)
            .or(base_url_env.filter(non_blank))
            .or(self.base_url.as_deref().filter(non_blank))
            .unwrap_or(DEFAULT_BASE_URL)
            .trim()
            .to_string();
        let chat_path = self
            .chat_path
            .as_deref()
            .filter(non_blank)
            .unwrap_or(DEFAULT_CHAT_PATH)
            .trim()
            .to_string();

        ChatSettings {
            base_url,
            chat_path,
            connect_timeout: self.connect_timeout_secs.map(Duration::from_secs),
        }
    }
}

/// Get a user-friendly display string for a path
/// Converts absolute paths to use ~ notation on Unix-like systems when possible
pub fn path_display<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();

    #[cfg(unix)]
    {
        if let Some(home) = std::env::var_os("HOME") {
            let home_path = PathBuf::from(home);
            if let Ok(relative) = path.strip_prefix(&home_path) {
                return format!("~/{}", relative.display());
            }
        }
    }

    path.display().to_string()
}
