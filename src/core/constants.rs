//! Shared constants used across the application

/// Assistant entry appended to the log when a response cannot be fetched.
pub const FETCH_FAILED_MESSAGE: &str = "⚠️ Failed to fetch response.";

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub const DEFAULT_CHAT_PATH: &str = "api/chat";

/// Environment override for the backend base URL.
pub const BACKEND_URL_ENV: &str = "CODEX_BACKEND_URL";
