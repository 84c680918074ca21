use crate::core::config::data::Config;
use crate::core::constants::{DEFAULT_BASE_URL, DEFAULT_CHAT_PATH};

impl Config {
    pub fn print_all(&self) {
        println!("Current configuration:");
        match &self.base_url {
            Some(url) => println!("  base-url: {url}"),
            None => println!("  base-url: (unset, default {DEFAULT_BASE_URL})"),
        }
        match &self.chat_path {
            Some(path) => println!("  chat-path: {path}"),
            None => println!("  chat-path: (unset, default {DEFAULT_CHAT_PATH})"),
        }
        match self.connect_timeout_secs {
            Some(secs) => println!("  connect-timeout: {secs}s"),
            None => println!("  connect-timeout: (unset)"),
        }
    }
}
