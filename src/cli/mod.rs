//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod chat;
pub mod printer;
pub mod say;
pub mod settings;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::cli::chat::run_chat;
use crate::cli::say::run_say;
use crate::cli::settings::{set_value, unset_value};
use crate::core::config::{Config, ConfigError};
use crate::core::constants::BACKEND_URL_ENV;
use crate::core::session::ChatSession;
use crate::utils::logging::TranscriptLog;

#[derive(Parser)]
#[command(name = "codex-chat", version)]
#[command(about = "Chat with a streaming backend from the terminal")]
#[command(
    long_about = "codex-chat sends prompts to a chat backend and prints the reply as it streams in.\n\n\
Environment Variables:\n\
  CODEX_BACKEND_URL   Backend base URL (defaults to http://localhost:8000)\n\
  RUST_LOG            Diagnostic log filter, written to stderr (default: warn)\n\n\
Controls:\n\
  Enter             Send the message\n\
  Ctrl+C            Stop the reply in progress (quit when idle)\n\
  /quit             Quit the application"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend base URL, overriding the environment and config file
    #[arg(long, global = true, value_name = "URL")]
    pub base_url: Option<String>,

    /// Append the conversation transcript to this file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat,
    /// Send one prompt and print the reply
    Say {
        /// Prompt text; multiple words are joined with spaces
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Set a configuration value, or print the configuration when no value is given
    Set {
        /// Configuration key (base-url, chat-path, connect-timeout)
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset a configuration value
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config_or_default() -> Result<Config, ConfigError> {
    match Config::load() {
        Err(ConfigError::NoConfigDir) => {
            tracing::debug!("no config directory available, using defaults");
            Ok(Config::default())
        }
        other => other,
    }
}

fn build_session(config: &Config, base_url: Option<&str>) -> Result<ChatSession, Box<dyn Error>> {
    let env_url = std::env::var(BACKEND_URL_ENV).ok();
    let settings = config.resolve(base_url, env_url.as_deref());
    tracing::debug!(url = %settings.chat_url(), "resolved chat endpoint");
    Ok(ChatSession::from_settings(&settings)?)
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let config = load_config_or_default()?;
            let session = build_session(&config, args.base_url.as_deref())?;
            let transcript = TranscriptLog::new(args.log)?;
            run_chat(session, transcript).await
        }
        Commands::Say { prompt } => {
            let config = load_config_or_default()?;
            let session = build_session(&config, args.base_url.as_deref())?;
            let transcript = TranscriptLog::new(args.log)?;
            run_say(session, transcript, prompt).await
        }
        Commands::Set { key, value } => {
            let mut config = Config::load()?;
            let value = value.map(|parts| parts.join(" ")).unwrap_or_default();
            match key {
                Some(key) if !value.is_empty() => match set_value(&mut config, &key, &value) {
                    Ok(message) => {
                        config.save()?;
                        println!("{message}");
                    }
                    Err(err) => {
                        eprintln!("❌ {err}");
                        std::process::exit(1);
                    }
                },
                _ => config.print_all(),
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = Config::load()?;
            match unset_value(&mut config, &key) {
                Ok(message) => {
                    config.save()?;
                    println!("{message}");
                }
                Err(err) => {
                    eprintln!("❌ {err}");
                    std::process::exit(1);
                }
            }
            Ok(())
        }
    }
}
