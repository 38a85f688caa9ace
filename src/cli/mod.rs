//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

use std::error::Error;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::BufReader;
use tracing::info;

use crate::core::app::ChatApp;
use crate::core::chat_stream::HttpChatClient;
use crate::core::config::data::API_BASE_URL_ENV;
use crate::core::config::Config;
use crate::ui::repl::run_repl;
use crate::utils::logging::init_tracing;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("VERGEN_GIT_SHA"),
    ", built ",
    env!("VERGEN_BUILD_DATE"),
    ")"
);

#[derive(Parser)]
#[command(name = "causerie")]
#[command(version = VERSION)]
#[command(about = "A terminal chat client for a streaming chat backend")]
#[command(
    long_about = "Causerie signs in to a chat backend and keeps several conversations side by side. \
Replies stream into the terminal as the backend produces them.\n\n\
Environment Variables:\n\
  CAUSERIE_API_BASE_URL   Backend base URL (overrides the config file)\n\
  RUST_LOG                Diagnostic log filter (defaults to warn)\n\n\
Commands inside the chat:\n\
  /new              Start a new chat\n\
  /sessions         List chats, newest first\n\
  /switch <n>       Switch to chat number <n>\n\
  /logout           Sign out and forget every chat\n\
  /quit             Exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Backend base URL, e.g. http://localhost:8000/api
    #[arg(short = 'u', long, global = true, value_name = "URL")]
    pub api_base_url: Option<String>,

    /// Write diagnostic logs to this file instead of stderr
    #[arg(short = 'l', long, global = true, value_name = "PATH")]
    pub log: Option<PathBuf>,

    /// Email to sign in with (the password is still prompted for)
    #[arg(short = 'e', long, global = true)]
    pub email: Option<String>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// Print the current configuration
    Config,
    /// Set configuration values
    Set {
        /// Configuration key to set (api-base-url)
        key: String,
        /// Value to set for the key
        value: String,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    tokio::runtime::Runtime::new()?.block_on(async_main())
}

async fn async_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    init_tracing(args.log.as_deref())?;

    let config = Config::load()?;
    let env_base_url = std::env::var(API_BASE_URL_ENV).ok();
    let base_url = config.resolve_api_base_url(args.api_base_url.as_deref(), env_base_url.as_deref());

    match args.command.unwrap_or(Commands::Chat) {
        Commands::Chat => {
            let backend = Arc::new(HttpChatClient::new(base_url));
            info!(base_url = %backend.base_url(), "starting chat");
            let mut app = ChatApp::new(backend);
            let mut stdout = io::stdout();
            run_repl(
                &mut app,
                BufReader::new(tokio::io::stdin()),
                &mut stdout,
                args.email,
            )
            .await
        }
        Commands::Config => {
            config.print_all(&base_url);
            Ok(())
        }
        Commands::Set { key, value } => {
            let mut config = config;
            config.set_value(&key, &value)?;
            let path = config.save()?;
            println!("✅ Set {key} to: {value}");
            info!(path = %path.display(), "config saved");
            Ok(())
        }
        Commands::Unset { key } => {
            let mut config = config;
            config.unset_value(&key)?;
            config.save()?;
            println!("✅ Unset {key}");
            Ok(())
        }
    }
}
