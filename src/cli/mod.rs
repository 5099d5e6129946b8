//! Command-line interface parsing and handling
//!
//! This module handles parsing command-line arguments and executing the appropriate commands.

pub mod model_list;

use std::error::Error;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::cli::model_list::list_models;
use crate::core::config::{Config, ConfigKey, Overrides, Settings};
use crate::logging;
use crate::ui::console::run_chat;

#[derive(Parser, Debug)]
#[command(name = "devdoc")]
#[command(about = "Stream chat replies from a DevDoc backend in the terminal")]
#[command(
    long_about = "DevDoc is a line-oriented chat client for a DevDoc backend. Each line you type \
is sent as the next user turn and the reply is streamed back as it arrives.\n\n\
Credentials:\n\
  The bearer token is read from the system keyring (service 'devdoc', user 'backend'),\n\
  falling back to the DEVDOC_API_KEY environment variable.\n\n\
Commands inside a chat:\n\
  /model <id>       Switch model (not while a reply is streaming)\n\
  /models           List available models\n\
  /quit             Exit"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Model to use for chat, or list available models if no model specified
    #[arg(short = 'm', long, global = true, value_name = "MODEL", num_args = 0..=1, default_missing_value = "")]
    pub model: Option<String>,

    /// Backend chat endpoint, overriding the configured one
    #[arg(short = 'e', long, global = true, value_name = "URL")]
    pub endpoint: Option<String>,

    /// Write diagnostics to the specified file
    #[arg(short = 'l', long, global = true, value_name = "FILE")]
    pub log: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the chat interface (default)
    Chat,
    /// List available models
    Models,
    /// Show the resolved configuration, including --model and --endpoint
    Config,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: String,
        /// Value to set for the key (can be multiple words for system-prompt)
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Option<Vec<String>>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

pub fn main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    logging::init(args.log.as_deref())?;
    tokio::runtime::Runtime::new()?.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let overrides = Overrides {
        model: args.model.clone().filter(|model| !model.is_empty()),
        endpoint: args.endpoint.clone(),
    };
    match args.command.unwrap_or(Commands::Chat) {
        Commands::Models => {
            let config = Config::load()?;
            list_models(config.effective_model());
            Ok(())
        }
        Commands::Config => {
            Config::load()?.print_resolved(&overrides)?;
            Ok(())
        }
        Commands::Set { key, value } => {
            let key: ConfigKey = key.parse()?;
            match value.filter(|parts| !parts.is_empty()) {
                Some(parts) => {
                    let value = parts.join(" ");
                    Config::update(|config| config.set(key, &value))?;
                    println!("Set {key} to: {value}");
                }
                None => Config::load()?.print_resolved(&overrides)?,
            }
            Ok(())
        }
        Commands::Unset { key } => {
            let key: ConfigKey = key.parse()?;
            Config::update(|config| {
                config.unset(key);
                Ok(())
            })?;
            println!("Unset {key}");
            Ok(())
        }
        Commands::Chat => {
            let config = Config::load()?;
            match args.model.as_deref() {
                // -m was provided without a value, list available models
                Some("") => {
                    list_models(config.effective_model());
                    Ok(())
                }
                _ => {
                    let settings = Settings::resolve(&config, &overrides)?;
                    run_chat(settings).await
                }
            }
        }
    }
}
