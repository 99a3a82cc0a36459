//! Command-line interface parsing and handling
//!
//! Each subcommand is one screen of the app: an interactive chat, one-shot
//! prompts for chat, image and transcription, and the settings commands.

pub mod chat;
pub mod media;
pub mod say;
pub mod settings;


use std::error::Error;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::api::ApiError;
use crate::core::alert::{Alert, AlertKind, AlertSink};
use crate::core::config::data::Config;
use crate::core::session::Session;
use crate::utils::tracing::init_tracing;

#[derive(Parser)]
#[command(name = "palaver")]
#[command(about = "Chat, image generation and transcription against an OpenAI-compatible API")]
#[command(
    long_about = "Palaver talks to an OpenAI-compatible API: a chat that keeps the \
conversation on screen, one-shot image generation, and transcription of audio files.\n\n\
Authentication:\n\
  Use 'palaver auth' to store your API key (system keyring by default).\n\
  'palaver status' shows whether a key is stored.\n\n\
Environment Variables:\n\
  PALAVER_CONFIG_DIR  Directory holding config.toml (optional)\n\
  PALAVER_LOG         Log filter, e.g. 'palaver=debug' (optional, defaults to warn)\n\n\
Chat commands:\n\
  /log              Pause or resume transcript logging\n\
  /quit             Leave the chat"
)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Commands {
    /// Start an interactive chat (default)
    Chat {
        /// Append every turn to this transcript file
        #[arg(short = 'l', long)]
        log: Option<PathBuf>,
    },
    /// Send a single prompt and print the reply
    Say {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Generate an image and print its URL
    Image {
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        prompt: Vec<String>,
    },
    /// Transcribe an audio file
    Transcribe {
        /// Path to the recording (m4a, mp3, wav, ...)
        path: PathBuf,
    },
    /// Store the API key (read from stdin when --key is omitted)
    Auth {
        #[arg(long)]
        key: Option<String>,
    },
    /// Remove the stored API key
    Deauth,
    /// Show whether an API key is stored, and the current configuration
    Status,
    /// Set configuration values
    Set {
        /// Configuration key to set
        key: Option<String>,
        /// Value to set for the key
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        value: Vec<String>,
    },
    /// Unset configuration values
    Unset {
        /// Configuration key to unset
        key: String,
    },
}

/// Prints alerts to stderr as they are raised.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleAlerts;

impl AlertSink for ConsoleAlerts {
    fn show(&self, alert: Alert) {
        match alert.kind {
            AlertKind::Info => eprintln!("✅ {}", alert.message),
            AlertKind::Error => eprintln!("❌ {}: {}", alert.title, alert.message),
        }
    }
}

/// A request failure the session has already alerted about. The binary
/// exits non-zero without printing it again.
#[derive(Debug)]
pub struct Reported(pub ApiError);

impl fmt::Display for Reported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl Error for Reported {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.0)
    }
}

pub fn main() -> Result<(), Box<dyn Error>> {
    init_tracing();
    let args = Args::parse();

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    runtime.block_on(async_main(args))
}

async fn async_main(args: Args) -> Result<(), Box<dyn Error>> {
    let command = args.command.unwrap_or(Commands::Chat { log: None });

    match command {
        Commands::Set { key, value } => return settings::run_set(key, value),
        Commands::Unset { key } => return settings::run_unset(&key),
        _ => {}
    }

    let config = Config::load()?;
    let alerts: Arc<dyn AlertSink> = Arc::new(ConsoleAlerts);
    let session = Session::from_config(&config, alerts);

    match command {
        Commands::Chat { log } => chat::run_chat(&session, log).await,
        Commands::Say { prompt } => say::run_say(&session, prompt).await,
        Commands::Image { prompt } => media::run_image(&session, prompt).await,
        Commands::Transcribe { path } => media::run_transcribe(&session, &path).await,
        Commands::Auth { key } => settings::run_auth(session.credentials(), key),
        Commands::Deauth => settings::run_deauth(session.credentials()),
        Commands::Status => settings::run_status(session.credentials(), &config),
        Commands::Set { .. } | Commands::Unset { .. } => Ok(()),
    }
}

/// Join trailing words into one prompt, or `None` when nothing was given.
pub(crate) fn join_prompt(words: &[String]) -> Option<String> {
    let prompt = words.join(" ");
    let prompt = prompt.trim();
    if prompt.is_empty() {
        None
    } else {
        Some(prompt.to_string())
    }
}
