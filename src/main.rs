mod chat_client;
mod cli;
mod config;

use std::io::{self, Write};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use dotenv::dotenv;
use eyre::Result;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use crate::cli::chat::ChatContext;
use crate::config::{ConfigError, ConfigFile, ConfigOverrides, Profile, WidgetConfig};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    chat: ChatArgs,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a chat session
    Chat(ChatArgs),
}

#[derive(Args, Debug, Clone)]
struct ChatArgs {
    /// Message to send once instead of starting a session
    #[arg(short, long)]
    input: Option<String>,

    /// Base URL of the chat server
    #[arg(long, env = "CHAT_WIDGET_SERVER")]
    server: Option<String>,

    /// Chat endpoint, either a path on the server or a full URL
    #[arg(long, env = "CHAT_WIDGET_ENDPOINT")]
    endpoint: Option<String>,

    /// Language of the built-in fallback messages
    #[arg(long, value_enum)]
    profile: Option<Profile>,

    /// Do not show a typing indicator while waiting for an answer
    #[arg(long)]
    no_typing: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl ChatArgs {
    fn overrides(&self) -> ConfigOverrides {
        ConfigOverrides {
            profile: self.profile,
            server: self.server.clone(),
            endpoint: self.endpoint.clone(),
            no_typing: self.no_typing,
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Load environment variables from .env file
    dotenv().ok();

    let cli = Cli::parse();
    let args = match cli.command {
        Some(Commands::Chat(args)) => args,
        None => cli.chat,
    };

    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };

    // Logs go to stderr so they stay out of the transcript.
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_writer(io::stderr)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting chat widget");

    let config = match ConfigFile::load().and_then(|file| WidgetConfig::build(file, &args.overrides())) {
        Ok(config) => config,
        Err(e) => return Ok(config_failure(&mut io::stderr(), &e)),
    };

    let mut chat_context = ChatContext::new(Box::new(io::stdout()), &config, args.input, true)?;
    chat_context.run().await
}

/// Report a configuration that cannot be used and pick the exit code.
fn config_failure(out: &mut impl Write, e: &ConfigError) -> ExitCode {
    let _ = writeln!(out, "Failed to load configuration: {}", e);
    ExitCode::FAILURE
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn config_failure_is_reported_once() {
        let e = crate::config::resolve_endpoint("not a url", "/api/chat/").unwrap_err();
        let mut out = Vec::new();

        config_failure(&mut out, &e);

        let out = String::from_utf8(out).unwrap();
        assert_eq!(out.lines().count(), 1);
        assert!(out.starts_with("Failed to load configuration: invalid chat endpoint"));
    }

    #[test]
    fn chat_subcommand_takes_the_same_flags() {
        let cli = Cli::try_parse_from([
            "chat-widget",
            "chat",
            "--server",
            "http://localhost:9000",
            "--profile",
            "persian",
            "--no-typing",
            "-i",
            "سلام",
        ])
        .unwrap();

        let Some(Commands::Chat(args)) = cli.command else {
            panic!("expected chat subcommand");
        };
        let overrides = args.overrides();
        assert_eq!(overrides.server.as_deref(), Some("http://localhost:9000"));
        assert_eq!(overrides.profile, Some(Profile::Persian));
        assert!(overrides.no_typing);
        assert_eq!(args.input.as_deref(), Some("سلام"));
    }
}
