//! sqlchat - terminal chat client for a SQL-analytics API
//!
#![doc = "sqlchat - terminal chat client for a SQL-analytics API"]
#![doc = "Main entry point for the sqlchat binary."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sqlchat::cli::{Cli, Commands};
use sqlchat::commands;
use sqlchat::config::{Config, LoggingConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Load configuration
    let config_path = cli.config.as_deref().unwrap_or("config/config.yaml");
    let config = Config::load(config_path, &cli)?;

    // Logging level comes from the merged configuration
    init_tracing(&config.logging);

    // Validate configuration
    config.validate()?;

    match cli.command {
        Commands::Chat { session, model } => {
            if let Some(s) = &session {
                tracing::debug!("Resuming session: {}", s);
            }
            if let Some(m) = &model {
                tracing::debug!("Using model override: {}", m);
            }
            commands::chat::run_chat(config, session, model).await?;
            Ok(())
        }
        Commands::Ask {
            query,
            session,
            model,
        } => {
            commands::ask::run_ask(config, query, session, model).await?;
            Ok(())
        }
        Commands::Health => {
            commands::models::check_health(&config).await?;
            Ok(())
        }
        Commands::Models { json } => {
            commands::models::list_models(&config, json).await?;
            Ok(())
        }
        Commands::Sessions { command } => {
            commands::sessions::handle_sessions(config, command).await?;
            Ok(())
        }
    }
}

/// Initialize the tracing subscriber
///
/// `RUST_LOG` wins over `logging.level`. Output goes to stderr so log lines
/// never mix with the chat transcript on stdout.
fn init_tracing(logging: &LoggingConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("sqlchat={}", logging.level)));

    let (plain, json) = if logging.json {
        (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            ),
        )
    } else {
        (
            Some(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)),
            None,
        )
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(plain)
        .with(json)
        .init();
}
