/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint:

- `chat`     - Interactive chat with slash commands
- `ask`      - Run a single query and print the reply
- `models`   - Model listing and API health
- `sessions` - Stored session management

Handlers wire the library components together: configuration, the
session store, the HTTP API client and the chat orchestrator.
*/

use std::sync::Arc;

use colored::Colorize;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::api::HttpApiClient;
use crate::config::Config;
use crate::error::Result;
use crate::orchestrator::{
    ChatOrchestrator, TurnErrorKind, TurnOutcome, TurnState, TurnTerminal, DEFAULT_PROGRESS,
};
use crate::session::{ChatMessage, SessionController, SessionOptions};
use crate::storage::Role;

// Slash command parser for the interactive chat
pub mod special_commands;

// Model listing and health probe
pub mod models;

// Session management and transcript rendering
pub mod sessions;

/// Open storage, pick the active session and connect the API client
///
/// `preferred_session` is an id or short id to resume.
pub fn build_orchestrator(
    config: &Config,
    preferred_session: Option<String>,
) -> Result<ChatOrchestrator> {
    let storage = Arc::new(sessions::open_storage(config)?);
    let controller = SessionController::initialize(
        storage,
        SessionOptions {
            preferred_session,
            session_name_format: config.chat.session_name_format.clone(),
        },
    )?;
    let api = Arc::new(HttpApiClient::new(&config.api)?);

    Ok(ChatOrchestrator::new(
        api,
        controller,
        config.chat.default_model.clone(),
    ))
}

/// Cancel `token` on the first Ctrl-C
fn cancel_on_ctrl_c(token: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            token.cancel();
        }
    })
}

/// Print each new progress text of the running turn
async fn show_progress(mut states: watch::Receiver<TurnState>) {
    let mut last_shown: Option<String> = None;
    loop {
        let progress = {
            let state = states.borrow_and_update();
            match &*state {
                TurnState::Streaming { progress } => Some(
                    progress
                        .clone()
                        .unwrap_or_else(|| DEFAULT_PROGRESS.to_string()),
                ),
                _ => None,
            }
        };

        if let Some(text) = progress {
            if last_shown.as_deref() != Some(text.as_str()) {
                println!("{}", format!("  {}", text).dimmed());
                last_shown = Some(text);
            }
        }

        if states.changed().await.is_err() {
            break;
        }
    }
}

/// Submit `query`, showing progress and honouring Ctrl-C
async fn run_turn(orchestrator: &ChatOrchestrator, query: &str) -> Result<TurnOutcome> {
    let cancel = CancellationToken::new();
    let ctrl_c = cancel_on_ctrl_c(cancel.clone());
    let progress = tokio::spawn(show_progress(orchestrator.subscribe()));

    let result = orchestrator.submit_with_cancel(query, cancel).await;

    ctrl_c.abort();
    progress.abort();
    result
}

fn print_outcome(outcome: &TurnOutcome) {
    let message = ChatMessage {
        role: Role::Assistant,
        content: outcome.reply.clone(),
        timestamp: outcome.timestamp.clone(),
    };
    match outcome.terminal {
        TurnTerminal::Completed => sessions::print_message(&message),
        TurnTerminal::Error(TurnErrorKind::Cancelled) | TurnTerminal::Timeout => {
            println!("{}\n", message.content.yellow())
        }
        TurnTerminal::Error(_) => println!("{}\n", message.content.red()),
    }

    for error in &outcome.persistence_errors {
        eprintln!(
            "{}",
            format!("Warning: message was not saved: {}", error).yellow()
        );
    }
}

// Chat command handler
pub mod chat {
    //! Interactive chat handler.
    //!
    //! Builds the orchestrator, probes the API, and runs a readline loop that
    //! sends plain input as queries and dispatches slash commands locally.

    use super::*;
    use crate::commands::models::status_tag;
    use crate::commands::sessions::{
        print_sessions_table, print_transcript, truncate_label, MAX_HEADER_CHARS,
    };
    use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
    use rustyline::error::ReadlineError;
    use rustyline::DefaultEditor;

    /// Start interactive chat mode
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (consumed)
    /// * `session` - Session id or short id to resume
    /// * `model` - Model to select instead of the configured default
    ///
    /// # Examples
    ///
    /// ```
    /// use sqlchat::commands::chat;
    /// use sqlchat::config::Config;
    ///
    /// // In application code:
    /// // chat::run_chat(Config::default(), None, None).await?;
    /// ```
    pub async fn run_chat(
        config: Config,
        session: Option<String>,
        model: Option<String>,
    ) -> Result<()> {
        tracing::info!("Starting interactive chat");

        let orchestrator = build_orchestrator(&config, session)?;
        let status = orchestrator.refresh_health().await;
        if status.is_healthy() {
            orchestrator.refresh_models().await;
        }
        if let Some(model) = model {
            if let Err(e) = orchestrator.select_model(&model).await {
                eprintln!("{}", e.to_string().red());
            }
        }

        let rl_config = rustyline::Config::builder()
            .max_history_size(config.chat.history_size)?
            .auto_add_history(false)
            .build();
        let mut rl = DefaultEditor::with_config(rl_config)?;

        print_welcome_banner(&orchestrator).await;
        {
            let session = orchestrator.session();
            let session = session.lock().await;
            if !session.messages().is_empty() {
                print_transcript(session.messages());
            }
        }

        loop {
            let prompt = format!("{} ", "sql>".cyan().bold());
            match rl.readline(&prompt) {
                Ok(line) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    rl.add_history_entry(trimmed)?;

                    let command = match parse_special_command(trimmed) {
                        Ok(command) => command,
                        Err(e) => {
                            eprintln!("{}\n", e.to_string().red());
                            continue;
                        }
                    };

                    match command {
                        SpecialCommand::Exit => break,
                        SpecialCommand::None => match run_turn(&orchestrator, trimmed).await {
                            Ok(outcome) => print_outcome(&outcome),
                            Err(e) => eprintln!("{}\n", format!("Error: {}", e).red()),
                        },
                        other => {
                            if let Err(e) = handle_special_command(&orchestrator, other).await {
                                eprintln!("{}\n", format!("Error: {}", e).red());
                            }
                        }
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    println!("CTRL-C");
                    break;
                }
                Err(ReadlineError::Eof) => {
                    println!("CTRL-D");
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {:?}", err);
                    break;
                }
            }
        }

        println!("Goodbye!");
        Ok(())
    }

    async fn handle_special_command(
        orchestrator: &ChatOrchestrator,
        command: SpecialCommand,
    ) -> Result<()> {
        let session = orchestrator.session();

        match command {
            SpecialCommand::Help => print_help(),
            SpecialCommand::ShowStatus => print_status_display(orchestrator).await,
            SpecialCommand::CheckHealth => {
                let status = orchestrator.refresh_health().await;
                println!("API status: {}\n", status_tag(status));
            }
            SpecialCommand::ListModels => {
                let catalog = orchestrator.refresh_models().await;
                let selected = orchestrator.selected_model().await;
                if catalog.is_empty() {
                    println!("{}\n", "No models available.".yellow());
                } else {
                    println!();
                    for id in catalog.qualified_ids() {
                        if id == selected {
                            println!("  {} {}", "*".green(), id.green());
                        } else {
                            println!("    {}", id);
                        }
                    }
                    println!();
                }
            }
            SpecialCommand::SwitchModel(model_id) => {
                orchestrator.select_model(&model_id).await?;
                println!("Using model {}\n", model_id.cyan());
            }
            SpecialCommand::NewSession => {
                let mut session = session.lock().await;
                session.create_session()?;
                println!(
                    "Started {}\n",
                    truncate_label(session.session_name(), MAX_HEADER_CHARS).bold()
                );
            }
            SpecialCommand::ListSessions => {
                let mut session = session.lock().await;
                session.refresh_sessions()?;
                print_sessions_table(session.sessions(), Some(session.session_id()));
            }
            SpecialCommand::SwitchSession(id) => {
                let mut session = session.lock().await;
                let target = session.switch_to(&id)?;
                println!(
                    "Switched to {} {}\n",
                    truncate_label(&target.session_name, MAX_HEADER_CHARS).bold(),
                    format!("({})", target.short_id()).dimmed()
                );
                print_transcript(session.messages());
            }
            SpecialCommand::RenameSession(name) => {
                let mut session = session.lock().await;
                if session.rename_active(&name)? {
                    println!("Renamed to {}\n", session.session_name().bold());
                } else {
                    println!("{}\n", "Name unchanged.".yellow());
                }
            }
            SpecialCommand::DeleteSession(id) => {
                let deleted = session.lock().await.delete_session(&id)?;
                println!(
                    "Deleted {} {}\n",
                    deleted.session_name,
                    format!("({})", deleted.short_id()).dimmed()
                );
            }
            SpecialCommand::ClearMessages => {
                let removed = session.lock().await.clear_messages()?;
                println!("Removed {} messages\n", removed);
            }
            SpecialCommand::ForgetRemote => {
                let result = orchestrator.clear_remote_session().await;
                if result.is_ok() {
                    println!("{}\n", "The API forgot this conversation.".green());
                } else {
                    println!(
                        "{}\n",
                        format!(
                            "Could not clear remote memory: {}",
                            result.error.as_deref().unwrap_or(&result.status)
                        )
                        .red()
                    );
                }
            }
            SpecialCommand::ShowHistory => {
                let session = session.lock().await;
                print_transcript(session.messages());
            }
            SpecialCommand::Exit | SpecialCommand::None => {}
        }

        Ok(())
    }

    /// Display the welcome banner at the start of interactive chat
    async fn print_welcome_banner(orchestrator: &ChatOrchestrator) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                  sqlchat - Ask your data                     ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        print_session_summary(orchestrator).await;
        println!("Type '/help' for available commands, 'exit' to quit\n");
    }

    /// Display API, session and model details (`/status`)
    async fn print_status_display(orchestrator: &ChatOrchestrator) {
        println!("\n╔══════════════════════════════════════════════════════════════╗");
        println!("║                       Session Status                         ║");
        println!("╚══════════════════════════════════════════════════════════════╝\n");
        print_session_summary(orchestrator).await;
    }

    async fn print_session_summary(orchestrator: &ChatOrchestrator) {
        let status = orchestrator.api_status().await;
        let model = orchestrator.selected_model().await;
        let session = orchestrator.session();
        let session = session.lock().await;

        println!("API:      {}", status_tag(status));
        println!(
            "Session:  {} {}",
            truncate_label(session.session_name(), MAX_HEADER_CHARS).bold(),
            format!("({})", short(session.session_id())).dimmed()
        );
        println!("Messages: {}", session.messages().len());
        println!("Model:    {}\n", model.cyan());
    }

    fn short(id: &str) -> &str {
        id.char_indices()
            .nth(8)
            .map(|(idx, _)| &id[..idx])
            .unwrap_or(id)
    }
}

// One-shot query handler
pub mod ask {
    //! Runs a single turn and prints the assistant reply.

    use super::*;
    use crate::error::SqlChatError;

    /// Ask `query` once
    ///
    /// # Errors
    ///
    /// Returns error if the API is unavailable, or if the turn ends in
    /// anything other than a completed answer.
    pub async fn run_ask(
        config: Config,
        query: String,
        session: Option<String>,
        model: Option<String>,
    ) -> Result<()> {
        let orchestrator = build_orchestrator(&config, session)?;
        orchestrator.refresh_health().await;
        if let Some(model) = model {
            orchestrator.refresh_models().await;
            orchestrator.select_model(&model).await?;
        }

        let outcome = run_turn(&orchestrator, &query).await?;
        print_outcome(&outcome);

        match outcome.terminal {
            TurnTerminal::Completed => Ok(()),
            TurnTerminal::Timeout => {
                Err(SqlChatError::Network("the query stream ended early".to_string()).into())
            }
            TurnTerminal::Error(kind) => {
                Err(anyhow::anyhow!("the query ended with an error ({:?})", kind))
            }
        }
    }
}
