//! `sessions` subcommand and shared session/transcript rendering

use colored::Colorize;
use prettytable::{format, Table};
use uuid::Uuid;

use crate::api::{AnalyticsApi, HttpApiClient};
use crate::cli::SessionCommand;
use crate::config::Config;
use crate::error::{Result, SqlChatError};
use crate::session::{default_session_name, ChatMessage};
use crate::storage::{Role, SqliteStorage, StoredSession};

/// Longest session label shown in listings before truncation
pub const MAX_LABEL_CHARS: usize = 20;

/// Longest session name shown in the chat header before truncation
pub const MAX_HEADER_CHARS: usize = 50;

/// Shorten `text` to at most `max_chars`, ending in `...` when cut
///
/// # Examples
///
/// ```
/// use sqlchat::commands::sessions::truncate_label;
///
/// assert_eq!(truncate_label("Revenue", 20), "Revenue");
/// assert_eq!(
///     truncate_label("Quarterly revenue by region", 20),
///     "Quarterly revenue..."
/// );
/// ```
pub fn truncate_label(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(3);
    let head: String = text.chars().take(keep).collect();
    format!("{}...", head)
}

/// Open the session store named by the configuration
pub fn open_storage(config: &Config) -> Result<SqliteStorage> {
    match &config.storage.db_path {
        Some(path) => SqliteStorage::new_with_path(path.clone()),
        None => SqliteStorage::new(),
    }
}

fn resolve(storage: &SqliteStorage, id: &str) -> Result<StoredSession> {
    storage
        .find_session(id)?
        .ok_or_else(|| SqlChatError::Session(format!("No session matches '{}'", id)).into())
}

/// Handle `sqlchat sessions ...`
pub async fn handle_sessions(config: Config, command: SessionCommand) -> Result<()> {
    let storage = open_storage(&config)?;

    match command {
        SessionCommand::List => {
            let sessions = storage.list_sessions()?;
            print_sessions_table(&sessions, None);
            if !sessions.is_empty() {
                println!(
                    "Use {} to resume a session.\n",
                    "sqlchat chat --session <ID>".cyan()
                );
            }
        }
        SessionCommand::Show { id } => {
            let session = resolve(&storage, &id)?;
            let messages: Vec<ChatMessage> = storage
                .list_messages(&session.session_id)?
                .into_iter()
                .map(ChatMessage::from)
                .collect();
            println!(
                "\n{} {}\n",
                session.session_name.bold(),
                format!("({})", session.short_id()).dimmed()
            );
            print_transcript(&messages);
        }
        SessionCommand::New { name } => {
            let session_id = Uuid::new_v4().to_string();
            let name = match name.as_deref().map(str::trim) {
                Some(name) if !name.is_empty() => name.to_string(),
                _ => default_session_name(&config.chat.session_name_format),
            };
            storage.create_or_update_session(&session_id, &name)?;
            println!(
                "{}",
                format!("Created session {} ({})", name, session_id).green()
            );
        }
        SessionCommand::Rename { id, name } => {
            let session = resolve(&storage, &id)?;
            let name = name.trim();
            if name.is_empty() {
                return Err(SqlChatError::Session("Session name cannot be empty".into()).into());
            }
            if name == session.session_name {
                println!("{}", "Name unchanged.".yellow());
                return Ok(());
            }
            storage.create_or_update_session(&session.session_id, name)?;
            println!(
                "{}",
                format!("Renamed {} to '{}'", session.short_id(), name).green()
            );
        }
        SessionCommand::Delete { id } => {
            let session = resolve(&storage, &id)?;
            if storage.list_sessions()?.len() <= 1 {
                return Err(SqlChatError::Session(
                    "Cannot delete the only remaining session".into(),
                )
                .into());
            }
            storage.delete_session(&session.session_id)?;
            println!(
                "{}",
                format!("Deleted session {} ({})", session.session_name, session.short_id())
                    .green()
            );
        }
        SessionCommand::Clear { id, remote } => {
            let session = resolve(&storage, &id)?;
            let removed = storage.clear_messages(&session.session_id)?;
            println!(
                "{}",
                format!("Removed {} messages from {}", removed, session.short_id()).green()
            );
            if remote {
                let api = HttpApiClient::new(&config.api)?;
                let result = api.clear_remote_session(&session.session_id).await;
                if result.is_ok() {
                    println!("{}", "The API forgot this conversation.".green());
                } else {
                    eprintln!(
                        "{}",
                        format!(
                            "Remote clear failed: {}",
                            result.error.as_deref().unwrap_or(&result.status)
                        )
                        .red()
                    );
                }
            }
        }
    }

    Ok(())
}

/// Print sessions as a table, marking `active` if given
pub fn print_sessions_table(sessions: &[StoredSession], active: Option<&str>) {
    if sessions.is_empty() {
        println!("{}", "No sessions found.".yellow());
        return;
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "",
        "ID".bold(),
        "Name".bold(),
        "Messages".bold(),
        "Last Activity".bold()
    ]);

    for session in sessions {
        let marker = if Some(session.session_id.as_str()) == active {
            "*".green()
        } else {
            "".normal()
        };
        let last_activity = session
            .last_activity
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M")
            .to_string();

        table.add_row(prettytable::row![
            marker,
            session.short_id().cyan(),
            truncate_label(&session.session_name, MAX_LABEL_CHARS),
            session.message_count,
            last_activity
        ]);
    }

    println!("\nSessions:");
    table.printstd();
    println!();
}

/// Print a transcript, one block per message
pub fn print_transcript(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("{}", "No messages yet.".dimmed());
        return;
    }
    for message in messages {
        print_message(message);
    }
}

/// Print one message with its author and time
pub fn print_message(message: &ChatMessage) {
    let author = match message.role {
        Role::User => "You".bold().blue(),
        Role::Assistant => "Assistant".bold().green(),
    };
    println!("{} {}", author, message.timestamp.dimmed());
    println!("{}\n", message.content);
}
