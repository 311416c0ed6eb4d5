//! Slash commands for the interactive chat
//!
//! Anything typed at the prompt that starts with `/` (plus the bare words
//! `exit` and `quit`) is a special command handled locally instead of being
//! sent to the analytics API. Command words are case-insensitive; arguments
//! keep their case.

use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an argument it does not take
    #[error("Command {command} takes no argument (got: {arg})")]
    UnexpectedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Commands available at the chat prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    Help,
    /// API status, active session and model
    ShowStatus,
    /// Re-check `/health`
    CheckHealth,
    /// Re-fetch and list the model catalog
    ListModels,
    /// Select the model for the next queries
    SwitchModel(String),
    /// Create a session and switch to it
    NewSession,
    ListSessions,
    /// Switch by id or short id
    SwitchSession(String),
    /// Rename the active session
    RenameSession(String),
    /// Delete a non-active session by id or short id
    DeleteSession(String),
    /// Delete the active session's local messages
    ClearMessages,
    /// Ask the backend to forget the active session's conversation
    ForgetRemote,
    /// Reprint the active session's transcript
    ShowHistory,
    Exit,
    /// Not a special command; the input is a query
    None,
}

/// Parse a line typed at the chat prompt
///
/// # Errors
///
/// Returns [`CommandError`] for unknown commands and for arguments that are
/// missing or unexpected.
///
/// # Examples
///
/// ```
/// use sqlchat::commands::special_commands::{parse_special_command, SpecialCommand};
///
/// assert_eq!(
///     parse_special_command("/rename Q3 Revenue").unwrap(),
///     SpecialCommand::RenameSession("Q3 Revenue".to_string())
/// );
/// assert_eq!(parse_special_command("QUIT").unwrap(), SpecialCommand::Exit);
/// assert_eq!(
///     parse_special_command("top customers by revenue").unwrap(),
///     SpecialCommand::None
/// );
/// assert!(parse_special_command("/frobnicate").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    if !trimmed.starts_with('/') {
        return Ok(match lower.as_str() {
            "exit" | "quit" => SpecialCommand::Exit,
            _ => SpecialCommand::None,
        });
    }

    let (word, arg) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    let no_arg = |cmd: SpecialCommand| {
        if arg.is_empty() {
            Ok(cmd)
        } else {
            Err(CommandError::UnexpectedArgument {
                command: word.clone(),
                arg: arg.to_string(),
            })
        }
    };
    let with_arg = |make: fn(String) -> SpecialCommand, usage: &str| {
        if arg.is_empty() {
            Err(CommandError::MissingArgument {
                command: word.clone(),
                usage: usage.to_string(),
            })
        } else {
            Ok(make(arg.to_string()))
        }
    };

    match word.as_str() {
        "/help" | "/?" => no_arg(SpecialCommand::Help),
        "/status" => no_arg(SpecialCommand::ShowStatus),
        "/health" => no_arg(SpecialCommand::CheckHealth),
        "/models" => no_arg(SpecialCommand::ListModels),
        "/model" => with_arg(SpecialCommand::SwitchModel, "/model <provider:model>"),
        "/new" => no_arg(SpecialCommand::NewSession),
        "/sessions" => no_arg(SpecialCommand::ListSessions),
        "/switch" => with_arg(SpecialCommand::SwitchSession, "/switch <session-id>"),
        "/rename" => with_arg(SpecialCommand::RenameSession, "/rename <name>"),
        "/delete" => with_arg(SpecialCommand::DeleteSession, "/delete <session-id>"),
        "/clear" => no_arg(SpecialCommand::ClearMessages),
        "/forget" => no_arg(SpecialCommand::ForgetRemote),
        "/history" => no_arg(SpecialCommand::ShowHistory),
        "/exit" | "/quit" => no_arg(SpecialCommand::Exit),
        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Print the slash command reference
pub fn print_help() {
    println!(
        r#"
Chat Commands
=============

API:
  /status           - Show API status, session and model
  /health           - Re-check the analytics API
  /models           - List available models
  /model <id>       - Use a model (provider:model) for the next queries

SESSIONS:
  /new              - Start a new session
  /sessions         - List sessions
  /switch <id>      - Switch to a session (full or short id)
  /rename <name>    - Rename the current session
  /delete <id>      - Delete another session
  /history          - Show the current session's messages

MEMORY:
  /clear            - Delete the current session's messages
  /forget           - Make the API forget this conversation

OTHER:
  /help             - Show this help message
  /exit             - Leave the chat (also: exit, quit)

NOTES:
  - Anything else is sent to the API as a question
  - Press Ctrl-C while a query runs to cancel it
"#
    );
}
