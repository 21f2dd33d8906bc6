//! Special commands parser for interactive chat mode
//!
//! This module parses the slash commands that can be entered during an
//! interactive chat session. Special commands allow users to:
//! - Create, list, switch, rename, and delete chats
//! - Stop an in-flight response
//! - Change the active persona or list available models
//! - Toggle web search augmentation
//! - Check usage and start the Pro upgrade flow
//!
//! The command word is case-insensitive; arguments (titles, ids) keep
//! their original casing.

use crate::personas::Persona;
use thiserror::Error;

/// Errors that can occur when parsing special commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Special commands that can be executed during interactive chat
///
/// These commands modify the session state or print information, rather
/// than being sent to the model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecialCommand {
    /// Create a new chat and make it active
    NewChat,

    /// List all chats with their ids and titles
    ListChats,

    /// Switch the active chat by list position or id prefix
    SwitchChat(String),

    /// Rename the active chat
    RenameChat(String),

    /// Delete the active chat
    DeleteChat,

    /// Stop the in-flight response on the active chat
    Stop,

    /// Show the available personas
    ListPersonas,

    /// Switch the active persona
    SwitchPersona(Persona),

    /// Switch the model on the active provider
    SwitchModel(String),

    /// List models available from the provider
    ListModels,

    /// Show monthly usage against the free-tier limit
    Usage,

    /// Toggle web search augmentation
    ToggleSearch(bool),

    /// Start the Pro upgrade checkout flow
    Upgrade,

    /// Display help information
    Help,

    /// Exit the interactive session
    Exit,

    /// Not a special command
    ///
    /// The input should be sent to the model as a chat message.
    None,
}

/// Parse a user input string into a special command
///
/// # Errors
///
/// Returns [`CommandError::UnknownCommand`] if the input starts with `/`
/// but is not a recognized command, [`CommandError::MissingArgument`] when
/// a required argument is absent, and [`CommandError::UnsupportedArgument`]
/// for invalid arguments.
///
/// # Examples
///
/// ```
/// use aibud::commands::special_commands::{parse_special_command, SpecialCommand};
/// use aibud::personas::Persona;
///
/// let cmd = parse_special_command("/persona casual").unwrap();
/// assert_eq!(cmd, SpecialCommand::SwitchPersona(Persona::Casual));
///
/// let cmd = parse_special_command("hello there").unwrap();
/// assert_eq!(cmd, SpecialCommand::None);
///
/// assert!(parse_special_command("/frobnicate").is_err());
/// ```
pub fn parse_special_command(input: &str) -> Result<SpecialCommand, CommandError> {
    let trimmed = input.trim();
    let lower = trimmed.to_lowercase();

    // Bare exit/quit work without the slash prefix
    if !trimmed.starts_with('/') {
        if lower == "exit" || lower == "quit" {
            return Ok(SpecialCommand::Exit);
        }
        return Ok(SpecialCommand::None);
    }

    let (word, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((word, rest)) => (word.to_lowercase(), rest.trim()),
        None => (lower, ""),
    };

    match word.as_str() {
        "/new" => Ok(SpecialCommand::NewChat),
        "/chats" => Ok(SpecialCommand::ListChats),

        "/switch" => {
            if rest.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/switch".to_string(),
                    usage: "/switch <number|chat-id>".to_string(),
                })
            } else {
                Ok(SpecialCommand::SwitchChat(rest.to_string()))
            }
        }

        "/rename" => {
            if rest.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/rename".to_string(),
                    usage: "/rename <new title>".to_string(),
                })
            } else {
                Ok(SpecialCommand::RenameChat(rest.to_string()))
            }
        }

        "/delete" => Ok(SpecialCommand::DeleteChat),
        "/stop" => Ok(SpecialCommand::Stop),

        "/persona" => {
            if rest.is_empty() {
                Ok(SpecialCommand::ListPersonas)
            } else {
                match Persona::parse_str(rest) {
                    Ok(persona) => Ok(SpecialCommand::SwitchPersona(persona)),
                    Err(_) => Err(CommandError::UnsupportedArgument {
                        command: "/persona".to_string(),
                        arg: rest.to_string(),
                    }),
                }
            }
        }

        "/model" => {
            if rest.is_empty() {
                Err(CommandError::MissingArgument {
                    command: "/model".to_string(),
                    usage: "/model <name>".to_string(),
                })
            } else {
                Ok(SpecialCommand::SwitchModel(rest.to_string()))
            }
        }

        "/models" => Ok(SpecialCommand::ListModels),
        "/usage" => Ok(SpecialCommand::Usage),
        "/upgrade" => Ok(SpecialCommand::Upgrade),

        "/search" => match rest {
            "on" => Ok(SpecialCommand::ToggleSearch(true)),
            "off" => Ok(SpecialCommand::ToggleSearch(false)),
            "" => Err(CommandError::MissingArgument {
                command: "/search".to_string(),
                usage: "/search <on|off>".to_string(),
            }),
            other => Err(CommandError::UnsupportedArgument {
                command: "/search".to_string(),
                arg: other.to_string(),
            }),
        },

        "/help" | "/?" => Ok(SpecialCommand::Help),
        "/exit" | "/quit" => Ok(SpecialCommand::Exit),

        _ => Err(CommandError::UnknownCommand(trimmed.to_string())),
    }
}

/// Help text for all special commands
pub const HELP_TEXT: &str = "\
Available commands:
  /new                Create a new chat
  /chats              List all chats
  /switch <n|id>      Switch to a chat by number or id prefix
  /rename <title>     Rename the active chat
  /delete             Delete the active chat
  /stop               Stop the current response (press Ctrl-C while a
                      response is streaming)
  /persona [name]     Show or switch persona
  /model <name>       Switch the active model
  /models             List available models
  /search <on|off>    Toggle web search augmentation
  /usage              Show monthly message usage
  /upgrade            Upgrade to Pro via Stripe checkout
  /help, /?           Show this help
  exit, quit          Leave the session
";

/// Print help text for all special commands
pub fn print_help() {
    println!("{}", HELP_TEXT);
}
