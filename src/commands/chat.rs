//! Interactive chat command
//!
//! Runs the rustyline-based chat loop: reads user input, dispatches slash
//! commands, and streams model responses token by token. Ctrl-C during a
//! streaming response cancels it and keeps the partial content; Ctrl-C at
//! the prompt exits the session.

use crate::commands::special_commands::{parse_special_command, print_help, SpecialCommand};
use crate::config::Config;
use crate::error::Result;
use crate::personas::Persona;
use crate::providers::create_provider;
use crate::session::{ChatSession, SendOutcome};
use crate::storage::KvStorage;
use crate::store::FREE_MONTHLY_MESSAGE_LIMIT;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io::Write;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the interactive chat session
///
/// # Arguments
///
/// * `config` - Application configuration
/// * `search` - Enable web search augmentation for this session
///
/// # Errors
///
/// Returns error if the provider, storage, or session cannot be created,
/// or if the line editor fails.
pub async fn run_chat(config: Config, search: bool) -> Result<()> {
    let provider = Arc::from(create_provider(&config.provider)?);
    let storage = KvStorage::new()?;
    let mut session = ChatSession::new(provider, storage, config.search.clone())?;
    if search {
        session.set_search_enabled(true);
    }

    print_welcome(&session);

    let mut rl = DefaultEditor::new()?;
    loop {
        let prompt = format_prompt(&session);
        match rl.readline(&prompt) {
            Ok(line) => {
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                rl.add_history_entry(&line)?;

                match parse_special_command(&line) {
                    Ok(SpecialCommand::None) => {
                        send_message(&mut session, &line).await?;
                    }
                    Ok(SpecialCommand::Exit) => break,
                    Ok(command) => {
                        if handle_command(&mut session, &config, command).await? {
                            break;
                        }
                    }
                    Err(e) => {
                        println!("{}", e.to_string().red());
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
            Err(e) => {
                tracing::error!("Readline error: {}", e);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn print_welcome(session: &ChatSession) {
    println!();
    println!("{}", "Welcome to AIBud!".bold());
    println!(
        "Provider: {} | Model: {} | Persona: {}",
        session.provider().name().cyan(),
        session.provider().model().cyan(),
        session.persona().to_string().cyan()
    );
    if session.search_enabled() {
        println!("Web search: {}", "on".green());
    }
    println!("Type '/help' for commands, 'exit' to quit.");
    println!();
}

fn format_prompt(session: &ChatSession) -> String {
    format!("{} >> ", session.persona().colored_tag())
}

/// Send a chat message and print the streamed response
///
/// A Ctrl-C watcher cancels the stream; the partial response stays in the
/// chat and `[stopped]` is printed.
async fn send_message(session: &mut ChatSession, text: &str) -> Result<()> {
    let chat_id = match session.store().active_chat_id() {
        Some(id) => id.to_string(),
        None => session.new_chat()?,
    };

    let cancel = CancellationToken::new();
    let watcher = tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        }
    });

    let result = session
        .send_with_cancel(&chat_id, text, cancel, |token| {
            print!("{}", token);
            let _ = std::io::stdout().flush();
        })
        .await;
    watcher.abort();

    match result {
        Ok(SendOutcome::Completed) => println!("\n"),
        Ok(SendOutcome::Cancelled) => println!("\n{}\n", "[stopped]".yellow()),
        Ok(SendOutcome::Failed) => {
            println!("\n{}\n", "The response failed; see the chat for details.".red())
        }
        Err(e) => println!("{}\n", e.to_string().red()),
    }

    Ok(())
}

/// Handle a parsed special command
///
/// Returns `Ok(true)` when the session should end.
async fn handle_command(
    session: &mut ChatSession,
    config: &Config,
    command: SpecialCommand,
) -> Result<bool> {
    match command {
        SpecialCommand::NewChat => {
            session.new_chat()?;
            println!("Started a new chat.\n");
        }

        SpecialCommand::ListChats => {
            let active = session.store().active_chat_id().map(str::to_string);
            for (i, chat) in session.store().chats().iter().enumerate() {
                let marker = if Some(chat.id.as_str()) == active.as_deref() {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {:>2}. {} ({} messages) [{}]",
                    marker,
                    i + 1,
                    chat.title,
                    chat.messages.len(),
                    &chat.id[..8.min(chat.id.len())]
                );
            }
            println!();
        }

        SpecialCommand::SwitchChat(target) => match resolve_chat(session, &target) {
            Some(chat_id) => {
                session.switch_chat(&chat_id)?;
                if let Some(chat) = session.store().active_chat() {
                    println!("Switched to: {}\n", chat.title);
                }
            }
            None => println!("{}\n", format!("No chat matches '{}'", target).red()),
        },

        SpecialCommand::RenameChat(title) => {
            let chat_id = match session.store().active_chat_id() {
                Some(id) => id.to_string(),
                None => {
                    println!("{}\n", "No active chat to rename".red());
                    return Ok(false);
                }
            };
            session.rename_chat(&chat_id, &title)?;
            println!("Renamed chat to: {}\n", title);
        }

        SpecialCommand::DeleteChat => {
            let chat_id = match session.store().active_chat_id() {
                Some(id) => id.to_string(),
                None => {
                    println!("{}\n", "No active chat to delete".red());
                    return Ok(false);
                }
            };
            session.delete_chat(&chat_id)?;
            if let Some(chat) = session.store().active_chat() {
                println!("Deleted. Now on: {}\n", chat.title);
            }
        }

        SpecialCommand::Stop => {
            let active = session.store().active_chat_id().map(str::to_string);
            let stopped = match active {
                Some(id) => session.stop(&id),
                None => false,
            };
            if stopped {
                println!("Stopping the current response.\n");
            } else {
                println!(
                    "Nothing is streaming right now. Press Ctrl-C during a \
                     response to stop it.\n"
                );
            }
        }

        SpecialCommand::ListPersonas => {
            println!("Current persona: {}\n", session.persona());
            for persona in Persona::all() {
                println!("  {} - {}", persona.colored_tag(), persona.description());
            }
            println!("\nSwitch with '/persona <name>'.\n");
        }

        SpecialCommand::SwitchPersona(persona) => {
            session.set_persona(persona)?;
            println!("Persona set to {}.\n", persona.colored_tag());
        }

        SpecialCommand::SwitchModel(model) => {
            let mut provider_config = config.provider.clone();
            match provider_config.provider_type.as_str() {
                "openai" => provider_config.openai.model = model.clone(),
                _ => provider_config.ollama.model = model.clone(),
            }
            match create_provider(&provider_config) {
                Ok(provider) => {
                    session.replace_provider(Arc::from(provider))?;
                    println!("Model set to {}.\n", model.cyan());
                }
                Err(e) => println!("{}\n", format!("Failed to switch model: {}", e).red()),
            }
        }

        SpecialCommand::ListModels => match session.provider().list_models().await {
            Ok(models) => {
                for model in models {
                    println!("  {} ({})", model.name, model.display_size());
                }
                println!();
            }
            Err(e) => println!("{}\n", format!("Failed to list models: {}", e).red()),
        },

        SpecialCommand::Usage => {
            // Pick up an upgrade completed through the billing server.
            session.refresh_pro()?;
            if session.is_pro() {
                println!("Pro plan: unlimited messages.\n");
            } else {
                let remaining = session
                    .remaining_messages()
                    .unwrap_or(FREE_MONTHLY_MESSAGE_LIMIT);
                println!(
                    "Free plan: {} of {} messages remaining this month.\n",
                    remaining, FREE_MONTHLY_MESSAGE_LIMIT
                );
            }
        }

        SpecialCommand::ToggleSearch(enabled) => {
            session.set_search_enabled(enabled);
            if enabled && !session.search_enabled() {
                println!(
                    "{}\n",
                    "Search needs a Serper API key (see config or SERPER_API_KEY).".yellow()
                );
            } else {
                println!(
                    "Web search is {}.\n",
                    if enabled { "on".green() } else { "off".yellow() }
                );
            }
        }

        SpecialCommand::Upgrade => {
            if session.refresh_pro()? {
                println!("Pro is already enabled for this profile.\n");
                return Ok(false);
            }
            println!(
                "Run '{}', POST to {}, and open the returned URL in a browser.",
                "aibud serve".cyan(),
                "/create-checkout-session".cyan()
            );
            println!(
                "After payment the browser returns to the billing server, which \
                 enables Pro; '/usage' here picks it up.\n"
            );
        }

        SpecialCommand::Help => print_help(),

        SpecialCommand::Exit => return Ok(true),
        SpecialCommand::None => {}
    }

    Ok(false)
}

/// Resolve a `/switch` target to a chat id
///
/// Accepts a 1-based list position or a chat id prefix.
fn resolve_chat(session: &ChatSession, target: &str) -> Option<String> {
    if let Ok(index) = target.parse::<usize>() {
        if index >= 1 {
            if let Some(chat) = session.store().chats().get(index - 1) {
                return Some(chat.id.clone());
            }
        }
        return None;
    }

    session
        .store()
        .chats()
        .iter()
        .find(|chat| chat.id.starts_with(target))
        .map(|chat| chat.id.clone())
}
