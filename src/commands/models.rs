//! Models listing command
//!
//! Queries the active provider for its available models and prints them in
//! a table, marking the currently configured model.

use crate::config::Config;
use crate::error::Result;
use crate::providers::create_provider;

use colored::Colorize;
use prettytable::{format, row, Table};

/// List models available from the configured provider
///
/// # Arguments
///
/// * `config` - Application configuration
///
/// # Errors
///
/// Returns error if the provider cannot be created or the model listing
/// request fails.
pub async fn run_models(config: Config) -> Result<()> {
    let provider = create_provider(&config.provider)?;
    let current = provider.model();

    println!(
        "Fetching models from {}...\n",
        provider.name().cyan()
    );

    let models = provider.list_models().await?;
    if models.is_empty() {
        println!("No models available.");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_NO_LINESEP_WITH_TITLE);
    table.set_titles(row!["NAME", "SIZE"]);
    for model in &models {
        if model.name == current {
            table.add_row(row![
                format!("{} *", model.name).green(),
                model.display_size()
            ]);
        } else {
            table.add_row(row![model.name, model.display_size()]);
        }
    }
    table.printstd();

    println!("\nCurrent model: {}", current.cyan());
    Ok(())
}
