//! `models` and `health` subcommands
//!
//! Both talk to the analytics API directly and print either a table or
//! machine-readable JSON.

use colored::Colorize;
use prettytable::{row, Table};
use serde::Serialize;

use crate::api::{AnalyticsApi, HealthStatus, HttpApiClient, ModelCatalog};
use crate::config::Config;
use crate::error::{Result, SqlChatError};

/// One row of the models listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelEntry {
    /// `provider:model`, as accepted by `--model` and `/model`
    pub id: String,
    pub provider: String,
    pub model: String,
    /// Whether this is the configured default model
    pub default: bool,
}

/// Flatten a catalog into listing rows
pub fn model_entries(catalog: &ModelCatalog, default_model: &str) -> Vec<ModelEntry> {
    catalog
        .providers()
        .iter()
        .flat_map(|(provider, models)| {
            models.iter().map(move |model| {
                let id = format!("{}:{}", provider, model);
                ModelEntry {
                    default: id == default_model,
                    id,
                    provider: provider.clone(),
                    model: model.clone(),
                }
            })
        })
        .collect()
}

/// List models offered by the API
///
/// # Errors
///
/// Returns error if the catalog cannot be fetched or serialized
pub async fn list_models(config: &Config, json: bool) -> Result<()> {
    tracing::debug!("models::list_models flags - json: {}", json);

    let api = HttpApiClient::new(&config.api)?;
    let catalog = api.list_models().await?;
    let entries = model_entries(&catalog, &config.chat.default_model);

    if json {
        output_models_json(&entries)?;
    } else {
        output_models_table(&entries, api.base_url());
    }
    Ok(())
}

fn output_models_json(entries: &[ModelEntry]) -> Result<()> {
    let json = serde_json::to_string_pretty(entries).map_err(SqlChatError::Serialization)?;
    println!("{}", json);
    Ok(())
}

fn output_models_table(entries: &[ModelEntry], base_url: &str) {
    if entries.is_empty() {
        println!("{}", format!("No models offered by {}", base_url).yellow());
        return;
    }

    let mut table = Table::new();
    table.add_row(row!["Model ID", "Provider", "Default"]);
    for entry in entries {
        let default = if entry.default { "yes" } else { "" };
        table.add_row(row![entry.id, entry.provider, default]);
    }

    println!("\nAvailable models from {}:\n", base_url);
    table.printstd();
    println!();
}

/// Colored tag for a health status
pub fn status_tag(status: HealthStatus) -> colored::ColoredString {
    match status {
        HealthStatus::Healthy => status.label().green().bold(),
        HealthStatus::Offline => status.label().red().bold(),
        HealthStatus::Unknown => status.label().yellow().bold(),
    }
}

/// Print the API status
///
/// # Errors
///
/// Returns [`SqlChatError::ApiUnavailable`] unless the API is healthy, so the
/// process exit code reflects reachability.
pub async fn check_health(config: &Config) -> Result<()> {
    let api = HttpApiClient::new(&config.api)?;
    let status = api.check_health().await;
    println!("{} {}", api.base_url(), status_tag(status));

    if status.is_healthy() {
        Ok(())
    } else {
        Err(SqlChatError::ApiUnavailable(status.to_string()).into())
    }
}
