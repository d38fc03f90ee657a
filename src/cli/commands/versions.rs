//! Versions command - list cached versions of a resource

use super::blocking;
use crate::catalog::Catalog;
use crate::cli::args::{OutputFormat, VersionsArgs};
use crate::config::Config;
use crate::error::GetpackResult;
use crate::ui::{self, UiContext};
use console::style;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Serialize)]
struct VersionRow {
    version: String,
    declared: bool,
}

/// Execute the versions command
pub async fn execute(args: VersionsArgs, config: &Config) -> GetpackResult<()> {
    let catalog = Catalog::from_config(config)?;
    let resource = Arc::clone(catalog.get(&args.name)?);
    let declared = resource.version().to_string();

    let versions = blocking(move || resource.available_versions()).await?;
    let rows: Vec<VersionRow> = versions
        .into_iter()
        .map(|version| VersionRow {
            declared: version == declared,
            version,
        })
        .collect();

    match args.format {
        OutputFormat::Table => print_table(&args.name, &rows),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Plain => {
            for row in &rows {
                println!("{}", row.version);
            }
        }
    }

    Ok(())
}

fn print_table(name: &str, rows: &[VersionRow]) {
    if rows.is_empty() {
        let ctx = UiContext::detect();
        ui::step_info(&ctx, &format!("No cached versions of {}", name));
        return;
    }

    println!("{:<20} {:<10}", style("VERSION").bold(), style("DECLARED").bold());
    println!("{}", "-".repeat(31));
    for row in rows {
        let marker = if row.declared {
            style("*").green().to_string()
        } else {
            String::new()
        };
        println!("{:<20} {:<10}", row.version, marker);
    }
    println!();
    println!("{} version(s)", rows.len());
}
