//! Run command - execute a resource's executable

use super::blocking;
use crate::catalog::Catalog;
use crate::cli::args::RunArgs;
use crate::config::Config;
use crate::error::{GetpackError, GetpackResult};
use std::sync::Arc;
use tracing::info;

/// Execute the run command
///
/// The resource and its requirements are provided and activated first. The
/// child inherits stdio; a non-zero exit is reported with its code.
pub async fn execute(args: RunArgs, config: &Config) -> GetpackResult<()> {
    let catalog = Catalog::from_config(config)?;
    let resource = Arc::clone(catalog.get(&args.name)?);

    let (line, status) = blocking(move || {
        let mut command = resource.command(&args.args)?;
        let line = std::iter::once(resource.name())
            .chain(args.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        info!("Running {}", line);
        let status = command
            .status()
            .map_err(|e| GetpackError::command_failed(&line, e))?;
        Ok((line, status))
    })
    .await?;

    if !status.success() {
        return Err(GetpackError::ChildExit {
            command: line,
            code: status.code().unwrap_or(1),
        });
    }
    Ok(())
}
