//! Provide command - make declared resources available

use super::select;
use crate::catalog::Catalog;
use crate::cli::args::ProvideArgs;
use crate::config::Config;
use crate::error::{GetpackError, GetpackResult};
use crate::ui::{self, ProvideProgress, UiContext};
use std::path::PathBuf;
use tracing::debug;

/// Execute the provide command
///
/// Resources are provided concurrently on the blocking pool. Every failure
/// is reported; the first one becomes the command's error.
pub async fn execute(args: ProvideArgs, config: &Config) -> GetpackResult<()> {
    let ctx = UiContext::detect();
    let catalog = Catalog::from_config(config)?;
    let resources = select(&catalog, &args.names)?;

    if resources.is_empty() {
        ui::step_warn_hint(
            &ctx,
            "No resources declared",
            "Add [[resources]] entries to the config file",
        );
        return Ok(());
    }

    let progress = ProvideProgress::new(&ctx, resources.len());
    let tasks: Vec<_> = resources
        .into_iter()
        .map(|resource| {
            let label = resource.descriptor().to_string();
            let force = args.force;
            let task = tokio::task::spawn_blocking(move || -> GetpackResult<PathBuf> {
                if force {
                    resource.deploy()?;
                }
                resource.provide()?;
                Ok(resource.path().to_path_buf())
            });
            (label, task)
        })
        .collect();

    let mut results = Vec::with_capacity(tasks.len());
    for (label, task) in tasks {
        let result = match task.await {
            Ok(result) => result,
            Err(e) => Err(GetpackError::Internal(format!(
                "provide task for {} failed: {}",
                label, e
            ))),
        };
        progress.finished(&label);
        results.push((label, result));
    }
    progress.finish();

    let mut first_error = None;
    for (label, result) in results {
        match result {
            Ok(path) => {
                debug!("{} available at {}", label, path.display());
                ui::step_ok_detail(&ctx, &label, &path.display().to_string());
            }
            Err(e) => {
                ui::step_error_detail(&ctx, &label, &e.to_string());
                first_error.get_or_insert(e);
            }
        }
    }

    match first_error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
