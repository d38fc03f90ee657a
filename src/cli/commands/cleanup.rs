//! Cleanup command - remove resources from the cache

use super::{blocking, select};
use crate::catalog::Catalog;
use crate::cli::args::CleanupArgs;
use crate::config::Config;
use crate::error::GetpackResult;
use crate::ui::{self, TaskSpinner, UiContext};
use std::sync::Arc;

/// Execute the cleanup command
pub async fn execute(args: CleanupArgs, config: &Config) -> GetpackResult<()> {
    let ctx = UiContext::detect();
    let catalog = Catalog::from_config(config)?;
    // --all and an empty name list both mean every declared resource
    let resources = select(&catalog, &args.names)?;

    if resources.is_empty() {
        ui::step_info(&ctx, "Nothing to clean up");
        return Ok(());
    }

    for resource in resources {
        let label = resource.descriptor().to_string();
        let mut spinner = TaskSpinner::new(&ctx);
        spinner.start(&format!("Removing {}...", label));

        let target = Arc::clone(&resource);
        match blocking(move || target.cleanup()).await {
            Ok(()) => spinner.stop(&format!("Removed {}", label)),
            Err(e) => {
                spinner.stop_error(&format!("Failed to remove {}", label));
                return Err(e);
            }
        }
    }

    Ok(())
}
