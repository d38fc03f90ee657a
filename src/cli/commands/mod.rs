//! CLI command implementations

pub mod cleanup;
pub mod config;
pub mod provide;
pub mod resolve;
pub mod run;
pub mod versions;

pub use cleanup::execute as cleanup;
pub use config::execute as config;
pub use provide::execute as provide;
pub use resolve::execute as resolve;
pub use run::execute as run;
pub use versions::execute as versions;

use crate::catalog::Catalog;
use crate::error::{GetpackError, GetpackResult};
use crate::resource::Resource;
use std::sync::Arc;

/// Run cache work on the blocking pool
pub(crate) async fn blocking<T, F>(work: F) -> GetpackResult<T>
where
    F: FnOnce() -> GetpackResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| GetpackError::Internal(format!("blocking task failed: {}", e)))?
}

/// Named resources, or every declared one when `names` is empty
pub(crate) fn select(catalog: &Catalog, names: &[String]) -> GetpackResult<Vec<Arc<Resource>>> {
    if names.is_empty() {
        return Ok(catalog.iter().cloned().collect());
    }
    names
        .iter()
        .map(|name| catalog.get(name).cloned())
        .collect()
}
