//! Resolve command - show which index file a release maps to

use super::blocking;
use crate::cache::ResourceDescriptor;
use crate::catalog::pypi_source;
use crate::cli::args::ResolveArgs;
use crate::config::Config;
use crate::error::GetpackResult;

/// Execute the resolve command
///
/// Prints only the URL (or filename) so the output can be piped.
pub async fn execute(args: ResolveArgs, config: &Config) -> GetpackResult<()> {
    let source = pypi_source(&config.registry);
    let descriptor = ResourceDescriptor::builder(&args.name, &args.version)
        .local_base(&config.cache.base_dir)
        .build()?;

    let release = blocking(move || source.release(&descriptor).cloned()).await?;

    if args.filename {
        println!("{}", release.filename);
    } else {
        println!("{}", release.url);
    }
    Ok(())
}
