//! Archive extraction into a staging directory
//!
//! An [`ExtractorRegistry`] picks a format by matching the archive filename
//! against an ordered table of patterns. The selected [`ArchiveExtractor`]
//! lists member files and returns their bytes; an [`ExtractionMap`] decides
//! which members are kept and where they land.

mod tarball;
mod zipfile;

pub use tarball::TarExtractor;
pub use zipfile::ZipExtractor;

use crate::cache::{Deployer, ResourceDescriptor};
use crate::error::{GetpackError, GetpackResult};
use crate::fetch::Fetchable;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Read;
use std::path::{Component, Path};
use std::sync::Arc;
use tracing::{debug, trace};

/// Read access to the members of a fully buffered archive
pub trait ArchiveExtractor {
    /// Member files in archive order, directories excluded
    fn file_list(&self) -> Vec<String>;

    /// Contents of one member
    fn read(&mut self, member: &str) -> GetpackResult<Vec<u8>>;

    /// Unix permission bits recorded for a member, if any
    fn mode(&self, _member: &str) -> Option<u32> {
        None
    }
}

/// Opens an archive from its buffered bytes
pub type ExtractorFactory = fn(&str, Vec<u8>) -> GetpackResult<Box<dyn ArchiveExtractor>>;

/// Ordered `filename pattern -> extractor` table; first match wins
#[derive(Debug, Clone)]
pub struct ExtractorRegistry {
    plugins: Vec<(Regex, ExtractorFactory)>,
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::empty()
            .register(r".+\.(whl|zip)$", ZipExtractor::open_boxed)
            .and_then(|r| {
                r.register(
                    r".+\.(tar|tar\.gz|tgz|tar\.xz|txz|tar\.bz2?|tbz2?)$",
                    TarExtractor::open_boxed,
                )
            })
            .unwrap_or_else(|_| Self::empty())
    }
}

impl ExtractorRegistry {
    /// A registry that recognizes nothing
    pub fn empty() -> Self {
        Self {
            plugins: Vec::new(),
        }
    }

    /// Append a plugin after the existing ones
    pub fn register(mut self, pattern: &str, factory: ExtractorFactory) -> GetpackResult<Self> {
        let regex = Regex::new(pattern).map_err(|e| {
            GetpackError::precondition(format!("invalid extractor pattern {}: {}", pattern, e))
        })?;
        self.plugins.push((regex, factory));
        Ok(self)
    }

    /// Buffer `stream` and open it with the extractor matching `archive_name`
    pub fn open(
        &self,
        archive_name: &str,
        mut stream: impl Read,
    ) -> GetpackResult<Box<dyn ArchiveExtractor>> {
        let factory = self
            .plugins
            .iter()
            .find(|(pattern, _)| pattern.is_match(archive_name))
            .map(|(_, factory)| *factory)
            .ok_or_else(|| GetpackError::NoExtractor(archive_name.to_string()))?;

        // Archives are resource-sized; buffering keeps zip central-directory access simple
        let mut bytes = Vec::new();
        stream
            .read_to_end(&mut bytes)
            .map_err(|e| GetpackError::archive(archive_name, e))?;
        debug!("Read {} bytes of {}", bytes.len(), archive_name);

        factory(archive_name, bytes)
    }
}

/// One prefix rewrite: members starting with `from` land under `to`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionRule {
    /// Member path prefix; `{name}` and `{version}` are substituted
    pub from: String,

    /// Destination prefix inside the resource directory
    #[serde(default)]
    pub to: String,
}

/// Ordered prefix rewrites; members matching no rule are skipped
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractionMap {
    rules: Vec<ExtractionRule>,
}

impl Default for ExtractionMap {
    /// Extract everything as-is
    fn default() -> Self {
        Self::new().rule("", "")
    }
}

impl ExtractionMap {
    /// A map without rules, which extracts nothing
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    pub fn from_rules(rules: Vec<ExtractionRule>) -> Self {
        Self { rules }
    }

    pub fn rule(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
        self.rules.push(ExtractionRule {
            from: from.into(),
            to: to.into(),
        });
        self
    }

    pub fn rules(&self) -> &[ExtractionRule] {
        &self.rules
    }

    /// Relative destination for `member`, or `None` when it is filtered out
    pub fn destination(
        &self,
        descriptor: &ResourceDescriptor,
        member: &str,
    ) -> GetpackResult<Option<String>> {
        for rule in &self.rules {
            let prefix = descriptor.expand(&rule.from);
            if let Some(rest) = member.strip_prefix(prefix.as_str()) {
                let destination = format!("{}{}", descriptor.expand(&rule.to), rest);
                check_relative(member, &destination)?;
                return Ok(Some(destination));
            }
        }
        Ok(None)
    }
}

/// Reject destinations that are empty or escape the target directory
fn check_relative(member: &str, destination: &str) -> GetpackResult<()> {
    let unsafe_entry = || GetpackError::UnsafeEntry {
        entry: member.to_string(),
        destination: destination.to_string(),
    };

    if destination.is_empty() || destination.starts_with('/') || destination.starts_with('\\') {
        return Err(unsafe_entry());
    }
    let escapes = Path::new(destination)
        .components()
        .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
    if escapes {
        return Err(unsafe_entry());
    }
    Ok(())
}

/// Write the selected members of `extractor` under `target`
///
/// Returns the number of files written. Existing files are overwritten.
pub fn extract_into(
    extractor: &mut dyn ArchiveExtractor,
    map: &ExtractionMap,
    descriptor: &ResourceDescriptor,
    target: &Path,
) -> GetpackResult<usize> {
    let mut written = 0;
    for member in extractor.file_list() {
        let Some(relative) = map.destination(descriptor, &member)? else {
            trace!("Skipping {}", member);
            continue;
        };

        let dest = target.join(&relative);
        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| GetpackError::io(format!("creating {}", parent.display()), e))?;
        }

        let bytes = extractor.read(&member)?;
        fs::write(&dest, bytes)
            .map_err(|e| GetpackError::io(format!("writing {}", dest.display()), e))?;

        #[cfg(unix)]
        if let Some(mode) = extractor.mode(&member) {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(&dest, fs::Permissions::from_mode(mode & 0o777))
                .map_err(|e| GetpackError::io(format!("setting mode of {}", dest.display()), e))?;
        }

        written += 1;
    }
    Ok(written)
}

/// Deploys a resource by fetching an archive and extracting it
pub struct ArchiveDeployer {
    source: Box<dyn Fetchable>,
    extraction: ExtractionMap,
    extractors: Arc<ExtractorRegistry>,
}

impl ArchiveDeployer {
    pub fn new(source: impl Fetchable + 'static) -> Self {
        Self {
            source: Box::new(source),
            extraction: ExtractionMap::default(),
            extractors: Arc::new(ExtractorRegistry::default()),
        }
    }

    pub fn with_extraction(mut self, extraction: ExtractionMap) -> Self {
        self.extraction = extraction;
        self
    }

    pub fn with_extractors(mut self, extractors: Arc<ExtractorRegistry>) -> Self {
        self.extractors = extractors;
        self
    }

    pub fn source(&self) -> &dyn Fetchable {
        self.source.as_ref()
    }
}

impl Deployer for ArchiveDeployer {
    fn deploy_to(&self, descriptor: &ResourceDescriptor, target: &Path) -> GetpackResult<()> {
        let archive_name = self.source.archive_name(descriptor)?;
        if archive_name.is_empty() {
            return Err(GetpackError::precondition(format!(
                "No archive name defined for {}",
                descriptor
            )));
        }

        let stream = self.source.open(descriptor)?;
        let mut extractor = self.extractors.open(&archive_name, stream)?;
        let written = extract_into(extractor.as_mut(), &self.extraction, descriptor, target)?;
        debug!("Extracted {} files from {}", written, archive_name);
        Ok(())
    }
}
