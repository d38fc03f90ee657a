//! Resource identity: name, version and where its cache directory lives

use super::entry::TEMP_SUFFIX;
use crate::error::{GetpackError, GetpackResult};
use std::fmt;
use std::path::{Path, PathBuf};

/// On-disk identity of a resource
///
/// Construct through [`ResourceDescriptor::builder`], which validates the
/// name and version. A descriptor is plain data; all durable state lives on
/// disk under [`ResourceDescriptor::identity_path`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceDescriptor {
    name: String,
    version: String,
    local_base: PathBuf,
    local_prefix: String,
}

impl ResourceDescriptor {
    /// Start building a descriptor for `name` at `version`
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> DescriptorBuilder {
        DescriptorBuilder {
            name: name.into(),
            version: version.into(),
            local_base: None,
            local_prefix: String::new(),
        }
    }

    /// Default cache root, the per-user application data directory
    pub fn default_local_base() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("getpack")
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn local_base(&self) -> &Path {
        &self.local_base
    }

    pub fn local_prefix(&self) -> &str {
        &self.local_prefix
    }

    /// `<local_base>/<local_prefix>/<name>/<version>`
    pub fn identity_path(&self) -> PathBuf {
        let mut path = self.local_base.clone();
        if !self.local_prefix.is_empty() {
            path.push(&self.local_prefix);
        }
        path.join(&self.name).join(&self.version)
    }

    /// Check the name, version and prefix are usable as path components
    pub fn validate(&self) -> GetpackResult<()> {
        validate_component("name", &self.name)?;
        validate_component("version", &self.version)?;
        if !self.local_prefix.is_empty() {
            for part in self.local_prefix.split(['/', '\\']) {
                validate_component("prefix", part)?;
            }
        }
        Ok(())
    }

    /// Substitute `{name}` and `{version}` placeholders in a template
    pub fn expand(&self, template: &str) -> String {
        template
            .replace("{name}", &self.name)
            .replace("{version}", &self.version)
    }
}

impl fmt::Display for ResourceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.name, self.version)
    }
}

/// Builder for [`ResourceDescriptor`]
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    name: String,
    version: String,
    local_base: Option<PathBuf>,
    local_prefix: String,
}

impl DescriptorBuilder {
    /// Override the cache root (defaults to [`ResourceDescriptor::default_local_base`])
    pub fn local_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.local_base = Some(base.into());
        self
    }

    /// Group resources of one kind under a sub-directory, e.g. `python`
    pub fn local_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.local_prefix = prefix.into();
        self
    }

    pub fn build(self) -> GetpackResult<ResourceDescriptor> {
        let descriptor = ResourceDescriptor {
            name: self.name,
            version: self.version,
            local_base: self
                .local_base
                .unwrap_or_else(ResourceDescriptor::default_local_base),
            local_prefix: self.local_prefix,
        };
        descriptor.validate()?;
        Ok(descriptor)
    }
}

fn validate_component(field: &str, value: &str) -> GetpackResult<()> {
    if value.is_empty() {
        return Err(GetpackError::precondition(format!(
            "Resource should have a {}",
            field
        )));
    }
    if value.contains('/') || value.contains('\\') || value.contains('\0') {
        return Err(GetpackError::precondition(format!(
            "Invalid resource {} '{}': must not contain path separators",
            field, value
        )));
    }
    if value == "." || value == ".." {
        return Err(GetpackError::precondition(format!(
            "Invalid resource {} '{}': must name a directory",
            field, value
        )));
    }
    // Staging directories and lock files share the version directory's parent
    if value.ends_with(TEMP_SUFFIX) || value.ends_with(".lock") {
        return Err(GetpackError::precondition(format!(
            "Invalid resource {} '{}': '{}' and '.lock' suffixes are reserved",
            field, value, TEMP_SUFFIX
        )));
    }
    Ok(())
}
