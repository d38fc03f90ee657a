//! Resources: a cache entry plus how to produce and activate it
//!
//! A [`Resource`] composes a [`CacheEntry`] with a [`Deployer`] that fills
//! it, the resources it requires, an optional activation hook and an
//! optional executable name. Requirements are provided and activated before
//! the resource that needs them.

pub mod activation;
mod invoke;

pub use activation::{ActivationHook, Handle};

use crate::cache::{CacheEntry, DescriptorBuilder, Deployer, ResourceDescriptor};
use crate::error::{GetpackError, GetpackResult};
use crate::extract::{ArchiveDeployer, ExtractionMap};
use crate::fetch::Fetchable;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// A cacheable resource with its requirements
pub struct Resource {
    entry: CacheEntry,
    deployer: Box<dyn Deployer>,
    requirements: Vec<Arc<Resource>>,
    hook: Option<Box<dyn ActivationHook>>,
    executable: Option<String>,
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resource")
            .field("descriptor", self.entry.descriptor())
            .field(
                "requirements",
                &self
                    .requirements
                    .iter()
                    .map(|r| r.name())
                    .collect::<Vec<_>>(),
            )
            .field("executable", &self.executable)
            .finish_non_exhaustive()
    }
}

impl Resource {
    /// Start declaring a resource
    pub fn builder(name: impl Into<String>, version: impl Into<String>) -> ResourceBuilder {
        ResourceBuilder {
            descriptor: ResourceDescriptor::builder(name, version),
            deployer: None,
            requirements: Vec::new(),
            hook: None,
            executable: None,
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        self.entry.descriptor()
    }

    pub fn name(&self) -> &str {
        self.descriptor().name()
    }

    pub fn version(&self) -> &str {
        self.descriptor().version()
    }

    /// Install directory (the identity path)
    pub fn path(&self) -> &Path {
        self.entry.path()
    }

    pub fn entry(&self) -> &CacheEntry {
        &self.entry
    }

    pub fn requirements(&self) -> &[Arc<Resource>] {
        &self.requirements
    }

    /// Executable stem inside the install directory, if declared
    pub fn executable(&self) -> Option<&str> {
        self.executable.as_deref()
    }

    pub fn is_available(&self) -> bool {
        self.entry.is_available()
    }

    pub fn is_activated(&self) -> bool {
        self.entry.is_activated()
    }

    /// Versions of this resource present in the cache
    pub fn available_versions(&self) -> GetpackResult<Vec<String>> {
        self.entry.available_versions()
    }

    /// Provide every requirement, then this resource
    ///
    /// Afterwards the install directory is on the process search path.
    pub fn provide(&self) -> GetpackResult<()> {
        for requirement in &self.requirements {
            requirement.provide()?;
        }
        self.entry.provide(self.deployer.as_ref())?;

        if activation::prepend(self.path()) {
            debug!("Added {} to search path", self.path().display());
        }
        Ok(())
    }

    /// Redeploy unconditionally
    pub fn deploy(&self) -> GetpackResult<()> {
        self.entry.deploy(self.deployer.as_ref())
    }

    /// Remove this version from the cache
    pub fn cleanup(&self) -> GetpackResult<()> {
        self.entry.cleanup()?;
        activation::remove(self.path());
        Ok(())
    }

    /// Provide and activate this resource and its requirements
    ///
    /// The activation hook runs at most once per identity path in this
    /// process. A failing hook leaves the resource not activated, so a later
    /// call tries again. Called again from inside its own hook, this returns
    /// the handle without re-running anything.
    pub fn activate(&self) -> GetpackResult<Handle<'_>> {
        if self.entry.is_activated() {
            return Ok(Handle::new(self));
        }

        let in_progress = self.entry.activation_guard();
        if self.entry.is_activated() {
            return Ok(Handle::new(self));
        }
        if in_progress.get() {
            debug!("Activation of {} already in progress", self.descriptor());
            return Ok(Handle::new(self));
        }

        in_progress.set(true);
        let result = self.run_activation();
        in_progress.set(false);
        result?;

        self.entry.mark_activated();
        info!("Activated {}", self.descriptor());
        Ok(Handle::new(self))
    }

    fn run_activation(&self) -> GetpackResult<()> {
        self.provide()?;
        for requirement in &self.requirements {
            requirement.activate()?;
        }

        if let Some(stem) = &self.executable {
            let program = Handle::new(self).executable_path()?;
            if !program.is_file() {
                return Err(GetpackError::Activation {
                    name: self.name().to_string(),
                    reason: format!("executable {} not found at {}", stem, program.display()),
                });
            }
        }
        if let Some(hook) = &self.hook {
            hook.activate(self)?;
        }
        Ok(())
    }
}

/// Builder for [`Resource`]
pub struct ResourceBuilder {
    descriptor: DescriptorBuilder,
    deployer: Option<Box<dyn Deployer>>,
    requirements: Vec<Arc<Resource>>,
    hook: Option<Box<dyn ActivationHook>>,
    executable: Option<String>,
}

impl ResourceBuilder {
    pub fn local_base(mut self, base: impl Into<PathBuf>) -> Self {
        self.descriptor = self.descriptor.local_base(base);
        self
    }

    pub fn local_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.descriptor = self.descriptor.local_prefix(prefix);
        self
    }

    /// Fill the staging directory with a custom routine
    pub fn deployer(mut self, deployer: impl Deployer + 'static) -> Self {
        self.deployer = Some(Box::new(deployer));
        self
    }

    /// Fetch an archive from `source` and extract it through `extraction`
    pub fn archive(self, source: impl Fetchable + 'static, extraction: ExtractionMap) -> Self {
        self.deployer(ArchiveDeployer::new(source).with_extraction(extraction))
    }

    /// Add a requirement; requirements are handled in insertion order
    pub fn requires(mut self, requirement: Arc<Resource>) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn on_activate(mut self, hook: impl ActivationHook + 'static) -> Self {
        self.hook = Some(Box::new(hook));
        self
    }

    pub fn executable(mut self, stem: impl Into<String>) -> Self {
        self.executable = Some(stem.into());
        self
    }

    pub fn build(self) -> GetpackResult<Resource> {
        let descriptor = self.descriptor.build()?;
        let deployer = self.deployer.ok_or_else(|| {
            GetpackError::precondition(format!("No deployer defined for {}", descriptor))
        })?;

        Ok(Resource {
            entry: CacheEntry::new(descriptor),
            deployer,
            requirements: self.requirements,
            hook: self.hook,
            executable: self.executable,
        })
    }
}
