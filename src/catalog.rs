//! Resources declared in the configuration file
//!
//! Requirements are resolved by name. A resource required by several others
//! is built once and shared, so it is provided and activated once.

use crate::config::{Config, RegistryConfig, ResourceConfig, SourceConfig};
use crate::error::{GetpackError, GetpackResult};
use crate::extract::{ArchiveDeployer, ExtractionMap, ExtractorRegistry};
use crate::fetch::{FileSource, PlatformTag, PypiSource, UrlSource};
use crate::resource::Resource;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Named resources built from a [`Config`]
#[derive(Debug)]
pub struct Catalog {
    resources: Vec<Arc<Resource>>,
    by_name: HashMap<String, usize>,
}

impl Catalog {
    /// Build every declared resource under `config.cache.base_dir`
    pub fn from_config(config: &Config) -> GetpackResult<Self> {
        Self::with_base_dir(config, &config.cache.base_dir)
    }

    /// Build every declared resource under `base_dir`
    pub fn with_base_dir(config: &Config, base_dir: &Path) -> GetpackResult<Self> {
        let mut declared = HashMap::new();
        for resource in &config.resources {
            if declared.insert(resource.name.as_str(), resource).is_some() {
                return Err(GetpackError::DuplicateResource(resource.name.clone()));
            }
        }

        let mut builder = CatalogBuilder {
            declared,
            registry: &config.registry,
            base_dir: base_dir.to_path_buf(),
            extractors: Arc::new(ExtractorRegistry::default()),
            built: HashMap::new(),
            visiting: HashSet::new(),
        };

        let mut resources = Vec::with_capacity(config.resources.len());
        let mut by_name = HashMap::new();
        for resource in &config.resources {
            by_name.insert(resource.name.clone(), resources.len());
            resources.push(builder.build(&resource.name)?);
        }

        Ok(Self { resources, by_name })
    }

    /// Look up a resource by name
    pub fn get(&self, name: &str) -> GetpackResult<&Arc<Resource>> {
        self.by_name
            .get(name)
            .map(|&index| &self.resources[index])
            .ok_or_else(|| GetpackError::ResourceNotFound(name.to_string()))
    }

    /// Resource names in declaration order
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.resources.iter().map(|r| r.name())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<Resource>> {
        self.resources.iter()
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

/// Index client configured from the `[registry]` section
pub fn pypi_source(registry: &RegistryConfig) -> PypiSource {
    PypiSource::new()
        .with_index_url(&registry.index_url)
        .with_platform(PlatformTag::new(registry.platform.clone()))
        .with_python_tag(registry.python_tag.clone())
}

struct CatalogBuilder<'a> {
    declared: HashMap<&'a str, &'a ResourceConfig>,
    registry: &'a RegistryConfig,
    base_dir: PathBuf,
    extractors: Arc<ExtractorRegistry>,
    built: HashMap<String, Arc<Resource>>,
    visiting: HashSet<String>,
}

impl CatalogBuilder<'_> {
    fn build(&mut self, name: &str) -> GetpackResult<Arc<Resource>> {
        if let Some(resource) = self.built.get(name) {
            return Ok(Arc::clone(resource));
        }
        let declared = *self
            .declared
            .get(name)
            .ok_or_else(|| GetpackError::ResourceNotFound(name.to_string()))?;
        if !self.visiting.insert(name.to_string()) {
            return Err(GetpackError::RequirementCycle(name.to_string()));
        }

        let mut builder = Resource::builder(&declared.name, &declared.version)
            .local_base(&self.base_dir)
            .local_prefix(&declared.prefix)
            .deployer(self.deployer(declared));
        for requirement in &declared.requires {
            builder = builder.requires(self.build(requirement)?);
        }
        if let Some(executable) = &declared.executable {
            builder = builder.executable(executable);
        }

        let resource = Arc::new(builder.build()?);
        debug!("Declared {}", resource.descriptor());
        self.visiting.remove(name);
        self.built.insert(name.to_string(), Arc::clone(&resource));
        Ok(resource)
    }

    fn deployer(&self, declared: &ResourceConfig) -> ArchiveDeployer {
        let deployer = match &declared.source {
            SourceConfig::Url(template) => ArchiveDeployer::new(UrlSource::new(template)),
            SourceConfig::File(path) => ArchiveDeployer::new(FileSource::new(path)),
            SourceConfig::Pypi => ArchiveDeployer::new(pypi_source(self.registry)),
        };

        let extraction = if declared.extract.is_empty() {
            ExtractionMap::default()
        } else {
            ExtractionMap::from_rules(declared.extract.clone())
        };
        deployer
            .with_extraction(extraction)
            .with_extractors(Arc::clone(&self.extractors))
    }
}
