//! Configuration schema for getpack
//!
//! Configuration is stored at `~/.config/getpack/config.toml`

use crate::cache::ResourceDescriptor;
use crate::extract::ExtractionRule;
use crate::fetch::pypi::{host_fragments, DEFAULT_INDEX_URL};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Local cache settings
    pub cache: CacheConfig,

    /// Package index settings
    pub registry: RegistryConfig,

    /// Declared resources
    pub resources: Vec<ResourceConfig>,
}

impl Config {
    /// Find a declared resource by name
    pub fn resource(&self, name: &str) -> Option<&ResourceConfig> {
        self.resources.iter().find(|r| r.name == name)
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Root of the resource cache
    pub base_dir: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            base_dir: ResourceDescriptor::default_local_base(),
        }
    }
}

/// Package index configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Metadata URL template, `{name}` is substituted
    pub index_url: String,

    /// Filename fragments a platform-specific file must contain
    pub platform: Vec<String>,

    /// Interpreter tag narrowing the candidate files (e.g. "cp311")
    pub python_tag: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            platform: host_fragments(std::env::consts::OS, std::env::consts::ARCH),
            python_tag: None,
        }
    }
}

/// Where a resource archive comes from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceConfig {
    /// Download URL; `{name}` and `{version}` are substituted
    Url(String),

    /// Archive on the local filesystem
    File(PathBuf),

    /// Release published on the configured package index
    Pypi,
}

/// One declared resource
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceConfig {
    pub name: String,

    pub version: String,

    /// Sub-directory of the cache grouping resources of one kind
    #[serde(default)]
    pub prefix: String,

    pub source: SourceConfig,

    /// Ordered `from` prefix to `to` prefix rules; everything when empty
    #[serde(default)]
    pub extract: Vec<ExtractionRule>,

    /// Names of resources that must be provided and activated first
    #[serde(default)]
    pub requires: Vec<String>,

    /// Executable stem inside the install directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = Config::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[cache]"));
        assert!(toml.contains("[registry]"));
    }

    #[test]
    fn config_deserializes_empty() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.registry.index_url, DEFAULT_INDEX_URL);
        assert!(config.resources.is_empty());
    }

    #[test]
    fn config_deserializes_resources() {
        let toml = r#"
            [cache]
            base_dir = "/var/cache/getpack"

            [[resources]]
            name = "ffmpeg"
            version = "5.1.2"
            source = { url = "https://github.com/GyanD/codexffmpeg/releases/download/{version}/ffmpeg-{version}-essentials_build.zip" }
            executable = "ffmpeg"
            extract = [{ from = "ffmpeg-{version}-essentials_build/bin/", to = "" }]

            [[resources]]
            name = "six"
            version = "1.16.0"
            prefix = "python"
            source = "pypi"
            requires = ["ffmpeg"]
        "#;
        let config: Config = toml::from_str(toml).unwrap();

        assert_eq!(config.cache.base_dir, PathBuf::from("/var/cache/getpack"));
        assert_eq!(config.registry.index_url, DEFAULT_INDEX_URL); // default preserved

        let ffmpeg = config.resource("ffmpeg").unwrap();
        assert!(matches!(ffmpeg.source, SourceConfig::Url(ref u) if u.contains("{version}")));
        assert_eq!(ffmpeg.extract.len(), 1);
        assert_eq!(ffmpeg.executable.as_deref(), Some("ffmpeg"));
        assert!(ffmpeg.prefix.is_empty());

        let six = config.resource("six").unwrap();
        assert_eq!(six.source, SourceConfig::Pypi);
        assert_eq!(six.requires, vec!["ffmpeg".to_string()]);
        assert_eq!(six.prefix, "python");
    }

    #[test]
    fn resource_requires_source() {
        let toml = r#"
            [[resources]]
            name = "demo"
            version = "1.0"
        "#;
        assert!(toml::from_str::<Config>(toml).is_err());
    }
}
