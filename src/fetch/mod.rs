//! Where resource archives come from
//!
//! A [`Fetchable`] names the archive (the name selects the extractor) and
//! opens a byte stream over it. URLs are downloaded with a single blocking
//! GET; local files are read directly.

pub mod pypi;

pub use pypi::{PlatformTag, PypiSource, ReleaseFile};

use crate::cache::ResourceDescriptor;
use crate::error::{GetpackError, GetpackResult};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::info;

/// A source of resource archives
pub trait Fetchable: Send + Sync {
    /// Filename of the archive, e.g. `ffmpeg-5.1.2-essentials_build.zip`
    fn archive_name(&self, descriptor: &ResourceDescriptor) -> GetpackResult<String>;

    /// Open the archive contents
    fn open(&self, descriptor: &ResourceDescriptor) -> GetpackResult<Box<dyn Read>>;
}

/// Archive downloaded from a URL
///
/// The URL may contain `{name}` and `{version}` placeholders.
#[derive(Debug, Clone)]
pub struct UrlSource {
    template: String,
}

impl UrlSource {
    pub fn new(template: impl Into<String>) -> Self {
        Self {
            template: template.into(),
        }
    }

    pub fn url(&self, descriptor: &ResourceDescriptor) -> String {
        descriptor.expand(&self.template)
    }
}

impl Fetchable for UrlSource {
    fn archive_name(&self, descriptor: &ResourceDescriptor) -> GetpackResult<String> {
        archive_name_from_url(&self.url(descriptor))
    }

    fn open(&self, descriptor: &ResourceDescriptor) -> GetpackResult<Box<dyn Read>> {
        http_get(&self.url(descriptor))
    }
}

/// Archive already on the local filesystem
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Fetchable for FileSource {
    fn archive_name(&self, _descriptor: &ResourceDescriptor) -> GetpackResult<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                GetpackError::precondition(format!(
                    "{} does not name an archive file",
                    self.path.display()
                ))
            })
    }

    fn open(&self, _descriptor: &ResourceDescriptor) -> GetpackResult<Box<dyn Read>> {
        let file = File::open(&self.path)
            .map_err(|e| GetpackError::io(format!("opening {}", self.path.display()), e))?;
        Ok(Box::new(file))
    }
}

/// Last path segment of a URL, ignoring query and fragment
pub fn archive_name_from_url(url: &str) -> GetpackResult<String> {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    let without_scheme = path.split_once("://").map_or(path, |(_, rest)| rest);
    match without_scheme.split_once('/') {
        Some((_, route)) => {
            let name = route.rsplit('/').next().unwrap_or_default();
            if name.is_empty() {
                Err(GetpackError::precondition(format!(
                    "URL {} does not end in an archive name",
                    url
                )))
            } else {
                Ok(name.to_string())
            }
        }
        None => Err(GetpackError::precondition(format!(
            "URL {} has no path",
            url
        ))),
    }
}

/// GET `url`, requiring a 200 response
pub(crate) fn http_get(url: &str) -> GetpackResult<Box<dyn Read>> {
    info!("Downloading {}", url);
    let response = ureq::get(url).call().map_err(|e| match e {
        ureq::Error::StatusCode(status) => GetpackError::UnexpectedStatus {
            url: url.to_string(),
            status,
        },
        other => GetpackError::Http {
            url: url.to_string(),
            reason: other.to_string(),
        },
    })?;

    let status = response.status().as_u16();
    if status != 200 {
        return Err(GetpackError::UnexpectedStatus {
            url: url.to_string(),
            status,
        });
    }
    Ok(Box::new(response.into_body().into_reader()))
}
