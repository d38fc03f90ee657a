//! Resolution of packages published on a PyPI-style JSON index
//!
//! `GET <index>/<name>/json` returns every release of a project. For the
//! requested version exactly one file must survive the platform filter;
//! anything else fails with the full candidate list so the caller can see
//! why.

use super::{http_get, Fetchable};
use crate::cache::ResourceDescriptor;
use crate::error::{GetpackError, GetpackResult};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::Read;
use std::sync::{LazyLock, OnceLock};
use tracing::debug;

/// Default metadata endpoint, `{name}` is substituted
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi/{name}/json";

static ANY_PLATFORM: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"\Wany\W").unwrap()
});

/// One downloadable file of a release
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseFile {
    pub filename: String,
    pub url: String,
    #[serde(default)]
    pub python_version: String,
}

impl ReleaseFile {
    fn is_source(&self) -> bool {
        self.python_version == "source"
    }
}

#[derive(Debug, Deserialize)]
struct ProjectMetadata {
    #[serde(default)]
    releases: HashMap<String, Vec<ReleaseFile>>,
}

/// Filename fragments identifying the target platform
///
/// A file matches when its name contains every fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlatformTag {
    fragments: Vec<String>,
}

impl PlatformTag {
    pub fn new<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            fragments: fragments.into_iter().map(Into::into).collect(),
        }
    }

    /// Fragments for the platform this binary was built for
    pub fn host() -> Self {
        Self::new(host_fragments(
            std::env::consts::OS,
            std::env::consts::ARCH,
        ))
    }

    pub fn fragments(&self) -> &[String] {
        &self.fragments
    }

    pub fn matches(&self, filename: &str) -> bool {
        !self.fragments.is_empty() && self.fragments.iter().all(|f| filename.contains(f.as_str()))
    }
}

impl Default for PlatformTag {
    fn default() -> Self {
        Self::host()
    }
}

/// Wheel filename fragments for an `(os, arch)` pair
pub fn host_fragments(os: &str, arch: &str) -> Vec<String> {
    let fragments: Vec<&str> = match (os, arch) {
        ("windows", "x86_64") => vec!["win_amd64"],
        ("windows", "x86") => vec!["win32"],
        ("windows", "aarch64") => vec!["win_arm64"],
        ("macos", "aarch64") => vec!["macosx", "arm64"],
        ("macos", arch) => vec!["macosx", arch],
        (os, arch) => vec![os, arch],
    };
    fragments.into_iter().map(str::to_string).collect()
}

/// Pick the single file of a release usable on `platform`
///
/// A release consisting of one source distribution is taken as-is. Otherwise
/// files must match the platform tag or be platform independent (`-any.`),
/// and contain `python_tag` when one is given.
///
/// More than one match is an error rather than a guess. Releases that ship a
/// wheel per interpreter (`cp310`, `cp311`, ...) usually match several files
/// for one platform, so they need `registry.python_tag` set to resolve.
pub fn select_release(
    name: &str,
    version: &str,
    files: &[ReleaseFile],
    platform: &PlatformTag,
    python_tag: Option<&str>,
) -> GetpackResult<ReleaseFile> {
    let selected: Vec<&ReleaseFile> = if files.len() == 1 && files[0].is_source() {
        files.iter().collect()
    } else {
        files
            .iter()
            .filter(|f| platform.matches(&f.filename) || ANY_PLATFORM.is_match(&f.filename))
            .filter(|f| python_tag.map_or(true, |tag| f.filename.contains(tag)))
            .collect()
    };

    let candidates = || {
        files
            .iter()
            .map(|f| {
                if selected.contains(&f) {
                    format!("{} (selected)", f.filename)
                } else {
                    f.filename.clone()
                }
            })
            .collect::<Vec<_>>()
            .join(", ")
    };

    match selected.as_slice() {
        [only] => Ok((*only).clone()),
        [] => Err(GetpackError::NoRelease {
            name: name.to_string(),
            version: version.to_string(),
            candidates: candidates(),
        }),
        _ => Err(GetpackError::AmbiguousRelease {
            name: name.to_string(),
            version: version.to_string(),
            candidates: candidates(),
        }),
    }
}

/// Package resolved through a PyPI-style index
///
/// The release lookup happens once per source object; later calls reuse the
/// selected file.
#[derive(Debug)]
pub struct PypiSource {
    index_url: String,
    platform: PlatformTag,
    python_tag: Option<String>,
    release: OnceLock<ReleaseFile>,
}

impl Default for PypiSource {
    fn default() -> Self {
        Self::new()
    }
}

impl PypiSource {
    pub fn new() -> Self {
        Self {
            index_url: DEFAULT_INDEX_URL.to_string(),
            platform: PlatformTag::host(),
            python_tag: None,
            release: OnceLock::new(),
        }
    }

    pub fn with_index_url(mut self, index_url: impl Into<String>) -> Self {
        self.index_url = index_url.into();
        self
    }

    pub fn with_platform(mut self, platform: PlatformTag) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_python_tag(mut self, python_tag: Option<String>) -> Self {
        self.python_tag = python_tag;
        self
    }

    /// Metadata URL for a project
    pub fn metadata_url(&self, name: &str) -> String {
        self.index_url.replace("{name}", name)
    }

    /// The selected release file, fetched on first use
    pub fn release(&self, descriptor: &ResourceDescriptor) -> GetpackResult<&ReleaseFile> {
        if let Some(release) = self.release.get() {
            return Ok(release);
        }

        let url = self.metadata_url(descriptor.name());
        let metadata: ProjectMetadata = serde_json::from_reader(http_get(&url)?)?;
        let selected = self.select(descriptor, &metadata)?;
        Ok(self.release.get_or_init(|| selected))
    }

    fn select(
        &self,
        descriptor: &ResourceDescriptor,
        metadata: &ProjectMetadata,
    ) -> GetpackResult<ReleaseFile> {
        let files = metadata.releases.get(descriptor.version()).ok_or_else(|| {
            let mut known: Vec<&str> = metadata.releases.keys().map(String::as_str).collect();
            known.sort_unstable();
            GetpackError::ReleaseNotFound {
                name: descriptor.name().to_string(),
                version: descriptor.version().to_string(),
                known: known.join(", "),
            }
        })?;

        debug!(
            "Available releases:\n\t{}",
            files
                .iter()
                .map(|f| f.filename.as_str())
                .collect::<Vec<_>>()
                .join("\n\t")
        );

        select_release(
            descriptor.name(),
            descriptor.version(),
            files,
            &self.platform,
            self.python_tag.as_deref(),
        )
    }
}

impl Fetchable for PypiSource {
    fn archive_name(&self, descriptor: &ResourceDescriptor) -> GetpackResult<String> {
        Ok(self.release(descriptor)?.filename.clone())
    }

    fn open(&self, descriptor: &ResourceDescriptor) -> GetpackResult<Box<dyn Read>> {
        let url = self.release(descriptor)?.url.clone();
        http_get(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(filename: &str, python_version: &str) -> ReleaseFile {
        ReleaseFile {
            filename: filename.to_string(),
            url: format!("https://files.example/{}", filename),
            python_version: python_version.to_string(),
        }
    }

    fn windows() -> PlatformTag {
        PlatformTag::new(["win_amd64"])
    }

    #[test]
    fn single_source_accepted() {
        let files = vec![file("glue-0.13.tar.gz", "source")];
        let selected = select_release("glue", "0.13", &files, &windows(), None).unwrap();
        assert_eq!(selected.filename, "glue-0.13.tar.gz");
    }

    #[test]
    fn platform_wheel_selected() {
        let files = vec![
            file("cefpython3-66.1-py2.py3-none-win_amd64.whl", "py2.py3"),
            file("cefpython3-66.1-py2.py3-none-macosx_10_9_x86_64.whl", "py2.py3"),
            file("cefpython3-66.1-py2.py3-none-manylinux1_x86_64.whl", "py2.py3"),
        ];
        let selected = select_release("cefpython3", "66.1", &files, &windows(), None).unwrap();
        assert_eq!(
            selected.url,
            "https://files.example/cefpython3-66.1-py2.py3-none-win_amd64.whl"
        );
    }

    #[test]
    fn any_platform_wheel_selected() {
        let files = vec![
            file("six-1.16.0-py2.py3-none-any.whl", "py2.py3"),
            file("six-1.16.0.tar.gz", "source"),
        ];
        let selected = select_release("six", "1.16.0", &files, &windows(), None).unwrap();
        assert_eq!(selected.filename, "six-1.16.0-py2.py3-none-any.whl");
    }

    #[test]
    fn ambiguous_release_lists_candidates() {
        let files = vec![
            file("pkg-1.0-cp310-cp310-win_amd64.whl", "cp310"),
            file("pkg-1.0-cp311-cp311-win_amd64.whl", "cp311"),
            file("pkg-1.0-cp311-cp311-macosx_11_0_arm64.whl", "cp311"),
        ];
        let err = select_release("pkg", "1.0", &files, &windows(), None).unwrap_err();

        let message = err.to_string();
        assert!(matches!(err, GetpackError::AmbiguousRelease { .. }));
        assert!(message.contains("pkg-1.0-cp310-cp310-win_amd64.whl (selected)"));
        assert!(message.contains("pkg-1.0-cp311-cp311-win_amd64.whl (selected)"));
        assert!(message.contains("pkg-1.0-cp311-cp311-macosx_11_0_arm64.whl"));
        assert!(!message.contains("arm64.whl (selected)"));
    }

    #[test]
    fn python_tag_narrows_candidates() {
        let files = vec![
            file("pkg-1.0-cp310-cp310-win_amd64.whl", "cp310"),
            file("pkg-1.0-cp311-cp311-win_amd64.whl", "cp311"),
        ];
        let selected = select_release("pkg", "1.0", &files, &windows(), Some("cp311")).unwrap();
        assert_eq!(selected.filename, "pkg-1.0-cp311-cp311-win_amd64.whl");
    }

    #[test]
    fn no_matching_release() {
        let files = vec![file("pkg-1.0-cp311-cp311-macosx_11_0_arm64.whl", "cp311")];
        let err = select_release("pkg", "1.0", &files, &windows(), None).unwrap_err();
        assert!(matches!(err, GetpackError::NoRelease { .. }));
    }

    #[test]
    fn missing_version_reports_known() {
        let metadata: ProjectMetadata = serde_json::from_str(
            r#"{"releases": {"0.9": [], "1.0": [{"filename": "a-1.0.tar.gz", "url": "u", "python_version": "source"}]}}"#,
        )
        .unwrap();
        let descriptor = ResourceDescriptor::builder("a", "2.0")
            .local_base("/cache")
            .build()
            .unwrap();

        let err = PypiSource::new()
            .select(&descriptor, &metadata)
            .unwrap_err();
        match err {
            GetpackError::ReleaseNotFound { known, .. } => assert_eq!(known, "0.9, 1.0"),
            other => panic!("unexpected error: {}", other),
        }
    }

    #[test]
    fn metadata_url_templated() {
        let source = PypiSource::new().with_index_url("https://mirror.example/pypi/{name}/json");
        assert_eq!(
            source.metadata_url("PySide2"),
            "https://mirror.example/pypi/PySide2/json"
        );
    }

    #[test]
    fn host_fragment_table() {
        assert_eq!(host_fragments("windows", "x86_64"), vec!["win_amd64"]);
        assert_eq!(host_fragments("linux", "x86_64"), vec!["linux", "x86_64"]);
        assert_eq!(host_fragments("macos", "aarch64"), vec!["macosx", "arm64"]);
    }

    #[test]
    fn empty_platform_matches_nothing() {
        assert!(!PlatformTag::new(Vec::<String>::new()).matches("anything.whl"));
    }
}
