//! Process search path and activation handles
//!
//! Providing a resource puts its install directory on a process-wide search
//! path. Commands launched through a [`Handle`] see that search path ahead of
//! the inherited `PATH`.

use super::Resource;
use crate::cache::ResourceDescriptor;
use crate::error::{GetpackError, GetpackResult};
use parking_lot::Mutex;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static SEARCH_PATH: LazyLock<Mutex<Vec<PathBuf>>> = LazyLock::new(|| Mutex::new(Vec::new()));

/// Put `path` at the front of the search path unless it is already there
///
/// Returns whether the path was inserted.
pub fn prepend(path: &Path) -> bool {
    let mut search_path = SEARCH_PATH.lock();
    if search_path.iter().any(|p| p == path) {
        return false;
    }
    search_path.insert(0, path.to_path_buf());
    true
}

pub fn contains(path: &Path) -> bool {
    SEARCH_PATH.lock().iter().any(|p| p == path)
}

/// Drop `path` from the search path, returning whether it was present
pub fn remove(path: &Path) -> bool {
    let mut search_path = SEARCH_PATH.lock();
    let before = search_path.len();
    search_path.retain(|p| p != path);
    search_path.len() != before
}

/// Snapshot of the search path, most recently provided first
pub fn entries() -> Vec<PathBuf> {
    SEARCH_PATH.lock().clone()
}

/// Search path followed by the inherited `PATH`, ready for a child's env
pub fn search_path_env() -> GetpackResult<OsString> {
    let mut paths = entries();
    if let Some(inherited) = env::var_os("PATH") {
        paths.extend(env::split_paths(&inherited));
    }
    env::join_paths(paths).map_err(|e| GetpackError::Activation {
        name: "PATH".to_string(),
        reason: e.to_string(),
    })
}

/// Runs once when a resource is first activated in this process
///
/// Requirements are already activated when the hook runs.
pub trait ActivationHook: Send + Sync {
    fn activate(&self, resource: &Resource) -> GetpackResult<()>;
}

impl<F> ActivationHook for F
where
    F: Fn(&Resource) -> GetpackResult<()> + Send + Sync,
{
    fn activate(&self, resource: &Resource) -> GetpackResult<()> {
        self(resource)
    }
}

/// An activated resource
#[derive(Debug, Clone, Copy)]
pub struct Handle<'a> {
    resource: &'a Resource,
}

impl<'a> Handle<'a> {
    pub(super) fn new(resource: &'a Resource) -> Self {
        Self { resource }
    }

    pub fn resource(&self) -> &'a Resource {
        self.resource
    }

    pub fn descriptor(&self) -> &'a ResourceDescriptor {
        self.resource.descriptor()
    }

    pub fn name(&self) -> &'a str {
        self.resource.name()
    }

    pub fn version(&self) -> &'a str {
        self.resource.version()
    }

    /// Install directory
    pub fn path(&self) -> &'a Path {
        self.resource.path()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn prepend_is_idempotent() {
        let path = Path::new("/getpack-test/prepend/1.0");
        remove(path);

        assert!(prepend(path));
        assert!(!prepend(path));
        assert_eq!(entries().iter().filter(|p| p.as_path() == path).count(), 1);

        assert!(remove(path));
        assert!(!contains(path));
    }

    #[test]
    #[serial]
    fn latest_first() {
        let first = Path::new("/getpack-test/order/a");
        let second = Path::new("/getpack-test/order/b");
        prepend(first);
        prepend(second);

        let entries = entries();
        let a = entries.iter().position(|p| p == first).unwrap();
        let b = entries.iter().position(|p| p == second).unwrap();
        assert!(b < a);

        remove(first);
        remove(second);
    }

    #[test]
    #[serial]
    fn env_starts_with_search_path() {
        let path = Path::new("/getpack-test/env/1.0");
        prepend(path);

        let joined = search_path_env().unwrap();
        let first = env::split_paths(&joined).next().unwrap();
        assert_eq!(first, path);

        remove(path);
    }
}
