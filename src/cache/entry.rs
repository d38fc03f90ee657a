//! Cache entry state machine: presence check, atomic deploy, cleanup

use super::descriptor::ResourceDescriptor;
use super::lock;
use crate::error::{GetpackError, GetpackResult};
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::cell::Cell;
use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, LazyLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Suffix reserved for staging directories
pub const TEMP_SUFFIX: &str = ".temp";

/// Attempts at finding an unused staging directory name
const TEMP_ATTEMPTS: usize = 100;

/// Produces the contents of a resource inside a directory
///
/// The directory is a fresh staging directory; it becomes the identity path
/// only after this returns `Ok`.
pub trait Deployer: Send + Sync {
    fn deploy_to(&self, descriptor: &ResourceDescriptor, target: &Path) -> GetpackResult<()>;
}

impl<F> Deployer for F
where
    F: Fn(&ResourceDescriptor, &Path) -> GetpackResult<()> + Send + Sync,
{
    fn deploy_to(&self, descriptor: &ResourceDescriptor, target: &Path) -> GetpackResult<()> {
        self(descriptor, target)
    }
}

/// Process-local knowledge about one identity path
///
/// Only a fast path: the filesystem stays the source of truth.
#[derive(Debug, Default)]
struct EntryFlags {
    available: AtomicBool,
    activated: AtomicBool,
    /// Set while this thread runs the activation steps
    activation: ReentrantMutex<Cell<bool>>,
}

static FLAGS: LazyLock<Mutex<HashMap<PathBuf, Arc<EntryFlags>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

fn flags_for(identity: &Path) -> Arc<EntryFlags> {
    let mut flags = FLAGS.lock();
    Arc::clone(flags.entry(identity.to_path_buf()).or_default())
}

/// The cache directory of one resource version
#[derive(Debug, Clone)]
pub struct CacheEntry {
    descriptor: ResourceDescriptor,
    path: PathBuf,
    flags: Arc<EntryFlags>,
}

impl CacheEntry {
    pub fn new(descriptor: ResourceDescriptor) -> Self {
        let path = descriptor.identity_path();
        let flags = flags_for(&path);
        Self {
            descriptor,
            path,
            flags,
        }
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.descriptor
    }

    /// The identity path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this process already made the entry available
    pub fn is_available(&self) -> bool {
        self.flags.available.load(Ordering::Acquire)
    }

    /// Whether this process already activated the entry
    pub fn is_activated(&self) -> bool {
        self.flags.activated.load(Ordering::Acquire)
    }

    /// Serialize activation of this entry within the process
    ///
    /// Reentrant, so an activation hook may use its own resource. The cell
    /// marks an activation in progress on the owning thread.
    pub(crate) fn activation_guard(&self) -> ReentrantMutexGuard<'_, Cell<bool>> {
        self.flags.activation.lock()
    }

    pub(crate) fn mark_activated(&self) {
        self.flags.activated.store(true, Ordering::Release);
    }

    fn invalidate(&self) {
        self.flags.available.store(false, Ordering::Release);
        self.flags.activated.store(false, Ordering::Release);
    }

    /// Versions present next to this entry
    ///
    /// Lists directories under `<local_base>/<local_prefix>/<name>`, skipping
    /// staging directories. Not locked: a concurrent deploy may or may not be
    /// visible yet.
    pub fn available_versions(&self) -> GetpackResult<Vec<String>> {
        let Some(parent) = self.path.parent() else {
            return Ok(Vec::new());
        };

        let entries = match fs::read_dir(parent) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(GetpackError::io(
                    format!("listing versions in {}", parent.display()),
                    e,
                ))
            }
        };

        let mut versions = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| {
                GetpackError::io(format!("listing versions in {}", parent.display()), e)
            })?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(TEMP_SUFFIX) || !entry.path().is_dir() {
                continue;
            }
            versions.push(name);
        }
        versions.sort();
        Ok(versions)
    }

    /// Make sure the entry is present, deploying it if needed
    ///
    /// Racing callers serialize on the identity lock; the loser observes the
    /// winner's result and returns without deploying again.
    pub fn provide(&self, deployer: &dyn Deployer) -> GetpackResult<()> {
        if self.is_available() {
            return Ok(());
        }
        self.descriptor.validate()?;

        let lock = lock::for_path(&self.path);
        let _guard = lock.acquire()?;

        let present = self
            .available_versions()?
            .iter()
            .any(|v| v == self.descriptor.version());
        if present {
            debug!("{} already deployed at {}", self.descriptor, self.path.display());
        } else {
            self.deploy(deployer)?;
        }

        self.flags.available.store(true, Ordering::Release);
        Ok(())
    }

    /// Deploy from scratch, replacing whatever is at the identity path
    ///
    /// Contents are produced in a staging directory and published with a
    /// single rename, so the identity path never holds a partial result.
    pub fn deploy(&self, deployer: &dyn Deployer) -> GetpackResult<()> {
        let lock = lock::for_path(&self.path);
        let _guard = lock.acquire()?;

        self.cleanup()?;

        let parent = self.parent()?;
        let staging = create_staging_dir(parent)?;
        debug!("Staging {} in {}", self.descriptor, staging.display());

        let published = deployer
            .deploy_to(&self.descriptor, &staging)
            .and_then(|()| self.publish(parent, &staging));

        if let Err(e) = published {
            if let Err(cleanup_err) = fs::remove_dir_all(&staging) {
                if cleanup_err.kind() != ErrorKind::NotFound {
                    warn!(
                        "Failed to remove staging directory {}: {}",
                        staging.display(),
                        cleanup_err
                    );
                }
            }
            return Err(e);
        }

        info!("Deployed {} to {}", self.descriptor, self.path.display());
        Ok(())
    }

    fn publish(&self, parent: &Path, staging: &Path) -> GetpackResult<()> {
        fs::create_dir_all(parent)
            .map_err(|e| GetpackError::io(format!("creating {}", parent.display()), e))?;
        fs::rename(staging, &self.path).map_err(|e| {
            GetpackError::io(
                format!("renaming {} to {}", staging.display(), self.path.display()),
                e,
            )
        })
    }

    /// Remove the entry from disk and forget it was available
    pub fn cleanup(&self) -> GetpackResult<()> {
        let lock = lock::for_path(&self.path);
        let _guard = lock.acquire()?;

        if self.path.is_dir() {
            info!("Cleanup {}", self.path.display());
            fs::remove_dir_all(&self.path)
                .map_err(|e| GetpackError::io(format!("removing {}", self.path.display()), e))?;
        }
        self.invalidate();
        Ok(())
    }

    fn parent(&self) -> GetpackResult<&Path> {
        self.path.parent().ok_or_else(|| {
            GetpackError::Internal(format!("{} has no parent", self.path.display()))
        })
    }
}

/// Create a uniquely named `<20 hex digits>.temp` directory under `parent`
fn create_staging_dir(parent: &Path) -> GetpackResult<PathBuf> {
    fs::create_dir_all(parent)
        .map_err(|e| GetpackError::io(format!("creating {}", parent.display()), e))?;

    let mut last = parent.to_path_buf();
    for _ in 0..TEMP_ATTEMPTS {
        last = parent.join(staging_name());
        match fs::create_dir(&last) {
            Ok(()) => return Ok(last),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(GetpackError::io(format!("creating {}", last.display()), e));
            }
        }
    }

    Err(GetpackError::TempDirExhausted { last })
}

fn staging_name() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}{}", &random[..20], TEMP_SUFFIX)
}
