//! Reentrant locks that hold across threads and processes
//!
//! A [`PathLock`] pairs an in-process reentrant mutex with an OS-level
//! exclusive lock on `<identity_path>.lock`. Only the outermost acquisition
//! on a thread touches the lock file; nested acquisitions bump a counter.
//! When the counter drops back to zero the lock file is removed and the OS
//! lock released.

use crate::error::{GetpackError, GetpackResult};
use fs4::fs_std::FileExt;
use parking_lot::{Mutex, ReentrantMutex, ReentrantMutexGuard};
use std::cell::RefCell;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use tracing::{debug, trace};

/// One lock instance per key for the whole process
static REGISTRY: LazyLock<Mutex<HashMap<PathBuf, Arc<PathLock>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

/// Get the lock guarding `identity`
///
/// Repeated calls with the same path return the same instance.
pub fn for_path(identity: &Path) -> Arc<PathLock> {
    let mut registry = REGISTRY.lock();
    let lock = registry
        .entry(identity.to_path_buf())
        .or_insert_with(|| Arc::new(PathLock::new(lock_file_path(identity))));
    Arc::clone(lock)
}

/// `<identity>.lock`, a sibling of the identity directory
pub fn lock_file_path(identity: &Path) -> PathBuf {
    let mut name = OsString::from(identity.as_os_str());
    name.push(".lock");
    PathBuf::from(name)
}

#[derive(Debug, Default)]
struct Holder {
    depth: usize,
    file: Option<File>,
}

/// Reentrant, process-safe lock backed by a lock file
#[derive(Debug)]
pub struct PathLock {
    path: PathBuf,
    inner: ReentrantMutex<RefCell<Holder>>,
}

impl PathLock {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            inner: ReentrantMutex::new(RefCell::new(Holder::default())),
        }
    }

    /// Path of the backing lock file
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Block until this thread holds the lock
    ///
    /// The lock is released when the returned guard (and every nested guard
    /// taken by the same thread) is dropped.
    pub fn acquire(&self) -> GetpackResult<PathLockGuard<'_>> {
        let guard = self.inner.lock();
        {
            let mut holder = guard.borrow_mut();
            if holder.depth == 0 {
                holder.file = Some(self.lock_file()?);
                trace!(path = %self.path.display(), "Acquired lock");
            }
            holder.depth += 1;
        }
        Ok(PathLockGuard { lock: self, guard })
    }

    fn lock_file(&self) -> GetpackResult<File> {
        lock_with(&self.path, || try_lock_file(&self.path))
    }

    fn release_file(&self, file: File) {
        // Unlink while still holding the lock so waiters on the old inode retry
        if let Err(e) = fs::remove_file(&self.path) {
            debug!(path = %self.path.display(), error = %e, "Lock file not removed");
        }
        if let Err(e) = FileExt::unlock(&file) {
            debug!(path = %self.path.display(), error = %e, "Unlock failed");
        }
        trace!(path = %self.path.display(), "Released lock");
    }
}

/// Take the OS lock on `path` through `try_lock`, retrying once on failure
///
/// A holder unlinks the file before releasing it, so a waiter may wake up
/// owning an inode that is no longer linked; it then locks the new file.
fn lock_with<F>(path: &Path, mut try_lock: F) -> GetpackResult<File>
where
    F: FnMut() -> std::io::Result<File>,
{
    loop {
        let file = match try_lock() {
            Ok(file) => file,
            Err(e) => {
                // Windows reports a spurious permission error under heavy contention
                debug!(path = %path.display(), error = %e, "Lock attempt failed, retrying");
                try_lock().map_err(|source| GetpackError::Lock {
                    path: path.to_path_buf(),
                    source,
                })?
            }
        };

        if is_current(&file, path) {
            return Ok(file);
        }
        trace!(path = %path.display(), "Lock file replaced while waiting");
    }
}

fn try_lock_file(path: &Path) -> std::io::Result<File> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;
    FileExt::lock_exclusive(&file)?;
    Ok(file)
}

/// Scoped ownership of a [`PathLock`]
pub struct PathLockGuard<'a> {
    lock: &'a PathLock,
    guard: ReentrantMutexGuard<'a, RefCell<Holder>>,
}

impl PathLockGuard<'_> {
    /// Nesting depth of the current thread's ownership
    pub fn depth(&self) -> usize {
        self.guard.borrow().depth
    }
}

impl Drop for PathLockGuard<'_> {
    fn drop(&mut self) {
        let mut holder = self.guard.borrow_mut();
        holder.depth -= 1;
        if holder.depth == 0 {
            if let Some(file) = holder.file.take() {
                self.lock.release_file(file);
            }
        }
    }
}

/// Whether `file` is still the one linked at `path`
#[cfg(unix)]
fn is_current(file: &File, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (file.metadata(), fs::metadata(path)) {
        (Ok(held), Ok(linked)) => held.dev() == linked.dev() && held.ino() == linked.ino(),
        _ => false,
    }
}

// Open files cannot be unlinked on Windows, so the held handle is always current
#[cfg(not(unix))]
fn is_current(_file: &File, _path: &Path) -> bool {
    true
}
