//! Local resource cache
//!
//! Every resource owns one directory, its identity path:
//! `<local_base>/<local_prefix>/<name>/<version>`.
//!
//! # Entry States
//!
//! | State | On disk | Description |
//! |-------|---------|-------------|
//! | Absent | nothing at the identity path | Never deployed or cleaned up |
//! | Staging | `<parent>/<20 hex>.temp` | Deploy in progress or crashed |
//! | Present | identity path directory | Fully extracted, published by rename |
//!
//! Mutations (deploy, cleanup) run under a [`lock::PathLock`] keyed by the
//! identity path, which excludes other threads and other processes.

pub mod descriptor;
pub mod entry;
pub mod lock;

pub use descriptor::{DescriptorBuilder, ResourceDescriptor};
pub use entry::{CacheEntry, Deployer, TEMP_SUFFIX};
pub use lock::{PathLock, PathLockGuard};
