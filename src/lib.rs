//! getpack - declarative external resources
//!
//! Archives, executables and interpreter packages are fetched on first use,
//! extracted into a per-user cache and re-used afterwards. Deployment is
//! atomic and serialized per resource across threads and processes.

pub mod cache;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod error;
pub mod extract;
pub mod fetch;
pub mod resource;
pub mod ui;

pub use cache::{CacheEntry, Deployer, ResourceDescriptor};
pub use catalog::Catalog;
pub use error::{GetpackError, GetpackResult};
pub use resource::{Handle, Resource, ResourceBuilder};
