//! Error types for getpack
//!
//! All modules use `GetpackResult<T>` as their return type.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for getpack operations
pub type GetpackResult<T> = Result<T, GetpackError>;

/// All errors that can occur in getpack
#[derive(Error, Debug)]
pub enum GetpackError {
    // Precondition errors
    #[error("Precondition failed: {0}")]
    Precondition(String),

    // Lock errors
    #[error("Failed to acquire lock {path}: {source}")]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // Network errors
    #[error("Request to {url} failed: {reason}")]
    Http { url: String, reason: String },

    #[error("Unexpected status {status} for {url}")]
    UnexpectedStatus { url: String, status: u16 },

    // Archive errors
    #[error("No extractor for {0}")]
    NoExtractor(String),

    #[error("Failed to read archive {archive}: {reason}")]
    Archive { archive: String, reason: String },

    #[error("Archive entry {entry} resolves outside the target directory ({destination})")]
    UnsafeEntry { entry: String, destination: String },

    // Deploy errors
    #[error("Failed to find empty temp dir (last: {last})")]
    TempDirExhausted { last: PathBuf },

    // Release resolution errors
    #[error("Version {version} of {name} not published (known: {known})")]
    ReleaseNotFound {
        name: String,
        version: String,
        known: String,
    },

    #[error("No release of {name} {version} matches this platform from {candidates}")]
    NoRelease {
        name: String,
        version: String,
        candidates: String,
    },

    #[error("No unique release of {name} {version} available from {candidates}")]
    AmbiguousRelease {
        name: String,
        version: String,
        candidates: String,
    },

    // Activation and invocation errors
    #[error("Activation of {name} failed: {reason}")]
    Activation { name: String, reason: String },

    #[error("Resource {0} does not declare an executable")]
    NotExecutable(String),

    #[error("Command failed: {command}")]
    CommandFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Command {command} returned non-zero exit status: {code}, output:\n{stderr}")]
    CommandExecution {
        command: String,
        code: i32,
        stderr: String,
    },

    #[error("{command} exited with code {code}")]
    ChildExit { command: String, code: i32 },

    // Configuration errors
    #[error("Invalid configuration at {path}: {reason}")]
    ConfigInvalid { path: PathBuf, reason: String },

    #[error("Failed to create config directory {path}: {source}")]
    ConfigDirCreate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Resource not declared: {0}")]
    ResourceNotFound(String),

    #[error("Resource declared twice: {0}")]
    DuplicateResource(String),

    #[error("Requirement cycle through {0}")]
    RequirementCycle(String),

    // IO errors
    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // Serialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    // General errors
    #[error("{0}")]
    User(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl GetpackError {
    /// Create an IO error with context
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Create a precondition error
    pub fn precondition(message: impl Into<String>) -> Self {
        Self::Precondition(message.into())
    }

    /// Create an archive error
    pub fn archive(archive: impl Into<String>, reason: impl ToString) -> Self {
        Self::Archive {
            archive: archive.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, source: std::io::Error) -> Self {
        Self::CommandFailed {
            command: command.into(),
            source,
        }
    }

    /// Process exit code to report for this error
    ///
    /// A child's own exit code is passed through when it fits.
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::ChildExit { code, .. } => u8::try_from(*code)
                .ok()
                .filter(|c| *c != 0)
                .unwrap_or(1),
            _ => 1,
        }
    }

    /// Get actionable hint for the error
    pub fn hint(&self) -> Option<&'static str> {
        match self {
            Self::ResourceNotFound(_) => Some("Declare it under [[resources]] in the config file"),
            Self::AmbiguousRelease { .. } => {
                Some("Set registry.python_tag to narrow the candidate files")
            }
            Self::NoRelease { .. } => Some("Check registry.platform matches the published files"),
            Self::TempDirExhausted { .. } => Some("Remove stale *.temp directories from the cache"),
            Self::ConfigInvalid { .. } => Some("Run 'getpack config init --force' to reset it"),
            _ => None,
        }
    }
}
