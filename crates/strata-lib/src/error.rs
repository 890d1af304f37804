use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// One failed transfer inside a batched network job.
#[derive(Debug, Clone)]
pub struct TransferFailure {
    /// Human-readable name of the file that failed (storage path or object name).
    pub name: String,
    /// Why the last attempt failed.
    pub reason: String,
}

impl std::fmt::Display for TransferFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.name, self.reason)
    }
}

/// Failure taxonomy of the update subsystem.
///
/// `Structural` and `ResourceMissing` are always fatal to the current pipeline
/// run. `Network` is produced once per batched job and names every failed
/// file. `Parse` is raised after the evict-and-refetch retry has also failed.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Structural(String),

    #[error("{what}:\n{}", .files.join("\n"))]
    ResourceMissing { what: String, files: Vec<String> },

    #[error("failed to download the following files for {job}:\n{}", .failures.iter().map(|f| f.to_string()).collect::<Vec<_>>().join("\n"))]
    Network {
        job: String,
        failures: Vec<TransferFailure>,
    },

    #[error("unable to parse {file}: {reason}")]
    Parse { file: String, reason: String },

    #[error("failed copying {what} {file}: {reason}")]
    Copy {
        what: &'static str,
        file: String,
        reason: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

impl Error {
    pub fn structural(message: impl Into<String>) -> Self {
        Error::Structural(message.into())
    }
}
