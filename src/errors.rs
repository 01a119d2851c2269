use bollard::errors::Error as DockerError;
use bollard::models::ContainerSummary;
use std::path::PathBuf;

/// Failures surfaced by the watcher. One variant per cycle step, so a log
/// line identifies where a cycle died.
#[derive(Debug, thiserror::Error)]
pub enum WatcherError {
    #[error("image pull failed")]
    ImagePull(#[source] DockerError),
    #[error("container list failed")]
    List(#[source] DockerError),
    #[error("container inspect failed for {id}")]
    Inspect {
        id: String,
        #[source]
        source: DockerError,
    },
    #[error("container stop failed for {id}")]
    Stop {
        id: String,
        #[source]
        source: DockerError,
    },
    #[error("container remove failed for {id}")]
    Remove {
        id: String,
        #[source]
        source: DockerError,
    },
    #[error("container rename failed for {id}")]
    Rename {
        id: String,
        #[source]
        source: DockerError,
    },
    #[error("container create failed")]
    Create(#[source] DockerError),
    #[error("container start failed for {id}")]
    Start {
        id: String,
        #[source]
        source: DockerError,
    },
    #[error("database rename failed for {}", .path.display())]
    DatabaseRename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("node base directory is not configured")]
    BaseDirNotConfigured,
    #[error("cannot derive a data directory from image name {0:?}")]
    UnexpectedImageName(String),
    #[error(transparent)]
    Scan(#[from] ScanError),
}

/// A managed-container scan that died on an inspect call. The entries
/// gathered before the failure ride along; they are not a complete
/// inventory.
#[derive(Debug, thiserror::Error)]
#[error("container scan aborted: {source}")]
pub struct ScanError {
    pub partial: Vec<ContainerSummary>,
    #[source]
    pub source: DockerError,
}
