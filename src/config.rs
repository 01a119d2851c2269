use std::env;
use std::path::{Path, PathBuf};

use crate::errors::WatcherError;

pub const DEFAULT_IMAGE: &str = "bitmark/bitmark-node";
pub const DEFAULT_CONTAINER_NAME: &str = "bitmarkNode";

/// Suffix applied to the replaced container's name and to the databases
/// moved aside during an upgrade. Single source of truth for both.
pub const BACKUP_SUFFIX: &str = "_old";

const DEFAULT_PUBLIC_IP: &str = "127.0.0.1";
const DEFAULT_CHAIN: &str = "BITMARK";

/// Process-wide watcher configuration. Built once at startup and shared
/// read-only between the poller and the orchestrator.
#[derive(Debug, Clone)]
pub struct WatcherConfig {
    /// Fully qualified repository passed to image pulls.
    pub repo: String,
    /// Image reference the managed container runs.
    pub image: String,
    /// Name of the managed container.
    pub container_name: String,
    /// Suffix for backup containers and backed-up databases.
    pub backup_suffix: String,
    /// Base storage directory mounted into the container. `None` when it
    /// could not be resolved at startup.
    pub base_dir: Option<PathBuf>,
    /// Public address advertised by a freshly created node.
    pub public_ip: String,
    /// Chain the node joins.
    pub chain: String,
}

impl WatcherConfig {
    pub fn new(image: &str, container_name: &str) -> Self {
        WatcherConfig {
            repo: format!("docker.io/{}", image),
            image: image.to_string(),
            container_name: container_name.to_string(),
            backup_suffix: BACKUP_SUFFIX.to_string(),
            base_dir: None,
            public_ip: DEFAULT_PUBLIC_IP.to_string(),
            chain: DEFAULT_CHAIN.to_string(),
        }
    }

    /// Assemble the configuration from parsed options plus the process
    /// environment. A data directory that cannot be resolved is left unset
    /// rather than failing startup; cycles that need it report a
    /// configuration error instead.
    pub fn resolve(image: String, container_name: String, data_dir: Option<PathBuf>) -> Self {
        let mut config = WatcherConfig::new(&image, &container_name);
        config.base_dir = match data_dir {
            Some(dir) => Some(dir),
            None => match env::var_os("HOME") {
                Some(home) => match derive_base_dir(&image, Path::new(&home)) {
                    Ok(dir) => Some(dir),
                    Err(err) => {
                        log::warn!("node data directory left unset: {}", err);
                        None
                    }
                },
                None => {
                    log::warn!("node data directory left unset: no home directory");
                    None
                }
            },
        };
        if let Ok(public_ip) = env::var("PUBLIC_IP") {
            config.public_ip = public_ip;
        }
        if let Ok(chain) = env::var("NETWORK") {
            config.chain = chain;
        }
        config
    }

    /// Base storage directory, or the configuration error that fails the
    /// current cycle only.
    pub fn require_base_dir(&self) -> Result<&Path, WatcherError> {
        self.base_dir
            .as_deref()
            .ok_or(WatcherError::BaseDirNotConfigured)
    }

    /// Managed name with the backup suffix applied.
    pub fn backup_name(&self) -> String {
        format!("{}{}", self.container_name, self.backup_suffix)
    }
}

/// Derive the host storage directory from the image name: the image
/// basename with a `data` segment inserted after the `node` component,
/// rooted in the home directory (`bitmark/bitmark-node` becomes
/// `<home>/bitmark-node-data`).
pub fn derive_base_dir(image: &str, home: &Path) -> Result<PathBuf, WatcherError> {
    let basename = match image.split('/').nth(1) {
        Some(name) if !name.is_empty() => name,
        _ => return Err(WatcherError::UnexpectedImageName(image.to_string())),
    };
    let mut segments: Vec<&str> = basename.split('-').collect();
    match segments.iter().position(|s| *s == "node") {
        Some(idx) => segments.insert(idx + 1, "data"),
        None => segments.push("data"),
    }
    Ok(home.join(segments.join("-")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_data_dir_from_image_basename() {
        let dir = derive_base_dir("bitmark/bitmark-node", Path::new("/home/node")).unwrap();
        assert_eq!(dir, PathBuf::from("/home/node/bitmark-node-data"));
    }

    #[test]
    fn derives_staged_data_dir() {
        let dir = derive_base_dir("bitmark/bitmark-node-stage", Path::new("/home/node")).unwrap();
        assert_eq!(dir, PathBuf::from("/home/node/bitmark-node-data-stage"));
    }

    #[test]
    fn appends_data_segment_without_node_component() {
        let dir = derive_base_dir("acme/service", Path::new("/home/node")).unwrap();
        assert_eq!(dir, PathBuf::from("/home/node/service-data"));
    }

    #[test]
    fn rejects_image_without_namespace() {
        let err = derive_base_dir("bitmark-node", Path::new("/home/node")).unwrap_err();
        assert!(matches!(err, WatcherError::UnexpectedImageName(_)));
    }

    #[test]
    fn backup_name_appends_suffix() {
        let config = WatcherConfig::new(DEFAULT_IMAGE, DEFAULT_CONTAINER_NAME);
        assert_eq!(config.backup_name(), "bitmarkNode_old");
    }

    #[test]
    fn repo_is_prefixed_with_registry() {
        let config = WatcherConfig::new(DEFAULT_IMAGE, DEFAULT_CONTAINER_NAME);
        assert_eq!(config.repo, "docker.io/bitmark/bitmark-node");
    }

    #[test]
    fn missing_base_dir_is_a_configuration_error() {
        let config = WatcherConfig::new(DEFAULT_IMAGE, DEFAULT_CONTAINER_NAME);
        assert!(matches!(
            config.require_base_dir(),
            Err(WatcherError::BaseDirNotConfigured)
        ));
    }
}
