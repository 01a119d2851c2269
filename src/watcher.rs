use std::sync::Arc;

use bollard::models::{ContainerInspectResponse, ContainerSummary, CreateImageInfo};
use futures_util::StreamExt;

use crate::config::WatcherConfig;
use crate::create_spec::CreateSpec;
use crate::docker::ContainerRuntime;
use crate::errors::{ScanError, WatcherError};

/// Text the runtime emits in its pull progress when a newer image actually
/// came down. The runtime gives no structured signal for this, so
/// detection is textual and isolated here.
pub const NEW_IMAGE_INDICATOR: &str = "Downloaded newer image";

/// Grace period handed to the runtime when stopping the managed container;
/// the runtime force-kills once it elapses.
pub const CONTAINER_STOP_WAIT_SECS: i64 = 10;

/// Handle over the container runtime plus the process configuration. Every
/// watcher operation lives here.
pub struct NodeWatcher {
    runtime: Arc<dyn ContainerRuntime>,
    config: WatcherConfig,
}

impl NodeWatcher {
    pub fn new(runtime: Arc<dyn ContainerRuntime>, config: WatcherConfig) -> Self {
        Self { runtime, config }
    }

    pub fn config(&self) -> &WatcherConfig {
        &self.config
    }

    /// Pull the configured repository and report whether a newer image was
    /// fetched.
    pub async fn pull_image(&self) -> Result<bool, WatcherError> {
        let mut stream = self.runtime.pull_image(&self.config.repo);
        let mut updated = false;
        while let Some(progress) = stream.next().await {
            let info = progress.map_err(WatcherError::ImagePull)?;
            if is_update_status(&info) {
                updated = true;
            }
        }
        Ok(updated)
    }

    /// All containers running the managed image, stopped ones included.
    /// Each listed container is re-inspected to confirm it still exists;
    /// an inspect failure aborts the scan and hands back whatever was
    /// collected so far.
    pub async fn list_managed(&self) -> Result<Vec<ContainerSummary>, ScanError> {
        let containers = self
            .runtime
            .list_containers(true)
            .await
            .map_err(|source| ScanError {
                partial: Vec::new(),
                source,
            })?;
        let mut managed = Vec::new();
        for container in containers {
            let id = container.id.as_deref().unwrap_or_default();
            if let Err(source) = self.runtime.inspect_container(id).await {
                return Err(ScanError {
                    partial: managed,
                    source,
                });
            }
            if container.image.as_deref() == Some(self.config.image.as_str()) {
                managed.push(container);
            }
        }
        Ok(managed)
    }

    /// The entry whose primary name is the managed name. Absence is a
    /// normal outcome, not an error.
    pub fn find_named<'a>(
        &self,
        containers: &'a [ContainerSummary],
    ) -> Option<&'a ContainerSummary> {
        find_by_primary_name(containers, &self.config.container_name)
    }

    /// The entry whose primary name is the managed name plus the backup
    /// suffix.
    pub fn find_backup<'a>(
        &self,
        containers: &'a [ContainerSummary],
    ) -> Option<&'a ContainerSummary> {
        find_by_primary_name(containers, &self.config.backup_name())
    }

    pub async fn inspect(&self, id: &str) -> Result<ContainerInspectResponse, WatcherError> {
        self.runtime
            .inspect_container(id)
            .await
            .map_err(|source| WatcherError::Inspect {
                id: id.to_string(),
                source,
            })
    }

    /// Stop the container when it is running; a container that is already
    /// down is left alone.
    pub async fn stop_container(&self, id: &str) -> Result<(), WatcherError> {
        let detail = self.inspect(id).await?;
        let running = detail.state.and_then(|state| state.running).unwrap_or(false);
        if !running {
            return Ok(());
        }
        self.runtime
            .stop_container(id, CONTAINER_STOP_WAIT_SECS)
            .await
            .map_err(|source| WatcherError::Stop {
                id: id.to_string(),
                source,
            })?;
        log::info!("container {} is stopped", id);
        Ok(())
    }

    pub async fn start_container(&self, id: &str) -> Result<(), WatcherError> {
        self.runtime
            .start_container(id)
            .await
            .map_err(|source| WatcherError::Start {
                id: id.to_string(),
                source,
            })
    }

    pub async fn force_remove_container(&self, id: &str) -> Result<(), WatcherError> {
        self.runtime
            .remove_container(id, true)
            .await
            .map_err(|source| WatcherError::Remove {
                id: id.to_string(),
                source,
            })
    }

    /// Rename the container to its backup form.
    pub async fn rename_to_backup(&self, id: &str) -> Result<(), WatcherError> {
        let backup_name = self.config.backup_name();
        self.runtime
            .rename_container(id, &backup_name)
            .await
            .map_err(|source| WatcherError::Rename {
                id: id.to_string(),
                source,
            })?;
        log::info!("container {} is renamed to {}", id, backup_name);
        Ok(())
    }

    /// Create the managed container from a spec and hand back its id.
    pub async fn create_container(&self, spec: CreateSpec) -> Result<String, WatcherError> {
        let created = self
            .runtime
            .create_container(&self.config.container_name, spec.into_config())
            .await
            .map_err(WatcherError::Create)?;
        Ok(created.id)
    }
}

/// Runtime-reported names carry a leading slash; the primary name is the
/// first entry.
fn find_by_primary_name<'a>(
    containers: &'a [ContainerSummary],
    name: &str,
) -> Option<&'a ContainerSummary> {
    containers.iter().find(|container| {
        container
            .names
            .as_ref()
            .and_then(|names| names.first())
            .map(|primary| primary.trim_start_matches('/') == name)
            .unwrap_or(false)
    })
}

fn is_update_status(info: &CreateImageInfo) -> bool {
    info.status
        .as_deref()
        .map(|status| status.contains(NEW_IMAGE_INDICATOR))
        .unwrap_or(false)
}
