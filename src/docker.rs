//! Container runtime access. `ContainerRuntime` is the seam the core talks
//! through; `DockerRuntime` backs it with bollard.

use async_trait::async_trait;
use bollard::container::{
    Config, CreateContainerOptions, ListContainersOptions, RemoveContainerOptions,
    RenameContainerOptions, StartContainerOptions, StopContainerOptions,
};
use bollard::errors::Error as DockerError;
use bollard::image::CreateImageOptions;
use bollard::models::{
    ContainerCreateResponse, ContainerInspectResponse, ContainerSummary, CreateImageInfo,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use futures_util::Stream;
use std::pin::Pin;

const CONNECT_TIMEOUT_SECS: u64 = 120;

pub type ImageStream = Pin<Box<dyn Stream<Item = Result<CreateImageInfo, DockerError>> + Send>>;

/// Operations the watcher needs from the container runtime. Every call is
/// blocking from the caller's point of view; only stop carries a timeout.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError>;
    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError>;
    async fn create_container(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError>;
    async fn start_container(&self, id: &str) -> Result<(), DockerError>;
    async fn stop_container(&self, id: &str, grace_secs: i64) -> Result<(), DockerError>;
    async fn remove_container(&self, id: &str, force: bool) -> Result<(), DockerError>;
    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), DockerError>;
    fn pull_image(&self, repo: &str) -> ImageStream;
}

/// Connect to the Docker daemon, honoring an explicit host when given.
pub fn connect(host: Option<&str>) -> Result<Docker, DockerError> {
    match host {
        Some(host) if host.starts_with("tcp://") || host.starts_with("http://") => {
            Docker::connect_with_http(host, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        }
        Some(host) => {
            let path = host.strip_prefix("unix://").unwrap_or(host);
            Docker::connect_with_unix(path, CONNECT_TIMEOUT_SECS, API_DEFAULT_VERSION)
        }
        None => Docker::connect_with_socket_defaults(),
    }
}

/// Bollard-backed runtime.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }
}

#[async_trait]
impl ContainerRuntime for DockerRuntime {
    async fn list_containers(&self, all: bool) -> Result<Vec<ContainerSummary>, DockerError> {
        let options = ListContainersOptions::<String> {
            all,
            ..Default::default()
        };
        self.docker.list_containers(Some(options)).await
    }

    async fn inspect_container(&self, id: &str) -> Result<ContainerInspectResponse, DockerError> {
        self.docker
            .inspect_container(id, None::<bollard::query_parameters::InspectContainerOptions>)
            .await
    }

    async fn create_container(
        &self,
        name: &str,
        config: Config<String>,
    ) -> Result<ContainerCreateResponse, DockerError> {
        let options = CreateContainerOptions {
            name: name.to_string(),
            ..Default::default()
        };
        self.docker.create_container(Some(options), config).await
    }

    async fn start_container(&self, id: &str) -> Result<(), DockerError> {
        self.docker
            .start_container(id, None::<StartContainerOptions<String>>)
            .await
    }

    async fn stop_container(&self, id: &str, grace_secs: i64) -> Result<(), DockerError> {
        self.docker
            .stop_container(id, Some(StopContainerOptions { t: grace_secs }))
            .await
    }

    async fn remove_container(&self, id: &str, force: bool) -> Result<(), DockerError> {
        let options = RemoveContainerOptions {
            force,
            ..Default::default()
        };
        self.docker.remove_container(id, Some(options)).await
    }

    async fn rename_container(&self, id: &str, new_name: &str) -> Result<(), DockerError> {
        self.docker
            .rename_container(
                id,
                RenameContainerOptions {
                    name: new_name.to_string(),
                },
            )
            .await
    }

    fn pull_image(&self, repo: &str) -> ImageStream {
        let options = CreateImageOptions {
            from_image: repo.to_string(),
            ..Default::default()
        };
        Box::pin(self.docker.create_image(Some(options), None, None))
    }
}
