//! Assembly of the container-creation payload.

use std::collections::HashMap;

use bollard::container::{Config, NetworkingConfig};
use bollard::models::{
    ContainerInspectResponse, HostConfig, Mount, MountTypeEnum, PortBinding, PortMap,
};

use crate::config::WatcherConfig;
use crate::errors::WatcherError;

/// TCP ports the node serves; a default layout binds each to the same
/// host port on all interfaces.
pub const NODE_PORTS: [u16; 4] = [2130, 2131, 2136, 9980];

/// Mount target base inside the container.
const CONTAINER_CONFIG_DIR: &str = "/.config/bitmark-node";

/// Host subdirectory under the base storage directory, and its bind target
/// relative to the in-container config dir.
const NODE_MOUNTS: [(&str, &str); 5] = [
    ("db", "db"),
    ("data", "bitmarkd/bitmark/data"),
    ("data-test", "bitmarkd/testing/data"),
    ("log", "bitmarkd/bitmark/log"),
    ("log-test", "bitmarkd/testing/log"),
];

/// Everything needed to instantiate the managed container: container
/// config, host config, and network endpoints. Built fresh each cycle and
/// never persisted.
#[derive(Debug, Clone)]
pub struct CreateSpec {
    pub config: Config<String>,
    pub host_config: HostConfig,
    pub networking_config: Option<NetworkingConfig<String>>,
}

impl CreateSpec {
    /// Fixed layout for a brand-new node: the node ports bound on all
    /// interfaces, the storage directories bind-mounted under the base
    /// directory, and the node environment taken from configuration.
    pub fn default_spec(config: &WatcherConfig) -> Result<CreateSpec, WatcherError> {
        let base_dir = config.require_base_dir()?;

        let mut exposed_ports: HashMap<String, HashMap<(), ()>> = HashMap::new();
        let mut port_bindings: PortMap = HashMap::new();
        for port in NODE_PORTS {
            let key = format!("{}/tcp", port);
            exposed_ports.insert(key.clone(), HashMap::new());
            port_bindings.insert(
                key,
                Some(vec![PortBinding {
                    host_ip: Some("0.0.0.0".to_string()),
                    host_port: Some(port.to_string()),
                }]),
            );
        }

        let mounts = NODE_MOUNTS
            .iter()
            .map(|(source, target)| Mount {
                typ: Some(MountTypeEnum::BIND),
                source: Some(base_dir.join(source).to_string_lossy().into_owned()),
                target: Some(format!("{}/{}", CONTAINER_CONFIG_DIR, target)),
                ..Default::default()
            })
            .collect();

        Ok(CreateSpec {
            config: Config {
                image: Some(config.image.clone()),
                env: Some(vec![
                    format!("PUBLIC_IP={}", config.public_ip),
                    format!("NETWORK={}", config.chain),
                ]),
                exposed_ports: Some(exposed_ports),
                ..Default::default()
            },
            host_config: HostConfig {
                network_mode: Some("default".to_string()),
                port_bindings: Some(port_bindings),
                mounts: Some(mounts),
                ..Default::default()
            },
            networking_config: None,
        })
    }

    /// Layout for replacing an existing container: the new image with the
    /// inspected container's environment, exposed ports, volumes, command,
    /// host config, and network endpoints carried forward unchanged.
    pub fn inherited_spec(config: &WatcherConfig, detail: &ContainerInspectResponse) -> CreateSpec {
        let inspected = detail.config.clone().unwrap_or_default();
        let networking_config = detail
            .network_settings
            .as_ref()
            .and_then(|settings| settings.networks.clone())
            .map(|endpoints| NetworkingConfig {
                endpoints_config: endpoints,
            });
        CreateSpec {
            config: Config {
                image: Some(config.image.clone()),
                exposed_ports: inspected.exposed_ports,
                env: inspected.env,
                volumes: inspected.volumes,
                cmd: inspected.cmd,
                ..Default::default()
            },
            host_config: detail.host_config.clone().unwrap_or_default(),
            networking_config,
        }
    }

    /// Fold the triple into the runtime's create payload.
    pub fn into_config(self) -> Config<String> {
        Config {
            host_config: Some(self.host_config),
            networking_config: self.networking_config,
            ..self.config
        }
    }
}
