use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use node_watcher::config::{DEFAULT_CONTAINER_NAME, DEFAULT_IMAGE};
use node_watcher::docker::{self, DockerRuntime};
use node_watcher::{monitor, NodeWatcher, WatcherConfig};

#[derive(Parser)]
#[command(
    name = "node-watcher",
    version,
    about = "Automatically update the running node container"
)]
struct Cli {
    /// Daemon socket to connect to
    #[arg(short = 'H', long, env = "DOCKER_HOST")]
    host: Option<String>,

    /// Image name to pull
    #[arg(short, long, env = "NODE_IMAGE", default_value = DEFAULT_IMAGE)]
    image: String,

    /// Container name to create
    #[arg(short, long, env = "NODE_NAME", default_value = DEFAULT_CONTAINER_NAME)]
    name: String,

    /// Node data directory; derived from the image name when omitted
    #[arg(long, env = "USER_NODE_BASE_DIR")]
    data_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let docker = docker::connect(cli.host.as_deref())?;
    log::info!("connected to the container runtime");

    let config = WatcherConfig::resolve(cli.image, cli.name, cli.data_dir);
    log::info!(
        "watching image {} as container {}",
        config.image,
        config.container_name
    );

    let watcher = Arc::new(NodeWatcher::new(Arc::new(DockerRuntime::new(docker)), config));
    monitor::start_monitor(watcher).await;
    Ok(())
}
