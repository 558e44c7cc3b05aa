use kube::Client;
use tokio::task::JoinHandle;

use crate::{config::ControllerConfig, controller::run_controller};

/// Spawn the Kubernetes controller loop.
pub fn spawn_controller(
    client: Client,
    cfg: ControllerConfig,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move { run_controller(client, cfg).await })
}

/// Run the controller until it stops (SIGINT/SIGTERM drain in-flight work).
pub async fn run_all(client: Client, cfg: ControllerConfig) -> anyhow::Result<()> {
    spawn_controller(client, cfg).await?
}
