//! The supervisor loop and the per-cycle upgrade pass.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::sleep;

use crate::create_spec::CreateSpec;
use crate::errors::WatcherError;
use crate::migration::MigrationGuard;
use crate::poller;
use crate::watcher::NodeWatcher;

/// Cool-down between a crashed monitor loop and its relaunch.
const RESTART_COOLDOWN: Duration = Duration::from_secs(10);

/// Run the monitor forever. The loop body executes in its own task; a
/// fault anywhere inside a cycle is caught here, logged, and after the
/// cool-down the loop is relaunched as a new task. This never returns and
/// never gives up.
pub async fn start_monitor(watcher: Arc<NodeWatcher>) {
    loop {
        let loop_task = tokio::spawn(monitor_loop(watcher.clone()));
        if let Err(err) = loop_task.await {
            log::error!("monitor loop died: {}", err);
        }
        log::info!("relaunching monitor loop");
        sleep(RESTART_COOLDOWN).await;
    }
}

/// One poll wait followed by one upgrade pass, forever. Each iteration
/// spawns a fresh poller and blocks on its one-shot notification; that
/// wait is the only synchronization between the poller and the
/// orchestrator.
async fn monitor_loop(watcher: Arc<NodeWatcher>) {
    loop {
        let (notify, updated) = oneshot::channel();
        tokio::spawn(poller::image_update_task(watcher.clone(), notify));
        match updated.await {
            Ok(true) => {
                if let Err(err) = run_cycle(&watcher).await {
                    log::error!("update cycle failed: {}", err);
                }
            }
            // No update means no runtime mutation this cycle.
            Ok(false) => {}
            Err(_) => {
                log::error!("image update task ended without a notification");
            }
        }
    }
}

/// One orchestrator pass. Exactly one of three paths runs: create a fresh
/// container, replace the existing named one, or leave the runtime
/// untouched.
pub async fn run_cycle(watcher: &NodeWatcher) -> Result<(), WatcherError> {
    let containers = watcher.list_managed().await?;

    if containers.is_empty() {
        log::info!("creating a brand new container");
        let spec = CreateSpec::default_spec(watcher.config())?;
        let id = watcher.create_container(spec).await?;
        watcher.start_container(&id).await?;
        log::info!("container {} started", id);
        return Ok(());
    }

    let Some(named) = watcher.find_named(&containers) else {
        // The image is present but nothing carries the managed name.
        // Leave the runtime untouched; the next poll retries.
        log::info!(
            "no container named {}, skipping cycle",
            watcher.config().container_name
        );
        return Ok(());
    };
    let named_id = named.id.clone().unwrap_or_default();

    let detail = watcher.inspect(&named_id).await?;
    let spec = CreateSpec::inherited_spec(watcher.config(), &detail);
    let guard = MigrationGuard::for_config(watcher.config())?;

    watcher.stop_container(&named_id).await?;

    // The backup slot holds at most one container; clear it before the
    // rename below claims it.
    if let Some(backup) = watcher.find_backup(&containers) {
        let backup_id = backup.id.clone().unwrap_or_default();
        watcher.force_remove_container(&backup_id).await?;
    }

    watcher.rename_to_backup(&named_id).await?;

    // Data moves aside before the new container exists; a failure from
    // here on must put it back.
    if let Err(err) = guard.migrate().await {
        log::error!("database migration failed, restoring: {}", err);
        roll_back_data(&guard).await;
        return Err(err);
    }

    let created = match watcher.create_container(spec).await {
        Ok(id) => id,
        Err(err) => {
            log::error!("container create failed, restoring databases: {}", err);
            roll_back_data(&guard).await;
            return Err(err);
        }
    };
    if let Err(err) = watcher.start_container(&created).await {
        log::error!("container start failed, restoring databases: {}", err);
        roll_back_data(&guard).await;
        return Err(err);
    }

    log::info!("container {} started", created);
    Ok(())
}

/// Best-effort data rollback after a failed replacement. The renamed
/// backup container stays on the runtime for manual recovery; only the
/// database renames are reversed.
async fn roll_back_data(guard: &MigrationGuard) {
    if let Err(err) = guard.restore().await {
        log::error!("database restore incomplete: {}", err);
    }
}
