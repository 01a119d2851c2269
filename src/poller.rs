//! Periodic image pulls feeding the single-use update notification.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time;

use crate::watcher::NodeWatcher;

/// Interval between pull attempts. The first pull happens immediately to
/// catch an update published while the watcher was down.
pub const PULL_IMAGE_INTERVAL: Duration = Duration::from_secs(20);

/// Pull the repository once immediately, then on a fixed interval, until a
/// newer image comes down; the notification is sent once and the task
/// ends. Pull failures are logged and the next tick retries. The send
/// fails when the supervisor was relaunched and dropped the receiver; an
/// orphaned task just ends.
pub async fn image_update_task(watcher: Arc<NodeWatcher>, notify: oneshot::Sender<bool>) {
    let mut ticker = time::interval(PULL_IMAGE_INTERVAL);
    loop {
        ticker.tick().await;
        match watcher.pull_image().await {
            Ok(true) => {
                log::info!("new image for {}", watcher.config().repo);
                let _ = notify.send(true);
                return;
            }
            Ok(false) => log::info!("no new image found"),
            Err(err) => log::warn!("{}", err),
        }
    }
}
