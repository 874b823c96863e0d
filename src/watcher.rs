//! Polling watcher that hot-reloads the configuration file.
//!
//! The watcher polls rather than relying on OS notification backends, so a
//! file that briefly disappears during an editor rename is a non-event, not
//! an error. Each detected content change triggers one reload; the reload
//! itself is an atomic snapshot swap, so requests in flight are never
//! blocked or torn. Turning `watchdog` off in the config stops the loop the
//! next time a reload completes; there is no re-enable without a restart.

use std::sync::Arc;
use std::time::Duration;

use notify::{Config as NotifyConfig, Event, EventKind, PollWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ConfigStore;

pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Start watching the store's config file in a background task.
pub fn spawn(store: Arc<ConfigStore>) -> Result<JoinHandle<()>, notify::Error> {
    spawn_with_interval(store, POLL_INTERVAL)
}

pub fn spawn_with_interval(
    store: Arc<ConfigStore>,
    interval: Duration,
) -> Result<JoinHandle<()>, notify::Error> {
    let (tx, rx) = mpsc::unbounded_channel();

    let mut watcher = PollWatcher::new(
        move |event: notify::Result<Event>| {
            let _ = tx.send(event);
        },
        NotifyConfig::default()
            .with_poll_interval(interval)
            .with_compare_contents(true),
    )?;
    watcher.watch(store.path(), RecursiveMode::NonRecursive)?;
    info!(path = %store.path().display(), "config watcher started");

    Ok(tokio::spawn(run(store, watcher, rx)))
}

async fn run(
    store: Arc<ConfigStore>,
    watcher: PollWatcher,
    mut rx: mpsc::UnboundedReceiver<notify::Result<Event>>,
) {
    // Held here so polling continues for the lifetime of the loop.
    let _watcher = watcher;

    while let Some(event) = rx.recv().await {
        match event {
            Ok(event) if matches!(event.kind, EventKind::Modify(_) | EventKind::Create(_)) => {
                info!("config file change detected, reloading");
                store.reload();
                if !store.current().watchdog() {
                    info!("watchdog disabled by configuration, stopping watcher");
                    break;
                }
            }
            // Removes and renames are transients between polls; the next
            // tick sees whatever replaced the file.
            Ok(event) => debug!(kind = ?event.kind, "ignoring watch event"),
            Err(err) => warn!(error = %err, "watch error"),
        }
    }
}
