//! Background polling.
//!
//! Each tracked collection (tasks, calendar) gets its own tokio task that
//! runs fetch → compare → notify, then sleeps for a fixed delay measured
//! from the *end* of the cycle.  A slow store therefore stretches the period
//! instead of stacking up overlapping fetches.  The two collections never
//! coordinate; each owns its accepted snapshot.
//!
//! Accepted snapshots are sent over an unbounded [`mpsc`] channel.  Dropping
//! the receiver stops the poller.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{StoreError, StoreResult};
use crate::fetch::Collection;
use crate::item::Item;
use crate::snapshot::{ChangePolicy, Snapshot};
use crate::store::StoreContext;

/// Default delay between the end of one cycle and the start of the next.
pub const DEFAULT_INTERVAL: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy)]
pub struct PollSettings {
    pub interval: Duration,
    pub policy: ChangePolicy,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_INTERVAL,
            policy: ChangePolicy::default(),
        }
    }
}

/// Decide what a finished fetch means for the accepted snapshot.
///
/// Returns the snapshot to accept and announce, or `None` to keep the
/// current one.  A failed fetch always keeps the current one.
pub fn reconcile<T: Item>(
    name: &str,
    accepted: &Snapshot<T>,
    fetched: StoreResult<Snapshot<T>>,
    policy: ChangePolicy,
) -> Option<Snapshot<T>> {
    match fetched {
        Ok(snapshot) if policy.detects(accepted, &snapshot) => {
            info!(collection = name, items = snapshot.len(), "snapshot changed");
            Some(snapshot)
        }
        Ok(snapshot) => {
            debug!(collection = name, items = snapshot.len(), "no change");
            None
        }
        Err(e) => {
            warn!(collection = name, error = %e, "fetch failed, keeping previous snapshot");
            None
        }
    }
}

/// Start polling `collection` on the current tokio runtime.
///
/// The first cycle starts immediately.
pub fn spawn<C: Collection>(
    collection: C,
    ctx: Arc<StoreContext>,
    settings: PollSettings,
) -> (mpsc::UnboundedReceiver<Snapshot<C::Item>>, JoinHandle<()>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let task = tokio::spawn(run(Arc::new(collection), ctx, settings, tx));
    (rx, task)
}

async fn run<C: Collection>(
    collection: Arc<C>,
    ctx: Arc<StoreContext>,
    settings: PollSettings,
    tx: mpsc::UnboundedSender<Snapshot<C::Item>>,
) {
    let name = collection.name();
    let mut accepted = Snapshot::<C::Item>::empty();

    loop {
        let fetched = {
            let collection = Arc::clone(&collection);
            let ctx = Arc::clone(&ctx);
            tokio::task::spawn_blocking(move || collection.fetch(&ctx))
                .await
                .unwrap_or_else(|e| {
                    error!(collection = name, error = %e, "fetch task panicked");
                    Err(StoreError::QueryFailed(e.to_string()))
                })
        };

        if let Some(snapshot) = reconcile(name, &accepted, fetched, settings.policy) {
            accepted = snapshot.clone();
            if tx.send(snapshot).is_err() {
                break;
            }
        }

        tokio::select! {
            _ = tokio::time::sleep(settings.interval) => {}
            _ = tx.closed() => break,
        }
    }

    debug!(collection = name, "poller stopped");
}
