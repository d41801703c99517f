//! Live queries
//!
//! A [`LiveQuery`] delivers the full matching result set: once
//! immediately, then again after every committed write to the
//! collection. Consumers replace their state wholesale instead of
//! patching it, so a missed delivery is self-healing.

use serde::de::DeserializeOwned;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

use super::{DataStore, StoreResult};

const SNAPSHOT_BUFFER: usize = 16;

/// Handle to a running live query. Dropping it, or calling
/// [`unsubscribe`](LiveQuery::unsubscribe), stops delivery.
pub struct LiveQuery<T> {
    rx: mpsc::Receiver<Vec<T>>,
    cancel: CancellationToken,
}

impl<T> LiveQuery<T> {
    /// Next full result-set snapshot, or `None` once the query has
    /// been cancelled or the store dropped.
    pub async fn recv(&mut self) -> Option<Vec<T>> {
        if self.cancel.is_cancelled() {
            return None;
        }
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            snapshot = self.rx.recv() => snapshot,
        }
    }

    pub fn unsubscribe(&self) {
        self.cancel.cancel();
    }
}

impl<T> Drop for LiveQuery<T> {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

impl DataStore {
    /// Start a live query over one collection. Requires a tokio
    /// runtime; queries run on a background task.
    pub fn live_query<T, F>(&self, collection: &'static str, filter: F) -> LiveQuery<T>
    where
        T: DeserializeOwned + Send + 'static,
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let (tx, rx) = mpsc::channel(SNAPSHOT_BUFFER);
        let cancel = CancellationToken::new();
        let token = cancel.clone();
        let store = self.clone();
        let mut changes = self.subscribe();

        tokio::spawn(async move {
            match run_query(&store, collection, &filter) {
                Ok(snapshot) => {
                    if tx.send(snapshot).await.is_err() {
                        return;
                    }
                }
                Err(error) => {
                    tracing::error!(collection, %error, "Live query initial snapshot failed");
                    return;
                }
            }

            loop {
                tokio::select! {
                    _ = token.cancelled() => return,
                    change = changes.recv() => {
                        match change {
                            Ok(event) if event.collection != collection => continue,
                            Ok(_) => {}
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                // Fell behind the feed; the snapshot we
                                // are about to send covers the gap.
                                tracing::warn!(collection, skipped, "Live query lagged behind change feed");
                            }
                            Err(broadcast::error::RecvError::Closed) => return,
                        }
                        match run_query(&store, collection, &filter) {
                            Ok(snapshot) => {
                                if tx.send(snapshot).await.is_err() {
                                    return;
                                }
                            }
                            Err(error) => {
                                tracing::error!(collection, %error, "Live query refresh failed");
                            }
                        }
                    }
                }
            }
        });

        LiveQuery { rx, cancel }
    }
}

fn run_query<T, F>(store: &DataStore, collection: &'static str, filter: &F) -> StoreResult<Vec<T>>
where
    T: DeserializeOwned,
    F: Fn(&T) -> bool,
{
    store.query(collection, filter)
}
