use bytes::Bytes;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::connection::Connection;

/// Counter value telling the replica to apply an entry.
pub const APPLY: i32 = 1;

/// Entries buffered for a replica before new ones are dropped.
pub const QUEUE_CAPACITY: usize = 65_536;

/// One key mutation to ship to the replica. `None` means the key was deleted.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    pub key: Bytes,
    pub value: Option<Bytes>,
}

/// Handle used by command handlers to queue replication entries.
///
/// Queuing never blocks and never fails. Entries are delivered at most once by a background task;
/// whatever cannot be written to the replica is lost. The queue is bounded, so a replica that falls
/// behind loses the newest entries instead of growing the primary's memory.
#[derive(Clone, Debug, Default)]
pub struct Replicator {
    tx: Option<Sender<Entry>>,
}

impl Replicator {
    /// A replicator that discards every entry.
    pub fn disabled() -> Replicator {
        Replicator::default()
    }

    /// Starts the shipping task for `addr` with room for `capacity` pending entries. Must be called
    /// from within a Tokio runtime.
    pub fn spawn(addr: impl Into<String>, config: ConnectionConfig, capacity: usize) -> Replicator {
        let (replicator, rx) = Replicator::bounded(capacity);
        let conn = Connection::new(addr, config);

        info!(replica = conn.addr(), "replication enabled");
        tokio::spawn(ship(conn, rx));

        replicator
    }

    /// A replicator whose entries are handed to the returned receiver.
    pub fn channel() -> (Replicator, Receiver<Entry>) {
        Replicator::bounded(QUEUE_CAPACITY)
    }

    pub fn bounded(capacity: usize) -> (Replicator, Receiver<Entry>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));

        (Replicator { tx: Some(tx) }, rx)
    }

    pub fn is_enabled(&self) -> bool {
        self.tx.is_some()
    }

    pub fn log(&self, key: Bytes, value: Option<Bytes>) {
        let Some(tx) = &self.tx else {
            return;
        };

        match tx.try_send(Entry { key, value }) {
            Ok(()) => {}
            Err(TrySendError::Full(entry)) => {
                warn!(key = ?entry.key, "replication queue full, entry dropped");
            }
            Err(TrySendError::Closed(_)) => {
                debug!("replication worker is gone, entry dropped");
            }
        }
    }
}

async fn ship(mut conn: Connection, mut rx: Receiver<Entry>) {
    while let Some(entry) = rx.recv().await {
        if !conn.log(entry.key, entry.value, APPLY).await {
            debug!(replica = conn.addr(), "replication entry lost");
        }
    }

    debug!(replica = conn.addr(), "replication worker stopped");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_discards() {
        let replicator = Replicator::disabled();

        assert!(!replicator.is_enabled());
        replicator.log(Bytes::from("key"), None);
    }

    #[tokio::test]
    async fn entries_are_queued_in_order() {
        let (replicator, mut rx) = Replicator::channel();

        replicator.log(Bytes::from("a"), Some(Bytes::from("1")));
        replicator.log(Bytes::from("b"), None);

        assert_eq!(
            rx.recv().await,
            Some(Entry {
                key: Bytes::from("a"),
                value: Some(Bytes::from("1"))
            })
        );
        assert_eq!(
            rx.recv().await,
            Some(Entry {
                key: Bytes::from("b"),
                value: None
            })
        );
    }

    #[tokio::test]
    async fn closed_worker_does_not_fail_the_caller() {
        let (replicator, rx) = Replicator::channel();
        drop(rx);

        replicator.log(Bytes::from("a"), None);
    }

    #[tokio::test]
    async fn full_queue_drops_newest_entries() {
        let (replicator, mut rx) = Replicator::bounded(2);

        for key in ["a", "b", "c", "d"] {
            replicator.log(Bytes::from(key), None);
        }

        assert_eq!(rx.recv().await.map(|entry| entry.key), Some(Bytes::from("a")));
        assert_eq!(rx.recv().await.map(|entry| entry.key), Some(Bytes::from("b")));
        assert!(rx.try_recv().is_err());

        // Draining makes room again.
        replicator.log(Bytes::from("e"), None);
        assert_eq!(rx.recv().await.map(|entry| entry.key), Some(Bytes::from("e")));
    }
}
