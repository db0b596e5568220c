// Worker Stop Signal

use tokio::sync::watch;

/// Observed by every worker loop of one pool
#[derive(Clone)]
pub struct StopToken {
    rx: watch::Receiver<bool>,
}

impl StopToken {
    /// Check if stop was requested (a dropped sender counts as a stop)
    pub fn is_stopped(&self) -> bool {
        *self.rx.borrow() || self.rx.has_changed().is_err()
    }

    /// Resolve once stop is requested
    pub async fn stopped(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

/// Held by the queue while the pool runs
pub struct StopSender {
    tx: watch::Sender<bool>,
}

impl StopSender {
    /// Signal stop to all workers
    pub fn stop(&self) {
        let _ = self.tx.send(true);
    }
}

/// Create a stop channel
pub fn stop_channel() -> (StopSender, StopToken) {
    let (tx, rx) = watch::channel(false);
    (StopSender { tx }, StopToken { rx })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio_test::{assert_pending, assert_ready, task};

    #[tokio::test]
    async fn test_stop_wakes_waiter() {
        let (sender, token) = stop_channel();
        assert!(!token.is_stopped());

        let mut waiter = token.clone();
        let handle = tokio::spawn(async move { waiter.stopped().await });

        sender.stop();
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("waiter should wake")
            .unwrap();
        assert!(token.is_stopped());
    }

    #[test]
    fn test_stopped_pending_until_signal() {
        let (sender, mut token) = stop_channel();
        let mut stopped = task::spawn(token.stopped());
        assert_pending!(stopped.poll());

        sender.stop();
        assert!(stopped.is_woken());
        assert_ready!(stopped.poll());
    }

    #[tokio::test]
    async fn test_dropped_sender_counts_as_stop() {
        let (sender, mut token) = stop_channel();
        drop(sender);
        assert!(token.is_stopped());
        token.stopped().await;
    }
}
