//! Keep-alive scheduler.
//!
//! Sends a liveness frame every interval while the session is open. A tick
//! that finds the transport unwritable is dropped; the next tick tries again.

use super::frame::Frame;
use super::traits::TransportChannel;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, warn};

/// Running keep-alive task; stopped on `stop()` or drop
pub struct KeepAlive {
    handle: JoinHandle<()>,
}

impl KeepAlive {
    /// Start ticking; the first frame goes out one `period` from now
    pub fn start<T: TransportChannel>(transport: Arc<T>, period: Duration) -> Self {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                ticker.tick().await;

                if !transport.is_writable() {
                    debug!("keep-alive tick skipped, transport not writable");
                    continue;
                }
                if let Err(e) = transport.send(&Frame::KeepAlive).await {
                    warn!(error = %e, "keep-alive send failed");
                }
            }
        });

        Self { handle }
    }

    /// Stop ticking immediately
    pub fn stop(self) {
        self.handle.abort();
    }
}

impl Drop for KeepAlive {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket::mock::MockTransport;
    use crate::socket::traits::TransportEvents;

    async fn connected() -> (MockTransport, TransportEvents) {
        let transport = MockTransport::new();
        let events = transport.connect().await.unwrap();
        (transport, events)
    }

    fn keep_alives(transport: &MockTransport) -> usize {
        transport
            .sent_frames()
            .iter()
            .filter(|f| **f == Frame::KeepAlive)
            .count()
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_at_interval() {
        let (transport, _events) = connected().await;
        let keep_alive = KeepAlive::start(Arc::new(transport.clone()), Duration::from_secs(20));

        tokio::time::sleep(Duration::from_secs(19)).await;
        assert_eq!(keep_alives(&transport), 0);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(keep_alives(&transport), 1);

        tokio::time::sleep(Duration::from_secs(40)).await;
        assert_eq!(keep_alives(&transport), 3);

        keep_alive.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_unwritable_ticks_are_dropped() {
        let (transport, _events) = connected().await;
        transport.set_writable(false);
        let _keep_alive = KeepAlive::start(Arc::new(transport.clone()), Duration::from_secs(20));

        tokio::time::sleep(Duration::from_secs(45)).await;
        assert_eq!(keep_alives(&transport), 0);

        transport.set_writable(true);
        tokio::time::sleep(Duration::from_secs(20)).await;
        // Dropped ticks are not replayed
        assert_eq!(keep_alives(&transport), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_immediate() {
        let (transport, _events) = connected().await;
        let keep_alive = KeepAlive::start(Arc::new(transport.clone()), Duration::from_secs(20));

        tokio::time::sleep(Duration::from_secs(21)).await;
        keep_alive.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(keep_alives(&transport), 1);
    }
}
