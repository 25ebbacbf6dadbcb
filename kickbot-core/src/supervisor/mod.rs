// File: kickbot-core/src/supervisor/mod.rs

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::ChatEvent;
use kickbot_common::traits::ChatIngress;

/// Per-channel wiring the supervisor drives: command dispatch, points
/// accrual, and giveaway entry, bundled behind one object-safe interface so
/// `ChannelSupervisor` does not need to carry every service's generic
/// parameters (spec §4.J).
#[async_trait]
pub trait ChannelRouter: Send + Sync {
    /// Loads commands, rewards, giveaways, and settings for this channel.
    async fn load(&self) -> Result<(), Error>;

    /// Routes one ingress event to the command dispatcher, points engine,
    /// and giveaway manager in turn.
    async fn route(&self, event: ChatEvent) -> Result<(), Error>;

    /// One periodic PointsEngine tick.
    async fn tick(&self);

    /// Flushes buffered usage counters; called once on deactivation.
    async fn flush(&self);
}

/// Bounded wait for a channel's tasks to wind down before this supervisor
/// aborts them outright (spec §4.J "bounded grace period (<= 5 s)").
const DEACTIVATION_GRACE: StdDuration = StdDuration::from_secs(5);

struct ChannelRuntime {
    router: Arc<dyn ChannelRouter>,
    cancel: CancellationToken,
    ingress_task: JoinHandle<()>,
    tick_task: JoinHandle<()>,
}

/// Owns the lifecycle of every active channel: opens a `ChatIngress`,
/// routes its events sequentially (preserving per-channel command
/// ordering), and runs a periodic tick loop alongside it. Channels are
/// independent of one another and proceed fully in parallel (spec §5
/// "Scheduling model").
pub struct ChannelSupervisor {
    channels: Mutex<HashMap<Uuid, ChannelRuntime>>,
    tick_period: StdDuration,
}

impl ChannelSupervisor {
    pub fn new(tick_period: StdDuration) -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            tick_period,
        }
    }

    pub async fn activate(
        &self,
        channel_id: Uuid,
        mut ingress: Box<dyn ChatIngress>,
        router: Arc<dyn ChannelRouter>,
    ) -> Result<(), Error> {
        {
            let channels = self.channels.lock().await;
            if channels.contains_key(&channel_id) {
                return Err(Error::PreconditionFailed(format!(
                    "channel {channel_id} is already active"
                )));
            }
        }

        router.load().await?;
        let cancel = CancellationToken::new();

        let ingress_router = router.clone();
        let ingress_cancel = cancel.clone();
        let ingress_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = ingress_cancel.cancelled() => break,
                    event = ingress.next_event() => {
                        let Some(event) = event else { break };
                        if let Err(e) = ingress_router.route(event).await {
                            warn!(%channel_id, error = %e, "event routing failed");
                        }
                    }
                }
            }
            ingress.stop().await;
            info!(%channel_id, "ingress loop ended");
        });

        let tick_router = router.clone();
        let tick_cancel = cancel.clone();
        let tick_period = self.tick_period;
        let tick_task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tick_cancel.cancelled() => break,
                    _ = tokio::time::sleep(tick_period) => {
                        tick_router.tick().await;
                    }
                }
            }
            info!(%channel_id, "tick loop ended");
        });

        self.channels.lock().await.insert(
            channel_id,
            ChannelRuntime { router, cancel, ingress_task, tick_task },
        );
        Ok(())
    }

    pub async fn deactivate(&self, channel_id: Uuid) {
        let runtime = self.channels.lock().await.remove(&channel_id);
        let Some(runtime) = runtime else {
            return;
        };

        runtime.cancel.cancel();
        let wound_down = timeout(DEACTIVATION_GRACE, async {
            let _ = (&mut { runtime.ingress_task }).await;
        })
        .await;

        if wound_down.is_err() {
            warn!(%channel_id, "deactivation grace period elapsed, forcing termination");
        }
        // tick_task shares the same cancellation token and has no external
        // I/O to drain; abort is always safe once cancellation was signalled.
        runtime.tick_task.abort();

        runtime.router.flush().await;
        info!(%channel_id, "channel deactivated");
    }

    pub async fn is_active(&self, channel_id: Uuid) -> bool {
        self.channels.lock().await.contains_key(&channel_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::mpsc;

    struct FakeIngress {
        rx: mpsc::UnboundedReceiver<ChatEvent>,
    }

    #[async_trait]
    impl ChatIngress for FakeIngress {
        async fn next_event(&mut self) -> Option<ChatEvent> {
            self.rx.recv().await
        }
        async fn stop(&mut self) {
            self.rx.close();
        }
    }

    #[derive(Default)]
    struct CountingRouter {
        routed: AtomicUsize,
        ticked: AtomicUsize,
        flushed: AtomicUsize,
    }

    #[async_trait]
    impl ChannelRouter for CountingRouter {
        async fn load(&self) -> Result<(), Error> {
            Ok(())
        }
        async fn route(&self, _event: ChatEvent) -> Result<(), Error> {
            self.routed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn tick(&self) {
            self.ticked.fetch_add(1, Ordering::SeqCst);
        }
        async fn flush(&self) {
            self.flushed.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn routes_events_until_the_ingress_closes() {
        let channel_id = Uuid::new_v4();
        let (tx, rx) = mpsc::unbounded_channel();
        let router = Arc::new(CountingRouter::default());
        let supervisor = ChannelSupervisor::new(StdDuration::from_secs(3600));

        supervisor
            .activate(channel_id, Box::new(FakeIngress { rx }), router.clone())
            .await
            .unwrap();

        tx.send(ChatEvent::StreamStart { channel_id }).unwrap();
        tx.send(ChatEvent::StreamEnd { channel_id }).unwrap();
        drop(tx);

        tokio::time::sleep(StdDuration::from_millis(50)).await;
        assert_eq!(router.routed.load(Ordering::SeqCst), 2);

        supervisor.deactivate(channel_id).await;
        assert_eq!(router.flushed.load(Ordering::SeqCst), 1);
        assert!(!supervisor.is_active(channel_id).await);
    }

    #[tokio::test]
    async fn activating_an_already_active_channel_is_rejected() {
        let channel_id = Uuid::new_v4();
        let (_tx, rx) = mpsc::unbounded_channel();
        let router = Arc::new(CountingRouter::default());
        let supervisor = ChannelSupervisor::new(StdDuration::from_secs(3600));

        supervisor
            .activate(channel_id, Box::new(FakeIngress { rx }), router.clone())
            .await
            .unwrap();

        let (_tx2, rx2) = mpsc::unbounded_channel();
        let result = supervisor
            .activate(channel_id, Box::new(FakeIngress { rx: rx2 }), router)
            .await;
        assert!(result.is_err());

        supervisor.deactivate(channel_id).await;
    }
}
