//! In-process event bus for fan-out from ingress/scheduler to any number of
//! interested subscribers (spec §2 "ChannelSupervisor ... routes events").

use std::sync::Arc;
use tokio::sync::{mpsc, watch, Mutex};

use kickbot_common::models::ChatEvent;

/// Events the core publishes internally. `Chat` wraps the normalized ingress
/// event; the others are emitted by the scheduler and giveaway manager.
#[derive(Debug, Clone)]
pub enum BotEvent {
    Chat(ChatEvent),
    ScheduledEventPromoted { event_id: uuid::Uuid },
    ScheduledEventCompleted { event_id: uuid::Uuid },
    GiveawayCompleted { giveaway_id: uuid::Uuid, winner_count: usize },
}

const DEFAULT_BUFFER_SIZE: usize = 10_000;

/// Guaranteed delivery to every subscriber via bounded MPSC queues; a full
/// queue applies backpressure to `publish` rather than dropping events.
#[derive(Clone)]
pub struct EventBus {
    subscribers: Arc<Mutex<Vec<mpsc::Sender<BotEvent>>>>,
    shutdown_tx: watch::Sender<bool>,
    pub shutdown_rx: watch::Receiver<bool>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            subscribers: Arc::new(Mutex::new(vec![])),
            shutdown_tx: tx,
            shutdown_rx: rx,
        }
    }

    pub fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);
    }

    pub fn is_shutdown(&self) -> bool {
        *self.shutdown_rx.borrow()
    }

    pub async fn subscribe(&self, buffer_size: Option<usize>) -> mpsc::Receiver<BotEvent> {
        let size = buffer_size.unwrap_or(DEFAULT_BUFFER_SIZE);
        let (tx, rx) = mpsc::channel(size);
        let mut subs = self.subscribers.lock().await;
        subs.push(tx);
        rx
    }

    pub async fn publish(&self, event: BotEvent) {
        let senders = {
            let subs = self.subscribers.lock().await;
            subs.clone()
        };
        for s in senders {
            let _ = s.send(event.clone()).await;
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout, Duration};
    use uuid::Uuid;

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe(Some(5)).await;
        let mut rx2 = bus.subscribe(Some(5)).await;

        let event_id = Uuid::new_v4();
        bus.publish(BotEvent::ScheduledEventCompleted { event_id }).await;

        let evt1 = rx1.recv().await.expect("rx1 should get event");
        let evt2 = rx2.recv().await.expect("rx2 should get event");
        assert!(matches!(evt1, BotEvent::ScheduledEventCompleted { event_id: id } if id == event_id));
        assert!(matches!(evt2, BotEvent::ScheduledEventCompleted { event_id: id } if id == event_id));
    }

    #[tokio::test]
    async fn publish_blocks_until_subscriber_drains() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(Some(1)).await;
        let giveaway_id = Uuid::new_v4();

        bus.publish(BotEvent::GiveawayCompleted { giveaway_id, winner_count: 1 }).await;

        let handle = tokio::spawn(async move {
            sleep(Duration::from_millis(50)).await;
            rx.recv().await.unwrap();
            rx.recv().await.unwrap();
        });

        let publish_fut = bus.publish(BotEvent::GiveawayCompleted { giveaway_id, winner_count: 2 });
        let result = timeout(Duration::from_millis(500), publish_fut).await;
        assert!(result.is_ok(), "publish should eventually unblock");
        handle.await.unwrap();
    }
}
