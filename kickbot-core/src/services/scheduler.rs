// File: kickbot-core/src/services/scheduler.rs

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Months, Utc};
use serde_json::json;
use tracing::{info, warn};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{EventStatus, EventType, RecurrencePattern, ScheduledEvent};
use kickbot_common::traits::{Notifier, ReminderRepository, ScheduledEventRepository};

/// A default tick period, overridable by the caller that drives `tick`.
pub const DEFAULT_TICK_PERIOD_SECONDS: u64 = 15;

/// How far ahead the recurrence generator looks for the next occurrence
/// (spec §4.H step 4).
const RECURRENCE_LOOKAHEAD: Duration = Duration::days(7);

/// Per-event-type side effect fired on promotion (spec §4.H "fire the
/// registered handler for its type"). `giveaway` and `automation` types are
/// wired to `GiveawayManager`/the command layer by the caller; the rest
/// default to a plain notification.
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, event: &ScheduledEvent) -> Result<(), Error>;
}

struct NotifyHandler<N> {
    notifier: Arc<N>,
}

#[async_trait]
impl<N: Notifier> EventHandler for NotifyHandler<N> {
    async fn handle(&self, event: &ScheduledEvent) -> Result<(), Error> {
        self.notifier
            .notify(
                "scheduled_event_started",
                &[],
                json!({"event_id": event.id, "channel_id": event.channel_id, "title": event.title}),
            )
            .await;
        Ok(())
    }
}

/// Drives the scheduled-event lifecycle on a periodic tick (spec §4.H):
/// promote due pending events, complete due active events, send due
/// reminders, and expand recurrences up to a week ahead.
pub struct Scheduler<S, R, N> {
    events: S,
    reminders: R,
    notifier: Arc<N>,
    handlers: HashMap<EventType, Arc<dyn EventHandler>>,
}

impl<S, R, N> Scheduler<S, R, N>
where
    S: ScheduledEventRepository,
    R: ReminderRepository,
    N: Notifier + 'static,
{
    pub fn new(events: S, reminders: R, notifier: Arc<N>) -> Self {
        let default_handler: Arc<dyn EventHandler> = Arc::new(NotifyHandler { notifier: notifier.clone() });
        let mut handlers: HashMap<EventType, Arc<dyn EventHandler>> = HashMap::new();
        for event_type in [
            EventType::Stream,
            EventType::SocialPost,
            EventType::Reminder,
            EventType::ChannelUpdate,
            EventType::Other,
        ] {
            handlers.insert(event_type, default_handler.clone());
        }
        Self { events, reminders, notifier, handlers }
    }

    /// Overrides the handler for one event type (used to wire `giveaway` to
    /// `GiveawayManager` and `automation` to the command layer).
    pub fn set_handler(&mut self, event_type: EventType, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(event_type, handler);
    }

    pub async fn tick(&self, channel_id: Option<Uuid>) -> Result<(), Error> {
        self.promote(channel_id).await?;
        self.complete_due(channel_id).await?;
        self.send_reminders().await?;
        self.generate_recurrences(channel_id).await?;
        Ok(())
    }

    async fn promote(&self, channel_id: Option<Uuid>) -> Result<(), Error> {
        let now = Utc::now();
        let pending = self.events.list_pending_events(channel_id).await?;
        for mut event in pending {
            if event.start_at > now {
                continue;
            }
            event.status = EventStatus::Active;
            self.events.update_event(&event).await?;

            let Some(handler) = self.handlers.get(&event.event_type).cloned() else {
                continue;
            };
            if let Err(e) = handler.handle(&event).await {
                warn!(event_id = %event.id, error = %e, "scheduled event handler failed, marking failed");
                let mut failed = event.clone();
                failed.status = EventStatus::Failed;
                if let Err(e2) = self.events.update_event(&failed).await {
                    warn!(event_id = %event.id, error = %e2, "failed to persist failed status");
                }
            }
        }
        Ok(())
    }

    async fn complete_due(&self, channel_id: Option<Uuid>) -> Result<(), Error> {
        let now = Utc::now();
        let active = self.events.list_active_events(channel_id).await?;
        for mut event in active {
            let Some(end_at) = event.end_at else { continue };
            if end_at > now {
                continue;
            }
            event.status = EventStatus::Completed;
            self.events.update_event(&event).await?;
        }
        Ok(())
    }

    async fn send_reminders(&self) -> Result<(), Error> {
        let now = Utc::now();
        let pending = self.reminders.list_pending_reminders().await?;
        for reminder in pending {
            let Some(event) = self.events.get_event(reminder.event_id).await? else {
                continue;
            };
            let fire_at = event.start_at - Duration::seconds(reminder.lead_seconds);
            if fire_at > now {
                continue;
            }
            self.notifier
                .notify(
                    "event_reminder",
                    &[],
                    json!({
                        "event_id": event.id,
                        "channels": reminder.channels,
                        "message": reminder.message,
                    }),
                )
                .await;
            self.reminders.mark_sent(reminder.event_id, reminder.id, now).await?;
        }
        Ok(())
    }

    async fn generate_recurrences(&self, channel_id: Option<Uuid>) -> Result<(), Error> {
        let now = Utc::now();
        let pending = self.events.list_pending_events(channel_id).await?;
        for event in pending {
            let Some(recurrence) = event.recurrence_typed() else { continue };
            if recurrence.pattern == RecurrencePattern::Custom {
                continue;
            }
            let anchor = recurrence.last_generated_at.unwrap_or(event.start_at);
            let Some(next_start) = next_occurrence(recurrence.pattern, anchor) else {
                continue;
            };
            if next_start > now + RECURRENCE_LOOKAHEAD {
                continue;
            }
            if self.events.has_child_for_occurrence(event.id, next_start).await? {
                continue;
            }

            let child = ScheduledEvent {
                id: Uuid::new_v4(),
                channel_id: event.channel_id,
                title: event.title.clone(),
                event_type: event.event_type,
                status: EventStatus::Pending,
                start_at: next_start,
                end_at: event.end_at,
                recurrence: None,
                metadata: event.metadata.clone(),
                recurrence_parent_id: Some(event.id),
            };
            self.events.create_event(&child).await?;

            for reminder in self.reminders.list_reminders_for_event(event.id).await? {
                self.reminders
                    .create_reminder(&kickbot_common::models::Reminder {
                        id: Uuid::new_v4(),
                        event_id: child.id,
                        lead_seconds: reminder.lead_seconds,
                        channels: reminder.channels.clone(),
                        message: reminder.message.clone(),
                        sent: false,
                        sent_at: None,
                    })
                    .await?;
            }

            info!(parent_id = %event.id, child_id = %child.id, %next_start, "generated recurrence instance");
        }
        Ok(())
    }
}

fn next_occurrence(pattern: RecurrencePattern, anchor: DateTime<Utc>) -> Option<DateTime<Utc>> {
    match pattern {
        RecurrencePattern::Daily => Some(anchor + Duration::days(1)),
        RecurrencePattern::Weekly => Some(anchor + Duration::weeks(1)),
        RecurrencePattern::Monthly => anchor.checked_add_months(Months::new(1)),
        RecurrencePattern::Custom => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kickbot_common::models::{Recurrence, Reminder};
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct FakeEventRepo {
        events: StdMutex<HashMap<Uuid, ScheduledEvent>>,
        created: StdMutex<Vec<ScheduledEvent>>,
    }

    #[async_trait]
    impl ScheduledEventRepository for FakeEventRepo {
        async fn create_event(&self, event: &ScheduledEvent) -> Result<(), Error> {
            self.events.lock().unwrap().insert(event.id, event.clone());
            self.created.lock().unwrap().push(event.clone());
            Ok(())
        }
        async fn get_event(&self, id: Uuid) -> Result<Option<ScheduledEvent>, Error> {
            Ok(self.events.lock().unwrap().get(&id).cloned())
        }
        async fn update_event(&self, event: &ScheduledEvent) -> Result<(), Error> {
            self.events.lock().unwrap().insert(event.id, event.clone());
            Ok(())
        }
        async fn delete_event(&self, id: Uuid) -> Result<(), Error> {
            self.events.lock().unwrap().remove(&id);
            Ok(())
        }
        async fn list_pending_events(&self, channel_id: Option<Uuid>) -> Result<Vec<ScheduledEvent>, Error> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.status == EventStatus::Pending)
                .filter(|e| channel_id.is_none_or(|c| c == e.channel_id))
                .cloned()
                .collect())
        }
        async fn list_active_events(&self, channel_id: Option<Uuid>) -> Result<Vec<ScheduledEvent>, Error> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .values()
                .filter(|e| e.status == EventStatus::Active)
                .filter(|e| channel_id.is_none_or(|c| c == e.channel_id))
                .cloned()
                .collect())
        }
        async fn has_child_for_occurrence(&self, parent_id: Uuid, occurrence_start: DateTime<Utc>) -> Result<bool, Error> {
            Ok(self
                .events
                .lock()
                .unwrap()
                .values()
                .any(|e| e.recurrence_parent_id == Some(parent_id) && e.start_at == occurrence_start))
        }
    }

    #[derive(Default)]
    struct FakeReminderRepo {
        reminders: StdMutex<HashMap<Uuid, Reminder>>,
    }

    #[async_trait]
    impl ReminderRepository for FakeReminderRepo {
        async fn create_reminder(&self, reminder: &Reminder) -> Result<(), Error> {
            self.reminders.lock().unwrap().insert(reminder.id, reminder.clone());
            Ok(())
        }
        async fn list_reminders_for_event(&self, event_id: Uuid) -> Result<Vec<Reminder>, Error> {
            Ok(self.reminders.lock().unwrap().values().filter(|r| r.event_id == event_id).cloned().collect())
        }
        async fn list_pending_reminders(&self) -> Result<Vec<Reminder>, Error> {
            Ok(self.reminders.lock().unwrap().values().filter(|r| !r.sent).cloned().collect())
        }
        async fn mark_sent(&self, event_id: Uuid, reminder_id: Uuid, sent_at: DateTime<Utc>) -> Result<(), Error> {
            if let Some(r) = self.reminders.lock().unwrap().get_mut(&reminder_id) {
                if r.event_id == event_id {
                    r.sent = true;
                    r.sent_at = Some(sent_at);
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        calls: StdMutex<Vec<String>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, template_id: &str, _recipients: &[Uuid], _data: serde_json::Value) {
            self.calls.lock().unwrap().push(template_id.to_string());
        }
    }

    fn stream_event(channel_id: Uuid, start_at: DateTime<Utc>) -> ScheduledEvent {
        ScheduledEvent {
            id: Uuid::new_v4(),
            channel_id,
            title: "going live".to_string(),
            event_type: EventType::Stream,
            status: EventStatus::Pending,
            start_at,
            end_at: None,
            recurrence: None,
            metadata: json!({}),
            recurrence_parent_id: None,
        }
    }

    #[tokio::test]
    async fn promotes_a_due_pending_event_and_fires_its_handler() {
        let channel_id = Uuid::new_v4();
        let event = stream_event(channel_id, Utc::now() - Duration::seconds(1));
        let event_id = event.id;
        let events = FakeEventRepo::default();
        events.create_event(&event).await.unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = Scheduler::new(events, FakeReminderRepo::default(), notifier.clone());
        scheduler.tick(Some(channel_id)).await.unwrap();

        let stored = scheduler.events.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Active);
        assert_eq!(notifier.calls.lock().unwrap().as_slice(), ["scheduled_event_started"]);
    }

    #[tokio::test]
    async fn does_not_promote_an_event_that_is_not_yet_due() {
        let channel_id = Uuid::new_v4();
        let event = stream_event(channel_id, Utc::now() + Duration::hours(1));
        let event_id = event.id;
        let events = FakeEventRepo::default();
        events.create_event(&event).await.unwrap();

        let scheduler = Scheduler::new(events, FakeReminderRepo::default(), Arc::new(RecordingNotifier::default()));
        scheduler.tick(Some(channel_id)).await.unwrap();

        let stored = scheduler.events.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Pending);
    }

    /// S5: a reminder due at `startAt - leadSeconds` fires exactly once.
    #[tokio::test]
    async fn s5_reminder_fires_once() {
        let channel_id = Uuid::new_v4();
        let start_at = Utc::now() + Duration::seconds(60);
        let mut event = stream_event(channel_id, start_at);
        event.status = EventStatus::Active;
        let event_id = event.id;
        let events = FakeEventRepo::default();
        events.create_event(&event).await.unwrap();

        let reminders = FakeReminderRepo::default();
        let reminder_id = Uuid::new_v4();
        reminders
            .create_reminder(&Reminder {
                id: reminder_id,
                event_id,
                lead_seconds: 300,
                channels: vec![Uuid::new_v4()],
                message: None,
                sent: false,
                sent_at: None,
            })
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let scheduler = Scheduler::new(events, reminders, notifier.clone());

        scheduler.tick(Some(channel_id)).await.unwrap();
        assert_eq!(notifier.calls.lock().unwrap().as_slice(), ["event_reminder"]);

        scheduler.tick(Some(channel_id)).await.unwrap();
        assert_eq!(notifier.calls.lock().unwrap().len(), 1, "a sent reminder must not re-fire");
    }

    #[tokio::test]
    async fn completes_an_active_event_past_its_end_time() {
        let channel_id = Uuid::new_v4();
        let mut event = stream_event(channel_id, Utc::now() - Duration::hours(1));
        event.status = EventStatus::Active;
        event.end_at = Some(Utc::now() - Duration::seconds(1));
        let event_id = event.id;
        let events = FakeEventRepo::default();
        events.create_event(&event).await.unwrap();

        let scheduler = Scheduler::new(events, FakeReminderRepo::default(), Arc::new(RecordingNotifier::default()));
        scheduler.tick(Some(channel_id)).await.unwrap();

        let stored = scheduler.events.get_event(event_id).await.unwrap().unwrap();
        assert_eq!(stored.status, EventStatus::Completed);
    }

    #[tokio::test]
    async fn generates_a_daily_recurrence_child_within_the_lookahead_window() {
        let channel_id = Uuid::new_v4();
        let mut event = stream_event(channel_id, Utc::now() + Duration::hours(2));
        event.recurrence = Some(serde_json::to_value(Recurrence {
            pattern: RecurrencePattern::Daily,
            last_generated_at: None,
        }).unwrap());
        let parent_id = event.id;
        let events = FakeEventRepo::default();
        events.create_event(&event).await.unwrap();

        let scheduler = Scheduler::new(events, FakeReminderRepo::default(), Arc::new(RecordingNotifier::default()));
        scheduler.tick(Some(channel_id)).await.unwrap();

        let created = scheduler.events.created.lock().unwrap();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].recurrence_parent_id, Some(parent_id));

        drop(created);
        scheduler.tick(Some(channel_id)).await.unwrap();
        assert_eq!(scheduler.events.created.lock().unwrap().len(), 1, "must not duplicate the same occurrence");
    }

    #[tokio::test]
    async fn custom_recurrence_pattern_is_never_expanded() {
        let channel_id = Uuid::new_v4();
        let mut event = stream_event(channel_id, Utc::now() + Duration::hours(2));
        event.recurrence = Some(serde_json::to_value(Recurrence {
            pattern: RecurrencePattern::Custom,
            last_generated_at: None,
        }).unwrap());
        let events = FakeEventRepo::default();
        events.create_event(&event).await.unwrap();

        let scheduler = Scheduler::new(events, FakeReminderRepo::default(), Arc::new(RecordingNotifier::default()));
        scheduler.tick(Some(channel_id)).await.unwrap();

        assert!(scheduler.events.created.lock().unwrap().is_empty());
    }
}
