// File: kickbot-core/src/services/command_dispatcher.rs

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, warn};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{Command, CommandUsage, Role};
use kickbot_common::traits::{CommandRepository, CommandUsageRepository, PlatformClient};

use crate::cache::CooldownCache;

/// Resolves `<prefix><name> <args>` chat messages, applies cooldowns and the
/// role gate, renders the response template, and enqueues an outbound send
/// (spec §4.E).
///
/// The in-memory command table is keyed by `(channel_id, name)`, loaded on
/// channel activation (`load_channel`) and invalidated only via an explicit
/// `reload_channel` call — it is never mutated from outside via shared
/// memory (spec §5 "Shared-resource policy").
pub struct CommandDispatcher<C, U, P> {
    command_repo: C,
    usage_repo: U,
    platform: Arc<P>,
    commands: RwLock<HashMap<Uuid, HashMap<String, Command>>>,
    cooldowns: Mutex<CooldownCache>,
}

impl<C, U, P> CommandDispatcher<C, U, P>
where
    C: CommandRepository,
    U: CommandUsageRepository,
    P: PlatformClient,
{
    pub fn new(command_repo: C, usage_repo: U, platform: Arc<P>) -> Self {
        Self {
            command_repo,
            usage_repo,
            platform,
            commands: RwLock::new(HashMap::new()),
            cooldowns: Mutex::new(CooldownCache::new()),
        }
    }

    /// Loads (or reloads) the command table for one channel from the Store.
    /// Called on channel activation, and again whenever an admin edit
    /// invalidates the cache (spec §4.E "invalidated on admin edits via a
    /// reload signal").
    pub async fn reload_channel(&self, channel_id: Uuid) -> Result<(), Error> {
        let commands = self.command_repo.list_commands(channel_id).await?;
        let table: HashMap<String, Command> = commands
            .into_iter()
            .map(|c| (c.name.to_lowercase(), c))
            .collect();
        self.commands.write().await.insert(channel_id, table);
        Ok(())
    }

    pub async fn unload_channel(&self, channel_id: Uuid) {
        self.commands.write().await.remove(&channel_id);
    }

    /// Implements spec §4.E `onMessage`. Returns `Ok(true)` if a command was
    /// dispatched, `Ok(false)` if the message was silently ignored (no
    /// matching prefix, unknown/disabled command, role gate, or cooldown).
    pub async fn on_message(
        &self,
        channel_id: Uuid,
        user_id: Uuid,
        username: &str,
        text: &str,
        roles: &[Role],
        prefix: &str,
        default_global_cooldown_seconds: i64,
    ) -> Result<bool, Error> {
        let Some(rest) = text.strip_prefix(prefix) else {
            return Ok(false);
        };
        let mut parts = rest.splitn(2, char::is_whitespace);
        let name = parts.next().unwrap_or("").to_lowercase();
        let args = parts.next().unwrap_or("").trim();
        if name.is_empty() {
            return Ok(false);
        }

        let command = {
            let table = self.commands.read().await;
            let Some(channel_table) = table.get(&channel_id) else {
                return Ok(false);
            };
            let Some(command) = channel_table.get(&name) else {
                return Ok(false);
            };
            if !command.enabled {
                return Ok(false);
            }
            command.clone()
        };

        if !Role::satisfies(roles, command.user_level) {
            debug!(channel_id = %channel_id, command = %name, %user_id, "role gate rejected dispatch");
            return Ok(false);
        }

        let now = Utc::now();
        let gate = {
            let mut cooldowns = self.cooldowns.lock().await;
            cooldowns.check_and_update(
                channel_id,
                &name,
                user_id,
                now,
                default_global_cooldown_seconds,
                command.cooldown_seconds as i64,
            )
        };
        if let Err(remaining) = gate {
            debug!(channel_id = %channel_id, command = %name, %user_id, remaining, "cooldown rejected dispatch");
            return Ok(false);
        }

        let rendered = command
            .response_template
            .replace("{user}", username)
            .replace("{args}", args);

        if let Err(e) = self.platform.send_message(channel_id, &rendered).await {
            warn!(channel_id = %channel_id, command = %name, error = %e, "best-effort command reply failed to send");
        }

        if let Err(e) = self.usage_repo
            .insert_usage(&CommandUsage {
                id: Uuid::new_v4(),
                command_id: command.id,
                channel_id,
                user_id,
                used_at: now,
                args: args.to_string(),
            })
            .await
        {
            warn!(channel_id = %channel_id, command = %name, error = %e, "usage log insert failed");
        }
        if let Err(e) = self.command_repo.increment_usage_count(command.id).await {
            warn!(channel_id = %channel_id, command = %name, error = %e, "usage count increment failed");
        }

        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kickbot_common::models::UserLevel;
    use kickbot_common::traits::platform_traits::{ChannelInfo, UserInfo};
    use std::sync::Mutex as StdMutex;

    struct FakeCommandRepo {
        commands: Vec<Command>,
        increments: StdMutex<Vec<Uuid>>,
    }

    #[async_trait]
    impl CommandRepository for FakeCommandRepo {
        async fn create_command(&self, _cmd: &Command) -> Result<(), Error> {
            unimplemented!()
        }
        async fn get_command_by_id(&self, _id: Uuid) -> Result<Option<Command>, Error> {
            unimplemented!()
        }
        async fn get_command_by_name(&self, _channel_id: Uuid, _name: &str) -> Result<Option<Command>, Error> {
            unimplemented!()
        }
        async fn list_commands(&self, channel_id: Uuid) -> Result<Vec<Command>, Error> {
            Ok(self.commands.iter().filter(|c| c.channel_id == channel_id).cloned().collect())
        }
        async fn update_command(&self, _cmd: &Command) -> Result<(), Error> {
            unimplemented!()
        }
        async fn delete_command(&self, _id: Uuid) -> Result<(), Error> {
            unimplemented!()
        }
        async fn increment_usage_count(&self, id: Uuid) -> Result<(), Error> {
            self.increments.lock().unwrap().push(id);
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakeUsageRepo {
        inserted: StdMutex<Vec<CommandUsage>>,
    }

    #[async_trait]
    impl CommandUsageRepository for FakeUsageRepo {
        async fn insert_usage(&self, usage: &CommandUsage) -> Result<(), Error> {
            self.inserted.lock().unwrap().push(usage.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    struct FakePlatformClient {
        sent: StdMutex<Vec<(Uuid, String)>>,
    }

    #[async_trait]
    impl PlatformClient for FakePlatformClient {
        async fn send_message(&self, channel_id: Uuid, text: &str) -> Result<(), Error> {
            self.sent.lock().unwrap().push((channel_id, text.to_string()));
            Ok(())
        }
        async fn ban(&self, _channel_id: Uuid, _user_id: Uuid, _reason: Option<&str>) -> Result<(), Error> {
            unimplemented!()
        }
        async fn timeout(&self, _channel_id: Uuid, _user_id: Uuid, _duration_sec: u64, _reason: Option<&str>) -> Result<(), Error> {
            unimplemented!()
        }
        async fn get_channel_info(&self, _name: &str) -> Result<ChannelInfo, Error> {
            unimplemented!()
        }
        async fn get_user_info(&self, _id_or_name: &str) -> Result<UserInfo, Error> {
            unimplemented!()
        }
    }

    fn hi_command(channel_id: Uuid) -> Command {
        Command {
            id: Uuid::new_v4(),
            channel_id,
            name: "hi".to_string(),
            response_template: "ciao {user}".to_string(),
            cooldown_seconds: 10,
            user_level: UserLevel::Everyone,
            enabled: true,
            usage_count: 0,
        }
    }

    #[tokio::test]
    async fn dispatches_once_then_cools_down_the_immediate_repeat() {
        let channel_id = Uuid::new_v4();
        let alice = Uuid::new_v4();
        let command = hi_command(channel_id);
        let command_id = command.id;

        let dispatcher = CommandDispatcher::new(
            FakeCommandRepo { commands: vec![command], increments: StdMutex::new(vec![]) },
            FakeUsageRepo::default(),
            Arc::new(FakePlatformClient::default()),
        );
        dispatcher.reload_channel(channel_id).await.unwrap();

        let dispatched_0 = dispatcher
            .on_message(channel_id, alice, "alice", "!hi world", &[], "!", 1)
            .await
            .unwrap();
        assert!(dispatched_0);

        let dispatched_1 = dispatcher
            .on_message(channel_id, alice, "alice", "!hi", &[], "!", 1)
            .await
            .unwrap();
        assert!(!dispatched_1, "immediate second call must be cooled down");

        let sent = dispatcher.platform.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0], (channel_id, "ciao alice".to_string()));
        drop(sent);

        assert_eq!(dispatcher.command_repo.increments.lock().unwrap().len(), 1);
        assert_eq!(dispatcher.command_repo.increments.lock().unwrap()[0], command_id);
    }

    #[tokio::test]
    async fn ignores_messages_without_the_configured_prefix() {
        let channel_id = Uuid::new_v4();
        let dispatcher = CommandDispatcher::new(
            FakeCommandRepo { commands: vec![hi_command(channel_id)], increments: StdMutex::new(vec![]) },
            FakeUsageRepo::default(),
            Arc::new(FakePlatformClient::default()),
        );
        dispatcher.reload_channel(channel_id).await.unwrap();

        let dispatched = dispatcher
            .on_message(channel_id, Uuid::new_v4(), "alice", "hi there", &[], "!", 1)
            .await
            .unwrap();
        assert!(!dispatched);
    }

    #[tokio::test]
    async fn role_gate_rejects_insufficient_level() {
        let channel_id = Uuid::new_v4();
        let mut command = hi_command(channel_id);
        command.user_level = UserLevel::Moderator;
        let dispatcher = CommandDispatcher::new(
            FakeCommandRepo { commands: vec![command], increments: StdMutex::new(vec![]) },
            FakeUsageRepo::default(),
            Arc::new(FakePlatformClient::default()),
        );
        dispatcher.reload_channel(channel_id).await.unwrap();

        let dispatched = dispatcher
            .on_message(channel_id, Uuid::new_v4(), "alice", "!hi", &[Role::Subscriber], "!", 1)
            .await
            .unwrap();
        assert!(!dispatched);
    }

    #[tokio::test]
    async fn disabled_command_is_ignored() {
        let channel_id = Uuid::new_v4();
        let mut command = hi_command(channel_id);
        command.enabled = false;
        let dispatcher = CommandDispatcher::new(
            FakeCommandRepo { commands: vec![command], increments: StdMutex::new(vec![]) },
            FakeUsageRepo::default(),
            Arc::new(FakePlatformClient::default()),
        );
        dispatcher.reload_channel(channel_id).await.unwrap();

        let dispatched = dispatcher
            .on_message(channel_id, Uuid::new_v4(), "alice", "!hi", &[], "!", 1)
            .await
            .unwrap();
        assert!(!dispatched);
    }

    #[tokio::test]
    async fn unload_channel_empties_the_command_table() {
        let channel_id = Uuid::new_v4();
        let dispatcher = CommandDispatcher::new(
            FakeCommandRepo { commands: vec![hi_command(channel_id)], increments: StdMutex::new(vec![]) },
            FakeUsageRepo::default(),
            Arc::new(FakePlatformClient::default()),
        );
        dispatcher.reload_channel(channel_id).await.unwrap();
        dispatcher.unload_channel(channel_id).await;

        let dispatched = dispatcher
            .on_message(channel_id, Uuid::new_v4(), "alice", "!hi", &[], "!", 1)
            .await
            .unwrap();
        assert!(!dispatched);
    }
}
