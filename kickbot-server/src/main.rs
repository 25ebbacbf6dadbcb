// =============================================================================
// kickbot-server/src/main.rs
//   Single #[tokio::main] binary: connects the database, activates every
//   registered channel under the ChannelSupervisor, and runs the scheduler
//   tick loop alongside it until interrupted.
// =============================================================================

use std::sync::Arc;
use std::time::Duration as StdDuration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use uuid::Uuid;

use kickbot_common::error::Error;
use kickbot_common::models::{ChannelSettings, EventType, Platform};
use kickbot_common::traits::{ChannelRepository, ChatIngress, SettingsRepository};

use kickbot_core::crypto::Encryptor;
use kickbot_core::db::Database;
use kickbot_core::eventbus::EventBus;
use kickbot_core::platforms::kick::{KickChatIngress, KickClient};
use kickbot_core::platforms::youtube::{YoutubeChatIngress, YoutubeClient};
use kickbot_core::repositories::postgres::{
    PostgresChannelRepository, PostgresCommandRepository, PostgresCommandUsageRepository,
    PostgresGiveawayRepository, PostgresPointsRepository, PostgresReminderRepository,
    PostgresRewardRepository, PostgresScheduledEventRepository, PostgresSettingsRepository,
    PostgresTokenRepository,
};
use kickbot_core::services::{
    CommandDispatcher, EventHandler, GiveawayActivationHandler, GiveawayManager, PointsEngine,
    RequirementValidators, RewardArbiter, Scheduler, DEFAULT_TICK_PERIOD_SECONDS,
};
use kickbot_core::supervisor::ChannelSupervisor;
use kickbot_core::token_vault::{OAuthClientConfig, TokenVault};
use kickbot_core::TracingNotifier;

mod router;
use router::{DynPlatformClient, LiveChannelRouter};

#[derive(Parser, Debug, Clone)]
#[command(name = "kickbot")]
#[command(author, version, about = "Multi-tenant chat-automation runtime for Kick and YouTube")]
struct Args {
    /// Postgres connection URL.
    #[arg(long, env = "KICKBOT_DATABASE_URL", default_value = "postgres://kickbot@localhost:5432/kickbot")]
    database_url: String,

    /// Base64-encoded 32-byte AES-256 key used to encrypt stored OAuth tokens.
    #[arg(long, env = "KICKBOT_MASTER_KEY")]
    master_key: String,

    #[arg(long, env = "KICKBOT_KICK_CLIENT_ID", default_value = "")]
    kick_client_id: String,
    #[arg(long, env = "KICKBOT_KICK_CLIENT_SECRET", default_value = "")]
    kick_client_secret: String,
    #[arg(long, default_value = "https://id.kick.com/oauth/token")]
    kick_token_endpoint: String,

    #[arg(long, env = "KICKBOT_YOUTUBE_CLIENT_ID", default_value = "")]
    youtube_client_id: String,
    #[arg(long, env = "KICKBOT_YOUTUBE_CLIENT_SECRET", default_value = "")]
    youtube_client_secret: String,
    #[arg(long, default_value = "https://oauth2.googleapis.com/token")]
    youtube_token_endpoint: String,

    /// Period between PointsEngine ticks for each active channel, seconds.
    #[arg(long, default_value_t = 60)]
    points_tick_seconds: u64,

    /// Period between scheduler ticks (promotion, reminders, recurrence), seconds.
    #[arg(long, default_value_t = DEFAULT_TICK_PERIOD_SECONDS)]
    scheduler_tick_seconds: u64,

    #[arg(long = "log-level", default_value = "info", value_parser = ["info", "warn", "debug", "error", "trace"])]
    log_level: String,
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::new(format!("kickbot={level}"));
    let subscriber = fmt().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).expect("failed to set global subscriber");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let args = Args::parse();
    init_tracing(&args.log_level);
    info!("kickbot starting");

    let db = Database::new(&args.database_url).await?;
    db.migrate().await?;

    let key = BASE64.decode(&args.master_key)?;
    let encryptor = Encryptor::new(&key)?;
    let http = reqwest::Client::new();

    let kick_vault = Arc::new(TokenVault::new(
        PostgresTokenRepository::new(db.pool().clone()),
        http.clone(),
        encryptor.clone(),
        OAuthClientConfig {
            token_endpoint: args.kick_token_endpoint.clone(),
            client_id: args.kick_client_id.clone(),
            client_secret: args.kick_client_secret.clone(),
        },
    ));
    let youtube_vault = Arc::new(TokenVault::new(
        PostgresTokenRepository::new(db.pool().clone()),
        http.clone(),
        encryptor.clone(),
        OAuthClientConfig {
            token_endpoint: args.youtube_token_endpoint.clone(),
            client_id: args.youtube_client_id.clone(),
            client_secret: args.youtube_client_secret.clone(),
        },
    ));

    let channel_repo: Arc<dyn ChannelRepository> =
        Arc::new(PostgresChannelRepository::new(db.pool().clone()));
    let notifier = TracingNotifier::default();

    let supervisor = Arc::new(ChannelSupervisor::new(StdDuration::from_secs(args.points_tick_seconds)));
    let event_bus = Arc::new(EventBus::new());

    // Scheduler::new only wires the default notify handler for
    // Stream/SocialPost/Reminder/ChannelUpdate/Other; Giveaway promotion needs
    // its own handler routed to GiveawayManager::activate. Automation has no
    // handler yet, there is no command-layer hook to route it through.
    let mut scheduler = Scheduler::new(
        PostgresScheduledEventRepository::new(db.pool().clone()),
        PostgresReminderRepository::new(db.pool().clone()),
        Arc::new(notifier.clone()),
    );
    let scheduler_giveaways = GiveawayManager::new(
        PostgresGiveawayRepository::new(db.pool().clone()),
        RequirementValidators::new(PostgresPointsRepository::new(db.pool().clone())),
        notifier.clone(),
    );
    scheduler.set_handler(
        EventType::Giveaway,
        Arc::new(GiveawayActivationHandler::new(Arc::new(scheduler_giveaways))) as Arc<dyn EventHandler>,
    );
    let scheduler = Arc::new(scheduler);
    let scheduler_tick = tokio::spawn({
        let scheduler = scheduler.clone();
        let period = StdDuration::from_secs(args.scheduler_tick_seconds);
        async move {
            let mut interval = tokio::time::interval(period);
            loop {
                interval.tick().await;
                if let Err(e) = scheduler.tick(None).await {
                    warn!(error = %e, "scheduler tick failed");
                }
            }
        }
    });

    let channels = channel_repo.list_active_channels().await?;
    info!(count = channels.len(), "activating channels");
    for channel in channels {
        let settings_kv = PostgresSettingsRepository::new(db.pool().clone())
            .list_settings(channel.id)
            .await
            .unwrap_or_default();
        let settings = ChannelSettings::from_kv(&settings_kv);

        let tick_period_seconds = args.points_tick_seconds as i64;
        let activation = match channel.platform {
            Platform::Kick => {
                activate_kick(&db, channel.id, &channel.external_id, kick_vault.clone(), channel_repo.clone(), notifier.clone(), event_bus.clone(), tick_period_seconds).await
            }
            Platform::Youtube => {
                activate_youtube(&db, channel.id, &channel.external_id, &settings, youtube_vault.clone(), channel_repo.clone(), notifier.clone(), event_bus.clone(), tick_period_seconds).await
            }
        };

        match activation {
            Ok((ingress, router)) => {
                if let Err(e) = supervisor.activate(channel.id, ingress, router).await {
                    error!(channel_id = %channel.id, error = %e, "channel activation failed");
                }
            }
            Err(e) => {
                error!(channel_id = %channel.id, error = %e, "failed to build channel runtime");
            }
        }
    }

    tokio::signal::ctrl_c().await?;
    info!("shutdown signal received, deactivating channels");
    scheduler_tick.abort();

    let active_channels = channel_repo.list_active_channels().await.unwrap_or_default();
    for channel in active_channels {
        supervisor.deactivate(channel.id).await;
    }

    info!("kickbot stopped");
    Ok(())
}

type Activation = (Box<dyn ChatIngress>, Arc<LiveChannelRouter>);

async fn activate_kick(
    db: &Database,
    channel_id: Uuid,
    chatroom_id: &str,
    vault: Arc<TokenVault<PostgresTokenRepository>>,
    channel_repo: Arc<dyn ChannelRepository>,
    notifier: TracingNotifier,
    event_bus: Arc<EventBus>,
    tick_period_seconds: i64,
) -> Result<Activation, Error> {
    let pool = db.pool().clone();
    let client: Arc<DynPlatformClient> = Arc::new(KickClient::new(reqwest::Client::new(), vault, channel_repo));
    let ingress = KickChatIngress::connect(channel_id, chatroom_id).await?;

    let dispatcher = CommandDispatcher::new(
        PostgresCommandRepository::new(pool.clone()),
        PostgresCommandUsageRepository::new(pool.clone()),
        client,
    );
    let points = PointsEngine::new(PostgresPointsRepository::new(pool.clone()));
    let rewards = RewardArbiter::new(PostgresRewardRepository::new(pool.clone()));
    let validators = RequirementValidators::new(PostgresPointsRepository::new(pool.clone()));
    let giveaways = GiveawayManager::new(PostgresGiveawayRepository::new(pool.clone()), validators, notifier);

    let router = Arc::new(LiveChannelRouter::new(
        channel_id,
        PostgresSettingsRepository::new(pool.clone()),
        PostgresRewardRepository::new(pool.clone()),
        dispatcher,
        points,
        rewards,
        giveaways,
        event_bus,
        tick_period_seconds,
    ));

    Ok((Box::new(ingress), router))
}

async fn activate_youtube(
    db: &Database,
    channel_id: Uuid,
    live_chat_id: &str,
    settings: &ChannelSettings,
    vault: Arc<TokenVault<PostgresTokenRepository>>,
    channel_repo: Arc<dyn ChannelRepository>,
    notifier: TracingNotifier,
    event_bus: Arc<EventBus>,
    tick_period_seconds: i64,
) -> Result<Activation, Error> {
    let pool = db.pool().clone();
    let client: Arc<DynPlatformClient> =
        Arc::new(YoutubeClient::new(reqwest::Client::new(), vault.clone(), channel_repo));
    let ingress = YoutubeChatIngress::start(
        channel_id,
        reqwest::Client::new(),
        vault,
        live_chat_id.to_string(),
        StdDuration::from_secs(settings.poll_interval_seconds),
    );

    let dispatcher = CommandDispatcher::new(
        PostgresCommandRepository::new(pool.clone()),
        PostgresCommandUsageRepository::new(pool.clone()),
        client,
    );
    let points = PointsEngine::new(PostgresPointsRepository::new(pool.clone()));
    let rewards = RewardArbiter::new(PostgresRewardRepository::new(pool.clone()));
    let validators = RequirementValidators::new(PostgresPointsRepository::new(pool.clone()));
    let giveaways = GiveawayManager::new(PostgresGiveawayRepository::new(pool.clone()), validators, notifier);

    let router = Arc::new(LiveChannelRouter::new(
        channel_id,
        PostgresSettingsRepository::new(pool.clone()),
        PostgresRewardRepository::new(pool.clone()),
        dispatcher,
        points,
        rewards,
        giveaways,
        event_bus,
        tick_period_seconds,
    ));

    Ok((Box::new(ingress), router))
}
