use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tracing::info;

use engine::config::Config;
use engine::dispatch::{Dispatcher, SendContext};
use engine::execution::CampaignService;
use engine::gateway::{HttpProviderGateway, MockGateway, ProviderGateway};
use engine::jobs::{AutomatedCampaignJob, JobScheduler, ScheduledCampaignJob};
use engine::limiter::ChannelLimiter;
use engine::logging;
use persistence::repositories::{
    PgAccountStore, PgCampaignStore, PgContactStore, PgCooldownStore, PgMessageStore,
    PgSchemaStore,
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    let config = Config::load()?;
    logging::init_logging(&config.logging);

    info!("Starting campaign engine v{}", env!("CARGO_PKG_VERSION"));

    let pool = persistence::db::create_pool(&config.database).await?;

    info!("Running database migrations...");
    sqlx::migrate!("../persistence/src/migrations")
        .run(&pool)
        .await?;
    info!("Migrations completed");

    let schemas = Arc::new(PgSchemaStore::new(pool.clone()));
    let contacts = Arc::new(PgContactStore::new(pool.clone()));
    let campaigns = Arc::new(PgCampaignStore::new(pool.clone()));
    let messages = Arc::new(PgMessageStore::new(pool.clone()));
    let cooldowns = Arc::new(PgCooldownStore::new(pool.clone()));
    let accounts = Arc::new(PgAccountStore::new(pool.clone()));

    let gateway: Arc<dyn ProviderGateway> = if config.provider.mock {
        info!("Provider mock mode enabled, no messages leave the engine");
        Arc::new(MockGateway::default())
    } else {
        Arc::new(HttpProviderGateway::new(
            config.provider.url.clone(),
            config.provider.api_key.clone(),
            Duration::from_secs(config.dispatch.unit_timeout_secs),
        )?)
    };

    let limiter = Arc::new(ChannelLimiter::new(
        Dispatcher::channel_rates(&config.dispatch),
        config.dispatch.sms_rate_per_second,
    ));

    let dispatcher = Arc::new(Dispatcher::new(
        campaigns.clone(),
        contacts.clone(),
        messages.clone(),
        cooldowns.clone(),
        accounts.clone(),
        gateway,
        limiter,
        config.dispatch.clone(),
    ));

    let service = Arc::new(CampaignService::new(
        schemas,
        contacts,
        campaigns.clone(),
        messages,
        cooldowns,
        accounts,
        dispatcher,
        config.dispatch.clone(),
    ));

    let ctx = if config.provider.mock {
        SendContext::mock()
    } else {
        SendContext::real()
    };

    let mut scheduler = JobScheduler::new();
    scheduler.register(AutomatedCampaignJob::new(
        campaigns.clone(),
        service.clone(),
        ctx,
        config.scheduler.automated_tick_minutes,
    ));
    scheduler.register(ScheduledCampaignJob::new(
        campaigns,
        service,
        ctx,
        config.scheduler.scheduled_tick_minutes,
    ));
    scheduler.start();

    info!("Campaign engine running, press Ctrl+C to stop");
    tokio::signal::ctrl_c().await?;

    scheduler.shutdown();
    scheduler
        .wait_for_shutdown(Duration::from_secs(config.scheduler.shutdown_timeout_secs))
        .await;

    Ok(())
}
