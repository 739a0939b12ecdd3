use redis::aio::ConnectionManager;
use rust_decimal::Decimal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use parity_exchange::config::AppConfig;
use parity_exchange::metrics;
use parity_exchange::models::UserId;
use parity_exchange::services::dispatcher::{self, EngineState};
use parity_exchange::services::market_manager::MarketMakerSeed;
use parity_exchange::transport::redis::{
    RedisActionLogSink, RedisCommandSource, RedisResponseSink, RedisSnapshotSink,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "parity_exchange=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    dotenvy::dotenv().ok();
    let config = AppConfig::load()?;

    tracing::info!("starting parity-exchange v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(environment = %config.environment, "loaded configuration");

    metrics::init_metrics(config.metrics_port)?;
    tracing::info!(port = config.metrics_port, "metrics listener started");

    let client = redis::Client::open(config.redis_url.as_str())?;
    let conn = ConnectionManager::new(client).await?;
    tracing::info!("connected to redis");

    let command_queues = vec![
        config.buy_order_queue.clone(),
        config.sell_order_queue.clone(),
        config.cancel_order_queue.clone(),
        config.create_market_queue.clone(),
        config.end_market_queue.clone(),
        config.onramp_queue.clone(),
    ];
    let source = RedisCommandSource::new(conn.clone(), command_queues);
    let action_log_sink = RedisActionLogSink::new(conn.clone(), config.db_actions_queue.clone());
    let response_sink = RedisResponseSink::new(conn.clone(), config.server_responses_queue.clone());
    let snapshot_sink = RedisSnapshotSink::new(conn);

    let market_maker = market_maker_seed_from_config(&config)?;
    if let Some(seed) = &market_maker {
        tracing::info!(user_id = %seed.user_id, quote_qty = %seed.quote_qty, "market-maker seeding enabled");
    }
    let state = EngineState::new(market_maker);

    dispatcher::run(state, source, action_log_sink, response_sink, snapshot_sink).await
}

/// `market_maker_user_id`/`market_maker_quote_qty` must both be set or
/// both be absent — partial configuration is a startup error rather than
/// a silent fallback to an unseeded market.
fn market_maker_seed_from_config(config: &AppConfig) -> anyhow::Result<Option<MarketMakerSeed>> {
    match (&config.market_maker_user_id, &config.market_maker_quote_qty) {
        (Some(user_id), Some(qty)) => {
            let quote_qty: Decimal = qty.parse()?;
            Ok(Some(MarketMakerSeed { user_id: UserId::new(user_id.clone()), quote_qty }))
        }
        (None, None) => Ok(None),
        _ => anyhow::bail!(
            "market_maker_user_id and market_maker_quote_qty must both be set or both be unset"
        ),
    }
}
