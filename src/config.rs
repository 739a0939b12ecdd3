//! Process configuration, loaded from the environment (and an optional
//! `.env` file) via the `config` crate.

use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub environment: String,

    /// Connection string for the Redis instance backing the three named
    /// queues and the per-symbol pub/sub topics.
    pub redis_url: String,

    /// Health/metrics HTTP listen port — the dispatcher itself has no
    /// inbound HTTP surface, this is Prometheus-scrape only.
    pub metrics_port: u16,

    pub buy_order_queue: String,
    pub sell_order_queue: String,
    pub cancel_order_queue: String,
    pub create_market_queue: String,
    pub end_market_queue: String,
    pub onramp_queue: String,

    pub server_responses_queue: String,
    pub db_actions_queue: String,

    /// User id credited with the seeded market-maker quotes on every
    /// newly created market. Omit to create markets with an empty book.
    pub market_maker_user_id: Option<String>,
    pub market_maker_quote_qty: Option<String>,
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .set_default("environment", "development")?
            .set_default("redis_url", "redis://127.0.0.1:6379")?
            .set_default("metrics_port", 9100)?
            .set_default("buy_order_queue", "BUY_ORDER_QUEUE")?
            .set_default("sell_order_queue", "SELL_ORDER_QUEUE")?
            .set_default("cancel_order_queue", "CANCEL_ORDER_QUEUE")?
            .set_default("create_market_queue", "CREATE_MARKET_QUEUE")?
            .set_default("end_market_queue", "END_MARKET_QUEUE")?
            .set_default("onramp_queue", "ONRAMP_QUEUE")?
            .set_default("server_responses_queue", "SERVER_RESPONSES_QUEUE")?
            .set_default("db_actions_queue", "DB_ACTIONS")?
            .add_source(config::Environment::default().separator("__"))
            .build()?;

        Ok(config.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_falls_back_to_defaults_with_no_environment_set() {
        let config = AppConfig::load().unwrap();
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.db_actions_queue, "DB_ACTIONS");
    }
}
