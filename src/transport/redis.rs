//! Redis bindings for the transport seams: `BRPOP` across the inbound
//! command queues, `RPUSH` onto the two outbound queues, and `PUBLISH`
//! onto each symbol's fan-out channel.

use redis::aio::ConnectionManager;
use redis::AsyncCommands;

use crate::models::Symbol;
use crate::orderbook::SymbolBook;
use crate::protocol::{AuditTransaction, Envelope, RawEnvelope, ResponseEnvelope, ORDER_BOOK_UPDATE_TAG};

use super::{ActionLogSink, CommandSource, ResponseSink, SnapshotSink};

/// Blocks on `BRPOP` across every command queue named in the config.
/// A one-second timeout is used so `recv` returns `Ok(None)` periodically
/// rather than blocking the dispatcher loop forever.
pub struct RedisCommandSource {
    conn: ConnectionManager,
    queues: Vec<String>,
}

impl RedisCommandSource {
    pub fn new(conn: ConnectionManager, queues: Vec<String>) -> Self {
        Self { conn, queues }
    }
}

impl CommandSource for RedisCommandSource {
    async fn recv(&mut self) -> anyhow::Result<Option<RawEnvelope>> {
        let popped: Option<(String, String)> = self.conn.brpop(&self.queues, 1.0).await?;
        let Some((_queue, payload)) = popped else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&payload)?))
    }
}

pub struct RedisActionLogSink {
    conn: ConnectionManager,
    queue: String,
}

impl RedisActionLogSink {
    pub fn new(conn: ConnectionManager, queue: String) -> Self {
        Self { conn, queue }
    }
}

impl ActionLogSink for RedisActionLogSink {
    async fn publish(&self, tx: &AuditTransaction) -> anyhow::Result<()> {
        let envelope = Envelope { kind: "TRANSECTION".to_string(), data: tx };
        let payload = serde_json::to_string(&envelope)?;
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(&self.queue, payload).await?;
        Ok(())
    }
}

pub struct RedisResponseSink {
    conn: ConnectionManager,
    queue: String,
}

impl RedisResponseSink {
    pub fn new(conn: ConnectionManager, queue: String) -> Self {
        Self { conn, queue }
    }
}

impl ResponseSink for RedisResponseSink {
    async fn publish(&self, response: &ResponseEnvelope) -> anyhow::Result<()> {
        let payload = serde_json::to_string(response)?;
        let mut conn = self.conn.clone();
        let _: () = conn.rpush(&self.queue, payload).await?;
        Ok(())
    }
}

pub struct RedisSnapshotSink {
    conn: ConnectionManager,
}

impl RedisSnapshotSink {
    pub fn new(conn: ConnectionManager) -> Self {
        Self { conn }
    }

    fn channel(symbol: &Symbol) -> String {
        format!("orderbook:{symbol}")
    }
}

impl SnapshotSink for RedisSnapshotSink {
    async fn publish(&self, symbol: &Symbol, book: &SymbolBook) -> anyhow::Result<()> {
        let envelope = Envelope { kind: ORDER_BOOK_UPDATE_TAG.to_string(), data: book };
        let payload = serde_json::to_string(&envelope)?;
        let mut conn = self.conn.clone();
        let _: i64 = conn.publish(Self::channel(symbol), payload).await?;
        Ok(())
    }
}
