//! Queue/pub-sub transport seams. The dispatcher never talks to Redis
//! directly — it holds one of each of these three sink traits and a
//! command source, so tests can swap in the in-memory implementations
//! below and the engine logic never changes.

pub mod redis;

use crate::models::Symbol;
use crate::orderbook::SymbolBook;
use crate::protocol::{AuditTransaction, RawEnvelope, ResponseEnvelope};

/// Where inbound commands come from: a blocking pop across every named
/// command queue (§6). Returns `Ok(None)` on an idle timeout so the
/// dispatcher loop can check for shutdown between polls.
pub trait CommandSource {
    fn recv(&mut self) -> impl std::future::Future<Output = anyhow::Result<Option<RawEnvelope>>> + Send;
}

/// `DB_ACTIONS`: one `AuditTransaction` per cash- or share-moving event.
/// Best-effort — a publish failure is logged and counted, never
/// propagated to the caller (§7).
pub trait ActionLogSink {
    fn publish(&self, tx: &AuditTransaction) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// `SERVER_RESPONSES_QUEUE`: one response per inbound command, carrying
/// its correlation key.
pub trait ResponseSink {
    fn publish(&self, response: &ResponseEnvelope) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

/// Per-symbol `ORDER_BOOK_UPDATE` fan-out, published after every command
/// that can change a book's resting orders.
pub trait SnapshotSink {
    fn publish(
        &self,
        symbol: &Symbol,
        book: &SymbolBook,
    ) -> impl std::future::Future<Output = anyhow::Result<()>> + Send;
}

impl<T: ActionLogSink + Send + Sync> ActionLogSink for std::sync::Arc<T> {
    async fn publish(&self, tx: &AuditTransaction) -> anyhow::Result<()> {
        (**self).publish(tx).await
    }
}

impl<T: ResponseSink + Send + Sync> ResponseSink for std::sync::Arc<T> {
    async fn publish(&self, response: &ResponseEnvelope) -> anyhow::Result<()> {
        (**self).publish(response).await
    }
}

impl<T: SnapshotSink + Send + Sync> SnapshotSink for std::sync::Arc<T> {
    async fn publish(&self, symbol: &Symbol, book: &SymbolBook) -> anyhow::Result<()> {
        (**self).publish(symbol, book).await
    }
}

/// In-memory sinks for tests: every publish is appended to a `Mutex`-
/// guarded `Vec` instead of leaving the process.
pub mod inmemory {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    pub struct RecordingActionLogSink {
        pub published: Mutex<Vec<AuditTransaction>>,
    }

    impl ActionLogSink for RecordingActionLogSink {
        async fn publish(&self, tx: &AuditTransaction) -> anyhow::Result<()> {
            self.published.lock().unwrap().push(tx.clone());
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingResponseSink {
        pub published: Mutex<Vec<ResponseEnvelope>>,
    }

    impl ResponseSink for RecordingResponseSink {
        async fn publish(&self, response: &ResponseEnvelope) -> anyhow::Result<()> {
            self.published.lock().unwrap().push(response.clone());
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    pub struct RecordingSnapshotSink {
        pub published: Mutex<Vec<(Symbol, SymbolBook)>>,
    }

    impl SnapshotSink for RecordingSnapshotSink {
        async fn publish(&self, symbol: &Symbol, book: &SymbolBook) -> anyhow::Result<()> {
            self.published.lock().unwrap().push((symbol.clone(), book.clone()));
            Ok(())
        }
    }
}
