//! Wire envelope, command tags, and per-command payloads exchanged over
//! the three named queues and per-symbol pub/sub topics (§6). Two
//! historical misspellings are preserved at the wire-tag level only:
//! `CommandTag::CancelOrder` serializes as `CANCLE_ORDER`, and
//! `TransactionKind::Cancelled` serializes as `CANCLE`.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{CreateMarketRequest, MarketId, OrderId, Price, Side, Symbol, UserId};

/// The envelope every queue message and pub/sub payload is wrapped in:
/// `{"type": <tag>, "data": <opaque JSON>}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    #[serde(rename = "type")]
    pub kind: String,
    pub data: T,
}

/// An inbound envelope before its `data` payload is known to be any
/// particular shape — the dispatcher reads `tag` first to decide how to
/// parse `data`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawEnvelope {
    #[serde(rename = "type")]
    pub tag: String,
    pub data: serde_json::Value,
}

/// The closed set of inbound command tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CommandTag {
    Order,
    User,
    Balance,
    Stock,
    Transaction,
    Market,
    CreateMarket,
    OnrampUsd,
    BuyOrder,
    SellOrder,
    #[serde(rename = "CANCLE_ORDER")]
    CancelOrder,
    EndMarket,
    GetOrderBook,
    GetAllOrderBook,
}

impl std::str::FromStr for CommandTag {
    type Err = serde_json::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        serde_json::from_value(serde_json::Value::String(s.to_string()))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyOrderData {
    pub user_id: String,
    pub stock_symbol: String,
    pub quantity: Decimal,
    pub price: i64,
    pub stock_type: Side,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SellOrderData {
    pub user_id: String,
    pub stock_symbol: String,
    pub quantity: Decimal,
    pub price: i64,
    pub stock_type: Side,
}

/// `price` is the *internal* price the order is booked at, not the raw
/// integer — see §4.3's Cancel section.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelOrderData {
    pub user_id: String,
    pub stock_symbol: String,
    pub order_id: Uuid,
    pub stock_type: Side,
    pub price: Decimal,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnrampUsdData {
    pub user_id: String,
    pub amount: Decimal,
}

/// `winning_stock` is case-insensitive ("yes"/"Yes"/"YES" all valid),
/// unlike the lowercase-only `Side` wire format elsewhere.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EndMarketData {
    pub stock_symbol: String,
    pub market_id: MarketId,
    pub winning_stock: String,
}

impl EndMarketData {
    pub fn winning_side(&self) -> Option<Side> {
        match self.winning_stock.to_ascii_lowercase().as_str() {
            "yes" => Some(Side::Yes),
            "no" => Some(Side::No),
            _ => None,
        }
    }
}

pub type CreateMarketData = CreateMarketRequest;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserQuery {
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockQuery {
    pub stock_symbol: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderQuery {
    pub order_id: Uuid,
}

/// A response envelope published on `SERVER_RESPONSES_QUEUE`. Carries at
/// minimum the correlation key the HTTP front-end used to register its
/// waiter (§4.5) and either `data` or `error`, never both.
#[derive(Debug, Clone, Serialize)]
pub struct ResponseEnvelope {
    #[serde(rename = "type")]
    pub tag: CommandTag,
    pub correlation_key: String,
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ResponseEnvelope {
    pub fn ok(tag: CommandTag, correlation_key: impl Into<String>, data: serde_json::Value) -> Self {
        Self { tag, correlation_key: correlation_key.into(), status: "OK", data: Some(data), error: None }
    }

    pub fn err(tag: CommandTag, correlation_key: impl Into<String>, error: impl ToString) -> Self {
        Self {
            tag,
            correlation_key: correlation_key.into(),
            status: "ERROR",
            data: None,
            error: Some(error.to_string()),
        }
    }
}

/// Tag used on the per-symbol fan-out topic only; not part of the
/// inbound `CommandTag` closed set.
pub const ORDER_BOOK_UPDATE_TAG: &str = "ORDER_BOOK_UPDATE";

/// Direction tags for the audit transaction log. `Cancelled` preserves
/// the source's `CANCLE` misspelling on the wire only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionKind {
    Deposit,
    Bought,
    Sold,
    #[serde(rename = "CANCLE")]
    Cancelled,
}

/// Persisted to `DB_ACTIONS` (wrapped in an `Envelope` tagged
/// `TRANSECTION`) on every cash- or share-moving event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditTransaction {
    pub id: Uuid,
    pub user_id: UserId,
    pub symbol: Option<Symbol>,
    pub kind: TransactionKind,
    pub amount: Decimal,
    pub quantity: Option<Decimal>,
    pub price: Option<Price>,
    pub related_order_id: Option<OrderId>,
    pub created_at: DateTime<Utc>,
}

impl AuditTransaction {
    pub fn new(
        user_id: UserId,
        symbol: Option<Symbol>,
        kind: TransactionKind,
        amount: Decimal,
        quantity: Option<Decimal>,
        price: Option<Price>,
        related_order_id: Option<OrderId>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id,
            symbol,
            kind,
            amount,
            quantity,
            price,
            related_order_id,
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_order_tag_preserves_the_wire_misspelling() {
        let json = serde_json::to_string(&CommandTag::CancelOrder).unwrap();
        assert_eq!(json, "\"CANCLE_ORDER\"");
        let parsed: CommandTag = serde_json::from_str("\"CANCLE_ORDER\"").unwrap();
        assert_eq!(parsed, CommandTag::CancelOrder);
    }

    #[test]
    fn other_tags_use_the_regular_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&CommandTag::BuyOrder).unwrap(), "\"BUY_ORDER\"");
        assert_eq!(serde_json::to_string(&CommandTag::GetAllOrderBook).unwrap(), "\"GET_ALL_ORDER_BOOK\"");
    }

    #[test]
    fn transaction_kind_cancelled_is_spelled_cancle_on_the_wire() {
        assert_eq!(serde_json::to_string(&TransactionKind::Cancelled).unwrap(), "\"CANCLE\"");
    }

    #[test]
    fn winning_stock_is_case_insensitive() {
        let data = EndMarketData {
            stock_symbol: "RAIN-2026".into(),
            market_id: MarketId::new(),
            winning_stock: "YES".into(),
        };
        assert_eq!(data.winning_side(), Some(Side::Yes));
    }

    #[test]
    fn raw_envelope_defers_payload_parsing() {
        let raw: RawEnvelope = serde_json::from_str(r#"{"type":"BUY_ORDER","data":{"foo":1}}"#).unwrap();
        assert_eq!(raw.tag, "BUY_ORDER");
    }
}
