use serde::{Deserialize, Serialize};

use super::ids::{MarketId, Symbol};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MarketStatus {
    Active,
    Completed,
}

/// Whether a market resolves itself from a polled source of truth or
/// waits for a manual `END_MARKET` command. The automatic scheduler that
/// would act on this tag is an external collaborator; the engine only
/// carries the tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketKind {
    Automatic,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Market {
    pub id: MarketId,
    pub symbol: Symbol,
    pub status: MarketStatus,
    pub heading: String,
    pub event_type: String,
    pub kind: MarketKind,
}

impl Market {
    pub fn new(symbol: Symbol, heading: String, event_type: String, kind: MarketKind) -> Self {
        Self {
            id: MarketId::new(),
            symbol,
            status: MarketStatus::Active,
            heading,
            event_type,
            kind,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, MarketStatus::Active)
    }
}

/// Parameters accepted by `create_market`. Fields beyond `symbol`,
/// `heading`, `event_type`, and `market_type` (`ends_in`,
/// `source_of_truth`, `end_after_time`, `repeat_event_time`) describe how
/// the out-of-scope automatic scheduler would later resolve the market;
/// the engine stores none of them beyond this request, since settlement
/// always arrives as an explicit `END_MARKET` command.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMarketRequest {
    pub symbol: String,
    pub market_type: MarketKind,
    pub heading: String,
    pub event_type: String,
    #[serde(default)]
    pub ends_in: Option<String>,
    #[serde(default)]
    pub source_of_truth: Option<String>,
    #[serde(default)]
    pub end_after_time: Option<String>,
    #[serde(default)]
    pub repeat_event_time: Option<String>,
}
