use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::{OrderId, Symbol, UserId};
use super::price::Price;

/// One half of a complementary binary contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Yes,
    No,
}

impl Side {
    /// The other side of the same contract.
    pub fn opposite(&self) -> Side {
        match self {
            Side::Yes => Side::No,
            Side::No => Side::Yes,
        }
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Side::Yes => write!(f, "yes"),
            Side::No => write!(f, "no"),
        }
    }
}

/// Tag carried by a resting book entry. Immutable once an order is
/// inserted — a REGULAR ask never becomes REVERTED or vice versa.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderKind {
    /// A live ask backed by shares the seller already held.
    Regular,
    /// A buy that failed to cross, parked as a synthetic ask on the
    /// opposite side at the complementary price, backed by locked cash.
    Reverted,
}

/// Lifecycle state of an audited order. Not stored on the live book
/// entry — the book stores `OrderKind` instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderStatus {
    Pending,
    Completed,
    Cancelled,
}

/// Audit-only direction tag; the matcher dispatches on this once, at
/// placement, and never stores it in the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderDirection {
    Buy,
    Sell,
}

/// The audited order record, distinct from the live book entry. Written
/// to the persistence log on placement and on every status transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub symbol: Symbol,
    pub side: Side,
    pub direction: OrderDirection,
    pub price: Price,
    pub quantity: rust_decimal::Decimal,
    pub filled_quantity: rust_decimal::Decimal,
    pub status: OrderStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        user_id: UserId,
        symbol: Symbol,
        side: Side,
        direction: OrderDirection,
        price: Price,
        quantity: rust_decimal::Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: OrderId::new(),
            user_id,
            symbol,
            side,
            direction,
            price,
            quantity,
            filled_quantity: rust_decimal::Decimal::ZERO,
            status: OrderStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn side_opposite_is_involutive() {
        assert_eq!(Side::Yes.opposite(), Side::No);
        assert_eq!(Side::No.opposite().opposite(), Side::No);
    }

    #[test]
    fn side_serializes_lowercase() {
        let json = serde_json::to_string(&Side::Yes).unwrap();
        assert_eq!(json, "\"yes\"");
    }
}
