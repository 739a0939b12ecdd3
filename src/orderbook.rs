use std::collections::{BTreeMap, HashMap};

use rust_decimal::Decimal;
use serde::Serialize;
use thiserror::Error;

use crate::models::{OrderId, OrderKind, Price, Side, Symbol, UserId};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum OrderBookError {
    #[error("no book for symbol")]
    UnknownSymbol,
    #[error("no price level at that price")]
    UnknownLevel,
    #[error("no order with that id at that level")]
    UnknownOrder,
}

/// One bucket of resting asks at a single price. `total_qty` is kept in
/// sync with the sum of every order's quantity by `insert` and `remove`
/// (full recomputation) and by `decrement` (direct delta) — see the
/// module docs on why those two strategies coexist.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PriceLevel {
    pub total_qty: Decimal,
    #[serde(skip)]
    pub(crate) orders: HashMap<OrderId, RestingOrder>,
}

/// The full resting-order record kept inside a `PriceLevel`.
#[derive(Debug, Clone)]
pub struct RestingOrder {
    pub user_id: UserId,
    pub qty: Decimal,
    pub kind: OrderKind,
}

impl PriceLevel {
    fn recompute_total(&mut self) {
        self.total_qty = self.orders.values().map(|o| o.qty).sum();
    }
}

pub type SideBook = BTreeMap<Price, PriceLevel>;

/// The order book for both sides of one symbol.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SymbolBook {
    pub yes: SideBook,
    pub no: SideBook,
}

impl SymbolBook {
    fn side(&self, side: Side) -> &SideBook {
        match side {
            Side::Yes => &self.yes,
            Side::No => &self.no,
        }
    }

    fn side_mut(&mut self, side: Side) -> &mut SideBook {
        match side {
            Side::Yes => &mut self.yes,
            Side::No => &mut self.no,
        }
    }
}

/// Owner of every symbol's order book. Exclusively mutated by the
/// dispatcher thread through the methods below; external observers only
/// ever see a `snapshot`.
#[derive(Debug, Default)]
pub struct OrderBook {
    books: HashMap<Symbol, SymbolBook>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ensures a (possibly empty) book exists for `symbol`, e.g. at
    /// market creation.
    pub fn ensure_symbol(&mut self, symbol: &Symbol) {
        self.books.entry(symbol.clone()).or_default();
    }

    pub fn discard_symbol(&mut self, symbol: &Symbol) {
        self.books.remove(symbol);
    }

    /// Total resting quantity at `price` on `side`, or zero if no such
    /// level exists. Used by the matcher's all-or-nothing gate.
    pub fn level_total_qty(&self, symbol: &Symbol, side: Side, price: Price) -> Decimal {
        self.books
            .get(symbol)
            .and_then(|book| book.side(side).get(&price))
            .map(|level| level.total_qty)
            .unwrap_or(Decimal::ZERO)
    }

    /// A snapshot of the resting orders at `price` on `side`, in
    /// whatever order the underlying map yields them — no price-time
    /// priority is implied or required. Empty if the level doesn't
    /// exist. The matcher iterates this list to decide how to fill,
    /// then calls `decrement` per order as it consumes quantity.
    pub fn orders_at(&self, symbol: &Symbol, side: Side, price: Price) -> Vec<(OrderId, RestingOrder)> {
        self.books
            .get(symbol)
            .and_then(|book| book.side(side).get(&price))
            .map(|level| level.orders.iter().map(|(id, o)| (*id, o.clone())).collect())
            .unwrap_or_default()
    }

    /// Inserts or replaces an order at (symbol, side, price). Idempotent
    /// on `order_id`: re-inserting the same id updates its quantity in
    /// place. `total_qty` is always recomputed from scratch afterwards.
    pub fn insert(
        &mut self,
        symbol: &Symbol,
        side: Side,
        price: Price,
        order_id: OrderId,
        user_id: UserId,
        qty: Decimal,
        kind: OrderKind,
    ) {
        let book = self.books.entry(symbol.clone()).or_default();
        let level = book.side_mut(side).entry(price).or_default();
        level.orders.insert(order_id, RestingOrder { user_id, qty, kind });
        level.recompute_total();
    }

    /// Removes `order_id` from (symbol, side, price); deletes the level
    /// if it becomes empty.
    pub fn remove(
        &mut self,
        symbol: &Symbol,
        side: Side,
        price: Price,
        order_id: OrderId,
    ) -> Result<RestingOrder, OrderBookError> {
        let book = self.books.get_mut(symbol).ok_or(OrderBookError::UnknownSymbol)?;
        let side_book = book.side_mut(side);
        let level = side_book.get_mut(&price).ok_or(OrderBookError::UnknownLevel)?;
        let removed = level.orders.remove(&order_id).ok_or(OrderBookError::UnknownOrder)?;
        level.recompute_total();
        if level.orders.is_empty() {
            side_book.remove(&price);
        }
        Ok(removed)
    }

    /// Subtracts `delta` from `order_id`'s quantity and from the level's
    /// `total_qty` directly (no full recomputation). Deletes the order
    /// once its quantity reaches zero, then the level if it is then
    /// empty.
    pub fn decrement(
        &mut self,
        symbol: &Symbol,
        side: Side,
        price: Price,
        order_id: OrderId,
        delta: Decimal,
    ) -> Result<(), OrderBookError> {
        let book = self.books.get_mut(symbol).ok_or(OrderBookError::UnknownSymbol)?;
        let side_book = book.side_mut(side);
        let level = side_book.get_mut(&price).ok_or(OrderBookError::UnknownLevel)?;
        let order = level.orders.get_mut(&order_id).ok_or(OrderBookError::UnknownOrder)?;
        order.qty -= delta;
        level.total_qty -= delta;
        if order.qty <= Decimal::ZERO {
            level.orders.remove(&order_id);
        }
        if level.orders.is_empty() {
            side_book.remove(&price);
        }
        Ok(())
    }

    /// Every resting order for `symbol`, across both sides and every
    /// price level, used by `end_market`'s cascading refund.
    pub fn all_orders_for_symbol(
        &self,
        symbol: &Symbol,
    ) -> Vec<(Side, Price, OrderId, RestingOrder)> {
        let Some(book) = self.books.get(symbol) else {
            return Vec::new();
        };
        let mut out = Vec::new();
        for (side, side_book) in [(Side::Yes, &book.yes), (Side::No, &book.no)] {
            for (price, level) in side_book.iter() {
                for (id, order) in level.orders.iter() {
                    out.push((side, *price, *id, order.clone()));
                }
            }
        }
        out
    }

    /// Deep-copied snapshot of one symbol's book, for publication.
    pub fn snapshot(&self, symbol: &Symbol) -> Option<SymbolBook> {
        self.books.get(symbol).cloned()
    }

    /// Deep-copied snapshot of every symbol's book.
    pub fn snapshot_all(&self) -> HashMap<Symbol, SymbolBook> {
        self.books.clone()
    }
}
