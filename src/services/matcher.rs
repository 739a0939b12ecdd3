//! Buy/sell placement, same-side crossing, and cancellation.
//!
//! The matcher owns no state of its own — every function here takes the
//! `Ledger` and `OrderBook` it needs to mutate and composes their closed
//! primitive sets. Cash amounts come in two scales depending on the path:
//! a **swap** (crossing a REGULAR ask) moves cash at the internal price
//! (`Price::to_decimal`), matching the match round-trip law in the
//! testable-properties section. A **mint** (crossing a REVERTED ask) moves
//! cash at the raw-price scale (`Price::raw_decimal`), matching the mint
//! round-trip law, which spells out the `×100` explicitly for both legs.
//! A reverted order's own lock uses that same raw scale, and cancel's
//! unlock undoes it at the identical scale — all three are the same unit.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::ledger::{Ledger, LedgerError};
use crate::models::{Market, OrderId, OrderKind, Price, Side, Symbol, UserId};
use crate::orderbook::{OrderBook, OrderBookError, RestingOrder};

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum MatcherError {
    #[error("price outside [0, 1000]")]
    InvalidPrice,
    #[error("quantity must be positive")]
    InvalidQuantity,
    #[error("no cash account for user")]
    UnknownUser,
    #[error("insufficient funds")]
    InsufficientFunds,
    #[error("no share position for user")]
    NoPosition,
    #[error("insufficient shares")]
    InsufficientShares,
    #[error("market is not active")]
    MarketNotActive,
    #[error("order not found")]
    NotFound,
    #[error("user does not own this order")]
    NotOwner,
}

impl From<LedgerError> for MatcherError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidAmount => MatcherError::InvalidQuantity,
            LedgerError::UnknownUser => MatcherError::UnknownUser,
            LedgerError::InsufficientFunds => MatcherError::InsufficientFunds,
            LedgerError::NoPosition => MatcherError::NoPosition,
            LedgerError::InsufficientShares => MatcherError::InsufficientShares,
        }
    }
}

impl From<OrderBookError> for MatcherError {
    fn from(_: OrderBookError) -> Self {
        MatcherError::NotFound
    }
}

/// One leg consumed while filling a buy against the book.
#[derive(Debug, Clone)]
pub struct Fill {
    pub maker_order_id: OrderId,
    pub maker_user_id: UserId,
    pub kind: OrderKind,
    pub qty: Decimal,
    pub price: Price,
}

#[derive(Debug, Clone)]
pub enum BuyOutcome {
    /// The requested quantity crossed the book in full; nothing rests.
    Matched { order_id: OrderId, fills: Vec<Fill> },
    /// No eligible level existed (or it didn't hold enough quantity); the
    /// order was parked as a REVERTED ask on the opposite side.
    Reverted { order_id: OrderId },
}

/// Debits `amount` from `user`'s free balance by locking then immediately
/// consuming it. `Ledger` has no direct "debit balance" primitive — every
/// mutation is one of its named primitives, so an unconditional balance
/// debit is expressed as this pair.
fn debit_balance(ledger: &mut Ledger, user: &UserId, amount: Decimal) -> Result<(), LedgerError> {
    ledger.lock_cash(user, amount)?;
    ledger.debit_locked(user, amount)
}

pub fn place_buy_order(
    ledger: &mut Ledger,
    book: &mut OrderBook,
    market: &Market,
    user_id: &UserId,
    symbol: &Symbol,
    raw_price: i64,
    qty: Decimal,
    side: Side,
) -> Result<BuyOutcome, MatcherError> {
    if !market.is_active() {
        return Err(MatcherError::MarketNotActive);
    }
    let price = Price::from_raw(raw_price).map_err(|_| MatcherError::InvalidPrice)?;
    if qty <= Decimal::ZERO {
        return Err(MatcherError::InvalidQuantity);
    }
    let account = ledger.cash_account(user_id).ok_or(MatcherError::UnknownUser)?;
    let worst_case_cost = qty * price.raw_decimal();
    if account.balance < worst_case_cost {
        return Err(MatcherError::InsufficientFunds);
    }

    let opp_side = side.opposite();
    let complement_price = price.complement();

    if book.level_total_qty(symbol, side, price) >= qty {
        let mut remaining = qty;
        let mut fills = Vec::with_capacity(1);
        for (ask_id, ask) in book.orders_at(symbol, side, price) {
            if remaining <= Decimal::ZERO {
                break;
            }
            let avail = remaining.min(ask.qty);
            match ask.kind {
                OrderKind::Regular => fill_swap(ledger, user_id, &ask, symbol, side, price, avail)?,
                OrderKind::Reverted => {
                    fill_mint(ledger, user_id, &ask, symbol, side, opp_side, price, avail)?
                }
            }
            book.decrement(symbol, side, price, ask_id, avail)?;
            fills.push(Fill {
                maker_order_id: ask_id,
                maker_user_id: ask.user_id.clone(),
                kind: ask.kind,
                qty: avail,
                price,
            });
            remaining -= avail;
        }
        debug_assert!(remaining <= Decimal::ZERO, "all-or-nothing gate should guarantee a full fill");
        let order_id = OrderId::new();
        Ok(BuyOutcome::Matched { order_id, fills })
    } else {
        ledger.lock_cash(user_id, qty * price.raw_decimal())?;
        let order_id = OrderId::new();
        book.insert(symbol, opp_side, complement_price, order_id, user_id.clone(), qty, OrderKind::Reverted);
        Ok(BuyOutcome::Reverted { order_id })
    }
}

/// Transfer `avail` shares from the resting seller's locked position to
/// the buyer's free quantity; cash moves at the internal price.
fn fill_swap(
    ledger: &mut Ledger,
    buyer: &UserId,
    ask: &RestingOrder,
    symbol: &Symbol,
    side: Side,
    price: Price,
    avail: Decimal,
) -> Result<(), MatcherError> {
    ledger.debit_locked_shares(&ask.user_id, symbol, side, avail)?;
    ledger.credit_shares(buyer, symbol, side, avail)?;
    let amount = avail * price.to_decimal();
    debit_balance(ledger, buyer, amount)?;
    ledger.credit_cash(&ask.user_id, amount)?;
    Ok(())
}

/// Mint a new pair of complementary shares: the reverted ask's locked
/// cash and the buyer's free cash both leave the system, at the raw-price
/// scale each side originally committed to.
fn fill_mint(
    ledger: &mut Ledger,
    buyer: &UserId,
    ask: &RestingOrder,
    symbol: &Symbol,
    side: Side,
    opp_side: Side,
    price: Price,
    avail: Decimal,
) -> Result<(), MatcherError> {
    ledger.credit_shares(buyer, symbol, side, avail)?;
    ledger.credit_shares(&ask.user_id, symbol, opp_side, avail)?;
    debit_balance(ledger, buyer, avail * price.raw_decimal())?;
    ledger.debit_locked(&ask.user_id, avail * price.complement().raw_decimal())?;
    Ok(())
}

pub fn place_sell_order(
    ledger: &mut Ledger,
    book: &mut OrderBook,
    user_id: &UserId,
    symbol: &Symbol,
    raw_price: i64,
    qty: Decimal,
    side: Side,
) -> Result<OrderId, MatcherError> {
    let price = Price::from_raw(raw_price).map_err(|_| MatcherError::InvalidPrice)?;
    if qty <= Decimal::ZERO {
        return Err(MatcherError::InvalidQuantity);
    }
    ledger.lock_shares(user_id, symbol, side, qty)?;
    let order_id = OrderId::new();
    book.insert(symbol, side, price, order_id, user_id.clone(), qty, OrderKind::Regular);
    Ok(order_id)
}

pub fn cancel_order(
    ledger: &mut Ledger,
    book: &mut OrderBook,
    user_id: &UserId,
    symbol: &Symbol,
    side: Side,
    price: Price,
    order_id: OrderId,
) -> Result<(), MatcherError> {
    let resting = book
        .orders_at(symbol, side, price)
        .into_iter()
        .find(|(id, _)| *id == order_id)
        .ok_or(MatcherError::NotFound)?
        .1;
    if &resting.user_id != user_id {
        return Err(MatcherError::NotOwner);
    }
    refund_resting_order(ledger, symbol, side, price, &resting)?;
    book.remove(symbol, side, price, order_id)?;
    Ok(())
}

/// Releases whatever a resting order has committed — locked cash for a
/// REVERTED ask, locked shares for a REGULAR one — without touching the
/// book. Shared by `cancel_order` and `end_market`'s cascading refund.
pub fn refund_resting_order(
    ledger: &mut Ledger,
    symbol: &Symbol,
    side: Side,
    price: Price,
    resting: &RestingOrder,
) -> Result<(), MatcherError> {
    match resting.kind {
        OrderKind::Reverted => {
            // `price` is where the order rests now (the complementary
            // price booked at placement time); the amount originally
            // locked was sized off the order's own price, so recovering
            // it means complementing back before scaling to raw.
            let amount = resting.qty * price.complement().raw_decimal();
            ledger.unlock_cash(&resting.user_id, amount)?;
        }
        OrderKind::Regular => {
            ledger.unlock_shares(&resting.user_id, symbol, side, resting.qty)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MarketKind;
    use rust_decimal_macros::dec;

    fn market(symbol: &Symbol) -> Market {
        Market::new(symbol.clone(), "will it rain".into(), "weather".into(), MarketKind::Manual)
    }

    fn setup() -> (Ledger, OrderBook, Market, Symbol) {
        let symbol = Symbol::new("RAIN-2026");
        (Ledger::new(), OrderBook::new(), market(&symbol), symbol)
    }

    #[test]
    fn sell_then_buy_swaps_at_internal_price() {
        let (mut ledger, mut book, market, symbol) = setup();
        let seller = UserId::new("seller");
        let buyer = UserId::new("buyer");
        ledger.deposit(&seller, dec!(10000)).unwrap();
        ledger.deposit(&buyer, dec!(10000)).unwrap();
        ledger.credit_shares(&seller, &symbol, Side::Yes, dec!(10)).unwrap();

        place_sell_order(&mut ledger, &mut book, &seller, &symbol, 60, dec!(10), Side::Yes).unwrap();
        let outcome =
            place_buy_order(&mut ledger, &mut book, &market, &buyer, &symbol, 60, dec!(10), Side::Yes)
                .unwrap();

        assert!(matches!(outcome, BuyOutcome::Matched { .. }));
        assert_eq!(ledger.cash_account(&buyer).unwrap().balance, dec!(9994));
        assert_eq!(ledger.cash_account(&seller).unwrap().balance, dec!(10006));
        assert_eq!(ledger.position(&buyer, &symbol, Side::Yes).unwrap().quantity, dec!(10));
        assert_eq!(ledger.position(&seller, &symbol, Side::Yes).unwrap().locked, dec!(0));
        assert_eq!(book.level_total_qty(&symbol, Side::Yes, Price::from_raw(60).unwrap()), dec!(0));
    }

    #[test]
    fn buy_with_empty_book_reverts_and_locks_at_raw_scale() {
        let (mut ledger, mut book, market, symbol) = setup();
        let buyer = UserId::new("buyer");
        ledger.deposit(&buyer, dec!(10000)).unwrap();

        let outcome =
            place_buy_order(&mut ledger, &mut book, &market, &buyer, &symbol, 60, dec!(10), Side::Yes)
                .unwrap();

        assert!(matches!(outcome, BuyOutcome::Reverted { .. }));
        let acct = ledger.cash_account(&buyer).unwrap();
        assert_eq!(acct.locked, dec!(600));
        assert_eq!(acct.balance, dec!(9400));
        let resting = book.orders_at(&symbol, Side::No, Price::from_raw(940).unwrap());
        assert_eq!(resting.len(), 1);
        assert_eq!(resting[0].1.kind, OrderKind::Reverted);
    }

    #[test]
    fn opposite_side_buy_mints_against_reverted_ask_and_drains_lock() {
        let (mut ledger, mut book, market, symbol) = setup();
        let a = UserId::new("a");
        let b = UserId::new("b");
        ledger.deposit(&a, dec!(10000)).unwrap();
        ledger.deposit(&b, dec!(10000)).unwrap();

        place_buy_order(&mut ledger, &mut book, &market, &a, &symbol, 600, dec!(10), Side::Yes).unwrap();
        let outcome =
            place_buy_order(&mut ledger, &mut book, &market, &b, &symbol, 400, dec!(10), Side::No)
                .unwrap();

        assert!(matches!(outcome, BuyOutcome::Matched { .. }));
        assert_eq!(ledger.position(&a, &symbol, Side::Yes).unwrap().quantity, dec!(10));
        assert_eq!(ledger.position(&b, &symbol, Side::No).unwrap().quantity, dec!(10));
        let a_acct = ledger.cash_account(&a).unwrap();
        assert_eq!(a_acct.locked, dec!(0));
        assert_eq!(a_acct.balance, dec!(4000));
        let b_acct = ledger.cash_account(&b).unwrap();
        assert_eq!(b_acct.balance, dec!(6000));
        assert!(book.orders_at(&symbol, Side::No, Price::from_raw(400).unwrap()).is_empty());
    }

    #[test]
    fn cancel_reverted_order_is_an_exact_round_trip() {
        let (mut ledger, mut book, market, symbol) = setup();
        let buyer = UserId::new("buyer");
        ledger.deposit(&buyer, dec!(10000)).unwrap();

        let order_id = match place_buy_order(
            &mut ledger, &mut book, &market, &buyer, &symbol, 70, dec!(20), Side::Yes,
        )
        .unwrap()
        {
            BuyOutcome::Reverted { order_id } => order_id,
            _ => panic!("expected a reverted order"),
        };

        cancel_order(
            &mut ledger,
            &mut book,
            &buyer,
            &symbol,
            Side::No,
            Price::from_raw(930).unwrap(),
            order_id,
        )
        .unwrap();

        let acct = ledger.cash_account(&buyer).unwrap();
        assert_eq!(acct.balance, dec!(10000));
        assert_eq!(acct.locked, dec!(0));
        assert!(book.orders_at(&symbol, Side::No, Price::from_raw(930).unwrap()).is_empty());
    }

    #[test]
    fn cancel_twice_returns_not_found_the_second_time() {
        let (mut ledger, mut book, market, symbol) = setup();
        let buyer = UserId::new("buyer");
        ledger.deposit(&buyer, dec!(10000)).unwrap();
        let order_id = match place_buy_order(
            &mut ledger, &mut book, &market, &buyer, &symbol, 70, dec!(20), Side::Yes,
        )
        .unwrap()
        {
            BuyOutcome::Reverted { order_id } => order_id,
            _ => panic!("expected a reverted order"),
        };
        let args = (Side::No, Price::from_raw(930).unwrap(), order_id);
        cancel_order(&mut ledger, &mut book, &buyer, &symbol, args.0, args.1, args.2).unwrap();
        assert_eq!(
            cancel_order(&mut ledger, &mut book, &buyer, &symbol, args.0, args.1, args.2),
            Err(MatcherError::NotFound)
        );
    }

    #[test]
    fn insufficient_funds_leaves_state_untouched() {
        let (mut ledger, mut book, market, symbol) = setup();
        let buyer = UserId::new("buyer");
        ledger.deposit(&buyer, dec!(50)).unwrap();
        let result =
            place_buy_order(&mut ledger, &mut book, &market, &buyer, &symbol, 60, dec!(10), Side::Yes);
        assert_eq!(result.unwrap_err(), MatcherError::InsufficientFunds);
        assert_eq!(ledger.cash_account(&buyer).unwrap().balance, dec!(50));
    }

    #[test]
    fn sell_requires_existing_free_shares() {
        let (mut ledger, mut book, _market, symbol) = setup();
        let seller = UserId::new("seller");
        let result =
            place_sell_order(&mut ledger, &mut book, &seller, &symbol, 60, dec!(10), Side::Yes);
        assert_eq!(result.unwrap_err(), MatcherError::NoPosition);
    }
}
