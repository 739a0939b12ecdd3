//! Market lifecycle: creation (with optional market-maker seeding) and
//! settlement.

use rust_decimal::Decimal;

use crate::ledger::Ledger;
use crate::models::{CreateMarketRequest, Market, MarketKind, Side, Symbol, UserId};
use crate::orderbook::OrderBook;
use crate::services::matcher::{self, MatcherError};

/// Parameters for how a newly created market is seeded with liquidity.
/// `None` creates a bare market with no resting quotes.
#[derive(Debug, Clone)]
pub struct MarketMakerSeed {
    pub user_id: UserId,
    pub quote_qty: Decimal,
}

/// Raw price at which the market-maker quotes YES; NO is seeded at its
/// complement, per §4.4.
const MARKET_MAKER_YES_RAW_PRICE: i64 = 600;

pub fn create_market(
    ledger: &mut Ledger,
    book: &mut OrderBook,
    req: CreateMarketRequest,
    seed: Option<&MarketMakerSeed>,
) -> Result<Market, MatcherError> {
    let symbol = Symbol::new(&req.symbol);
    let market = Market::new(symbol.clone(), req.heading, req.event_type, req.market_type);
    book.ensure_symbol(&symbol);

    if let Some(seed) = seed {
        seed_market_maker(ledger, book, &symbol, seed)?;
    }

    Ok(market)
}

fn seed_market_maker(
    ledger: &mut Ledger,
    book: &mut OrderBook,
    symbol: &Symbol,
    seed: &MarketMakerSeed,
) -> Result<(), MatcherError> {
    ledger.credit_shares(&seed.user_id, symbol, Side::Yes, seed.quote_qty)?;
    ledger.credit_shares(&seed.user_id, symbol, Side::No, seed.quote_qty)?;
    matcher::place_sell_order(
        ledger,
        book,
        &seed.user_id,
        symbol,
        MARKET_MAKER_YES_RAW_PRICE,
        seed.quote_qty,
        Side::Yes,
    )?;
    matcher::place_sell_order(
        ledger,
        book,
        &seed.user_id,
        symbol,
        1000 - MARKET_MAKER_YES_RAW_PRICE,
        seed.quote_qty,
        Side::No,
    )?;
    Ok(())
}

/// Outcome of `end_market`, enough for the dispatcher to build payout
/// audit records without re-deriving anything.
#[derive(Debug, Clone)]
pub struct Payout {
    pub user_id: UserId,
    pub amount: Decimal,
}

#[derive(Debug, Clone)]
pub struct EndMarketOutcome {
    pub payouts: Vec<Payout>,
}

/// Settles `symbol` in one atomic step: pays out winning positions,
/// clears every position, refunds every resting order, and discards the
/// book. The caller must hold exclusive access to `ledger`/`book` for the
/// whole call — no other command may interleave.
pub fn end_market(
    ledger: &mut Ledger,
    book: &mut OrderBook,
    market: &mut Market,
    symbol: &Symbol,
    winning_side: Side,
    payout_per_share: Decimal,
) -> Result<EndMarketOutcome, MatcherError> {
    market.status = crate::models::MarketStatus::Completed;

    let mut payouts = Vec::new();
    for (user_id, side, position) in ledger.positions_for_symbol(symbol) {
        if side == winning_side && position.quantity > Decimal::ZERO {
            let amount = position.quantity * payout_per_share;
            ledger.credit_cash(&user_id, amount)?;
            payouts.push(Payout { user_id, amount });
        }
    }

    // Refund every resting order while its backing position still
    // exists, then wipe positions outright — same end state as clearing
    // first, but a REGULAR refund's `unlock_shares` needs the position
    // in place to run.
    for (side, price, _order_id, resting) in book.all_orders_for_symbol(symbol) {
        matcher::refund_resting_order(ledger, symbol, side, price, &resting)?;
    }
    ledger.clear_positions_for_symbol(symbol);
    book.discard_symbol(symbol);

    Ok(EndMarketOutcome { payouts })
}
