//! End-to-end scenario coverage against the dispatcher's single-command
//! entry point, in-process and with no Redis behind it. Dollar amounts
//! below are internal-price swaps (`qty * raw / 100`); mint amounts are
//! raw-scale (`qty * raw`) — see `DESIGN.md`'s price-scale note for why
//! a mint's two legs are sized differently than a swap's.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use parity_exchange::models::{Market, MarketKind, Symbol, UserId};
use parity_exchange::protocol::CommandTag;
use parity_exchange::services::dispatcher::{dispatch, EngineState};

fn raw(tag: CommandTag, data: serde_json::Value) -> parity_exchange::protocol::RawEnvelope {
    let tag = serde_json::to_value(tag).unwrap().as_str().unwrap().to_string();
    parity_exchange::protocol::RawEnvelope { tag, data }
}

fn onramp(state: &mut EngineState, user: &str, amount: Decimal) {
    let outcome = dispatch(
        state,
        raw(CommandTag::OnrampUsd, serde_json::json!({ "userId": user, "amount": amount })),
    )
    .unwrap();
    assert_eq!(outcome.response.status, "OK");
}

fn new_market(state: &mut EngineState, symbol: &str) {
    state.markets.insert(
        Symbol::new(symbol),
        Market::new(Symbol::new(symbol), "heading".into(), "event".into(), MarketKind::Manual),
    );
}

fn buy(state: &mut EngineState, user: &str, symbol: &str, qty: Decimal, raw_price: i64) -> serde_json::Value {
    let outcome = dispatch(
        state,
        raw(
            CommandTag::BuyOrder,
            serde_json::json!({ "userId": user, "stockSymbol": symbol, "quantity": qty, "price": raw_price, "stockType": "yes" }),
        ),
    )
    .unwrap();
    assert_eq!(outcome.response.status, "OK", "{:?}", outcome.response.error);
    outcome.response.data.unwrap()
}

fn buy_side(
    state: &mut EngineState,
    user: &str,
    symbol: &str,
    qty: Decimal,
    raw_price: i64,
    side: &str,
) -> parity_exchange::services::dispatcher::Outcome {
    dispatch(
        state,
        raw(
            CommandTag::BuyOrder,
            serde_json::json!({ "userId": user, "stockSymbol": symbol, "quantity": qty, "price": raw_price, "stockType": side }),
        ),
    )
    .unwrap()
}

fn sell(state: &mut EngineState, user: &str, symbol: &str, qty: Decimal, raw_price: i64) {
    let outcome = dispatch(
        state,
        raw(
            CommandTag::SellOrder,
            serde_json::json!({ "userId": user, "stockSymbol": symbol, "quantity": qty, "price": raw_price, "stockType": "yes" }),
        ),
    )
    .unwrap();
    assert_eq!(outcome.response.status, "OK", "{:?}", outcome.response.error);
}

/// Scenario 1 — Match: a resting sell crossed in full by an incoming buy
/// settles both sides at the internal price (raw / 100).
#[test]
fn scenario_match_settles_both_legs_at_the_internal_price() {
    let mut state = EngineState::new(None);
    new_market(&mut state, "RAIN-2026");
    onramp(&mut state, "u0", dec!(10000));
    onramp(&mut state, "u1", dec!(10000));
    // A REGULAR ask must be backed by shares the seller already holds;
    // seed u1 with the 10 YES it's about to sell (as if acquired by an
    // earlier mint, which this scenario isn't concerned with).
    state
        .ledger
        .credit_shares(&UserId::new("u1"), &Symbol::new("RAIN-2026"), parity_exchange::models::Side::Yes, dec!(10))
        .unwrap();

    sell(&mut state, "u1", "RAIN-2026", dec!(10), 60);
    buy(&mut state, "u0", "RAIN-2026", dec!(10), 60);

    let u0 = UserId::new("u0");
    let u1 = UserId::new("u1");
    let symbol = Symbol::new("RAIN-2026");
    assert_eq!(state.ledger.cash_account(&u0).unwrap().balance, dec!(9994));
    assert_eq!(
        state.ledger.position(&u0, &symbol, parity_exchange::models::Side::Yes).unwrap().quantity,
        dec!(10)
    );
    assert_eq!(state.ledger.cash_account(&u1).unwrap().balance, dec!(10006));
    assert_eq!(
        state.ledger.position(&u1, &symbol, parity_exchange::models::Side::Yes).unwrap().quantity,
        dec!(0)
    );
    assert!(state.book.snapshot(&symbol).unwrap().yes.is_empty());
}

/// Scenario 2 — Mint: a buy with nothing to cross parks a reverted ask
/// on the opposite side at the complementary raw price, and a second
/// buy crossing that reverted ask mints a fresh complementary pair.
#[test]
fn scenario_mint_parks_a_reverted_ask_and_a_crossing_buy_mints_a_pair() {
    let mut state = EngineState::new(None);
    new_market(&mut state, "RAIN-2026");
    onramp(&mut state, "u0", dec!(10000));
    onramp(&mut state, "u1", dec!(10000));

    let data = buy(&mut state, "u0", "RAIN-2026", dec!(10), 60);
    assert_eq!(data["status"], "REVERTED");

    let u0 = UserId::new("u0");
    let symbol = Symbol::new("RAIN-2026");
    assert_eq!(state.ledger.cash_account(&u0).unwrap().locked, dec!(600));
    assert_eq!(state.ledger.cash_account(&u0).unwrap().balance, dec!(9400));

    let book = state.book.snapshot(&symbol).unwrap();
    let no_level = book.no.get(&parity_exchange::models::Price::from_raw(940).unwrap()).unwrap();
    assert_eq!(no_level.total_qty, dec!(10));

    let outcome = buy_side(&mut state, "u1", "RAIN-2026", dec!(10), 940, "no");
    assert_eq!(outcome.response.status, "OK");

    let u1 = UserId::new("u1");
    assert_eq!(
        state.ledger.position(&u0, &symbol, parity_exchange::models::Side::Yes).unwrap().quantity,
        dec!(10)
    );
    assert_eq!(
        state.ledger.position(&u1, &symbol, parity_exchange::models::Side::No).unwrap().quantity,
        dec!(10)
    );
    assert_eq!(state.ledger.cash_account(&u0).unwrap(), &parity_exchange::ledger::CashAccount { balance: dec!(9400), locked: dec!(0) });
    assert_eq!(state.ledger.cash_account(&u1).unwrap().balance, dec!(600));
}

/// Scenario 3 — Cancel round-trip: a reverted buy's cash returns exactly
/// to its pre-place value, and the book returns empty.
#[test]
fn scenario_cancel_reverted_buy_restores_cash_and_empties_the_book() {
    let mut state = EngineState::new(None);
    new_market(&mut state, "RAIN-2026");
    onramp(&mut state, "u0", dec!(10000));

    let data = buy(&mut state, "u0", "RAIN-2026", dec!(20), 70);
    assert_eq!(data["status"], "REVERTED");
    let order_id = data["orderId"].as_str().unwrap().to_string();

    let u0 = UserId::new("u0");
    let symbol = Symbol::new("RAIN-2026");
    assert_eq!(state.ledger.cash_account(&u0).unwrap().locked, dec!(1400));

    let outcome = dispatch(
        &mut state,
        raw(
            CommandTag::CancelOrder,
            serde_json::json!({
                "userId": "u0", "stockSymbol": "RAIN-2026", "orderId": order_id,
                "stockType": "no", "price": dec!(9.30),
            }),
        ),
    )
    .unwrap();
    assert_eq!(outcome.response.status, "OK", "{:?}", outcome.response.error);

    assert_eq!(state.ledger.cash_account(&u0).unwrap(), &parity_exchange::ledger::CashAccount { balance: dec!(10000), locked: dec!(0) });
    assert!(state.book.snapshot(&symbol).unwrap().no.is_empty());
}

/// Scenario 4 — End market: winners are paid at the raw price ceiling,
/// losers are untouched, and every position and resting order for the
/// symbol is gone afterward.
#[test]
fn scenario_end_market_pays_winners_and_clears_the_symbol() {
    let mut state = EngineState::new(None);
    new_market(&mut state, "RAIN-2026");
    onramp(&mut state, "winner", dec!(10000));
    onramp(&mut state, "loser", dec!(10000));

    // Seed positions directly the way a completed match/mint would have
    // left them; the scenario only cares about settlement, not how the
    // shares were acquired.
    let symbol = Symbol::new("RAIN-2026");
    let winner = UserId::new("winner");
    let loser = UserId::new("loser");
    state.ledger.credit_shares(&winner, &symbol, parity_exchange::models::Side::Yes, dec!(5)).unwrap();
    state.ledger.credit_shares(&loser, &symbol, parity_exchange::models::Side::No, dec!(3)).unwrap();

    let market_id = state.markets.get(&symbol).unwrap().id;
    let outcome = dispatch(
        &mut state,
        raw(
            CommandTag::EndMarket,
            serde_json::json!({ "stockSymbol": "RAIN-2026", "marketId": market_id, "winningStock": "yes" }),
        ),
    )
    .unwrap();
    assert_eq!(outcome.response.status, "OK", "{:?}", outcome.response.error);

    assert_eq!(state.ledger.cash_account(&winner).unwrap().balance, dec!(15000));
    assert_eq!(state.ledger.cash_account(&loser).unwrap().balance, dec!(10000));
    assert!(state.ledger.position(&winner, &symbol, parity_exchange::models::Side::Yes).is_none());
    assert!(state.ledger.position(&loser, &symbol, parity_exchange::models::Side::No).is_none());
    assert!(state.book.snapshot(&symbol).is_none());
    assert_eq!(state.markets.get(&symbol).unwrap().status, parity_exchange::models::MarketStatus::Completed);
}

/// Scenario 5 — Insufficient funds: a buy costing more than the user's
/// free balance is rejected with no state change.
#[test]
fn scenario_insufficient_funds_rejects_without_mutating_state() {
    let mut state = EngineState::new(None);
    new_market(&mut state, "RAIN-2026");
    onramp(&mut state, "u0", dec!(50));

    let outcome = buy_side(&mut state, "u0", "RAIN-2026", dec!(10), 60, "yes");
    assert_eq!(outcome.response.status, "ERROR");

    let u0 = UserId::new("u0");
    assert_eq!(state.ledger.cash_account(&u0).unwrap(), &parity_exchange::ledger::CashAccount { balance: dec!(50), locked: dec!(0) });
}

/// Scenario 6 — Double cancel: the first cancel succeeds, the second
/// returns NOT_FOUND rather than panicking.
#[test]
fn scenario_double_cancel_is_not_found_the_second_time() {
    let mut state = EngineState::new(None);
    new_market(&mut state, "RAIN-2026");
    onramp(&mut state, "u0", dec!(10000));
    let data = buy(&mut state, "u0", "RAIN-2026", dec!(20), 70);
    let order_id = data["orderId"].as_str().unwrap().to_string();

    let cancel = |state: &mut EngineState| {
        dispatch(
            state,
            raw(
                CommandTag::CancelOrder,
                serde_json::json!({
                    "userId": "u0", "stockSymbol": "RAIN-2026", "orderId": order_id.clone(),
                    "stockType": "no", "price": dec!(9.30),
                }),
            ),
        )
        .unwrap()
    };

    assert_eq!(cancel(&mut state).response.status, "OK");
    let second = cancel(&mut state);
    assert_eq!(second.response.status, "ERROR");
    assert_eq!(second.response.error.unwrap(), "order not found");
}
