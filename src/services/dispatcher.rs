//! The single-writer command loop. One task owns `EngineState`
//! exclusively; it pops a command, mutates `Ledger`/`OrderBook`
//! synchronously (no `.await` touches state), and fires the resulting
//! audit records, response, and book snapshot onto unbounded channels
//! for three independent publisher tasks to drain. A slow or unavailable
//! Redis never stalls the next command (§5).

use std::collections::HashMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::mpsc;

use crate::ledger::Ledger;
use crate::metrics;
use crate::models::{Market, OrderKind, Symbol, UserId};
use crate::orderbook::OrderBook;
use crate::protocol::{
    AuditTransaction, BuyOrderData, CancelOrderData, CommandTag, CreateMarketData, EndMarketData,
    OnrampUsdData, RawEnvelope, ResponseEnvelope, SellOrderData, TransactionKind,
};
use crate::services::market_manager::{self, MarketMakerSeed};
use crate::services::matcher::{self, BuyOutcome, MatcherError};
use crate::transport::{ActionLogSink, CommandSource, ResponseSink, SnapshotSink};

/// Everything the dispatcher owns exclusively. No other task ever
/// touches `ledger` or `book`.
pub struct EngineState {
    pub ledger: Ledger,
    pub book: OrderBook,
    pub markets: HashMap<Symbol, Market>,
    pub market_maker: Option<MarketMakerSeed>,
}

impl EngineState {
    pub fn new(market_maker: Option<MarketMakerSeed>) -> Self {
        Self { ledger: Ledger::new(), book: OrderBook::new(), markets: HashMap::new(), market_maker }
    }
}

/// Outcome of handling one command: the response to publish, any audit
/// records generated, and the symbol whose book changed (if any), so the
/// caller knows what to snapshot.
pub struct Outcome {
    pub response: ResponseEnvelope,
    pub audits: Vec<AuditTransaction>,
    pub changed_symbol: Option<Symbol>,
}

fn ok(tag: CommandTag, key: impl Into<String>, data: serde_json::Value) -> ResponseEnvelope {
    ResponseEnvelope::ok(tag, key, data)
}

fn err(tag: CommandTag, key: impl Into<String>, error: impl ToString) -> ResponseEnvelope {
    ResponseEnvelope::err(tag, key, error)
}

fn handle_onramp(state: &mut EngineState, data: OnrampUsdData) -> Outcome {
    let user_id = UserId::new(data.user_id.clone());
    let result = state.ledger.deposit(&user_id, data.amount);
    let response = match result {
        Ok(()) => ok(CommandTag::OnrampUsd, data.user_id.clone(), serde_json::json!({ "amount": data.amount })),
        Err(e) => err(CommandTag::OnrampUsd, data.user_id.clone(), e),
    };
    let audits = if result.is_ok() {
        vec![AuditTransaction::new(user_id, None, TransactionKind::Deposit, data.amount, None, None, None)]
    } else {
        Vec::new()
    };
    Outcome { response, audits, changed_symbol: None }
}

fn handle_buy(state: &mut EngineState, data: BuyOrderData) -> Outcome {
    let symbol = Symbol::new(data.stock_symbol.clone());
    let user_id = UserId::new(data.user_id.clone());
    let Some(market) = state.markets.get(&symbol).cloned() else {
        return Outcome {
            response: err(CommandTag::BuyOrder, data.user_id.clone(), MatcherError::MarketNotActive),
            audits: Vec::new(),
            changed_symbol: None,
        };
    };

    let result = matcher::place_buy_order(
        &mut state.ledger, &mut state.book, &market, &user_id, &symbol,
        data.price, data.quantity, data.stock_type,
    );

    match result {
        Ok(outcome @ BuyOutcome::Matched { .. }) => {
            metrics::record_order_matched();
            let BuyOutcome::Matched { order_id, fills } = &outcome else { unreachable!() };
            let mut audits = Vec::with_capacity(fills.len() * 2);
            for fill in fills {
                match fill.kind {
                    OrderKind::Regular => metrics::record_swap_fill(),
                    OrderKind::Reverted => metrics::record_mint_fill(),
                }
                let amount = match fill.kind {
                    OrderKind::Regular => fill.qty * fill.price.to_decimal(),
                    OrderKind::Reverted => fill.qty * fill.price.raw_decimal(),
                };
                audits.push(AuditTransaction::new(
                    user_id.clone(), Some(symbol.clone()), TransactionKind::Bought,
                    amount, Some(fill.qty), Some(fill.price), Some(*order_id),
                ));
                audits.push(AuditTransaction::new(
                    fill.maker_user_id.clone(), Some(symbol.clone()), TransactionKind::Sold,
                    amount, Some(fill.qty), Some(fill.price), Some(fill.maker_order_id),
                ));
            }
            Outcome {
                response: ok(
                    CommandTag::BuyOrder, data.user_id,
                    serde_json::json!({ "orderId": order_id, "status": "MATCHED", "fills": fills.len() }),
                ),
                audits,
                changed_symbol: Some(symbol),
            }
        }
        Ok(BuyOutcome::Reverted { order_id }) => {
            metrics::record_order_reverted();
            Outcome {
                response: ok(
                    CommandTag::BuyOrder, data.user_id,
                    serde_json::json!({ "orderId": order_id, "status": "REVERTED" }),
                ),
                audits: Vec::new(),
                changed_symbol: Some(symbol),
            }
        }
        Err(e) => Outcome {
            response: err(CommandTag::BuyOrder, data.user_id, e),
            audits: Vec::new(),
            changed_symbol: None,
        },
    }
}

fn handle_sell(state: &mut EngineState, data: SellOrderData) -> Outcome {
    let symbol = Symbol::new(data.stock_symbol.clone());
    let user_id = UserId::new(data.user_id.clone());
    let result = matcher::place_sell_order(
        &mut state.ledger, &mut state.book, &user_id, &symbol, data.price, data.quantity, data.stock_type,
    );
    match result {
        Ok(order_id) => {
            metrics::record_order_submitted();
            Outcome {
                response: ok(
                    CommandTag::SellOrder, data.user_id,
                    serde_json::json!({ "orderId": order_id, "status": "RESTING" }),
                ),
                audits: Vec::new(),
                changed_symbol: Some(symbol),
            }
        }
        Err(e) => Outcome {
            response: err(CommandTag::SellOrder, data.user_id, e),
            audits: Vec::new(),
            changed_symbol: None,
        },
    }
}

fn handle_cancel(state: &mut EngineState, data: CancelOrderData) -> Outcome {
    let symbol = Symbol::new(data.stock_symbol.clone());
    let user_id = UserId::new(data.user_id.clone());
    let raw_price = (data.price * Decimal::from(100)).round().to_i64().unwrap_or(-1);
    let Ok(price) = crate::models::Price::from_raw(raw_price) else {
        return Outcome {
            response: err(CommandTag::CancelOrder, data.user_id.clone(), MatcherError::InvalidPrice),
            audits: Vec::new(),
            changed_symbol: None,
        };
    };
    let order_id = crate::models::OrderId(data.order_id);
    let result =
        matcher::cancel_order(&mut state.ledger, &mut state.book, &user_id, &symbol, data.stock_type, price, order_id);
    match result {
        Ok(()) => {
            metrics::record_order_cancelled();
            Outcome {
                response: ok(CommandTag::CancelOrder, data.user_id.clone(), serde_json::json!({ "orderId": order_id })),
                audits: vec![AuditTransaction::new(
                    user_id, Some(symbol), TransactionKind::Cancelled, Decimal::ZERO, None, Some(price), Some(order_id),
                )],
                changed_symbol: None,
            }
        }
        Err(e) => Outcome {
            response: err(CommandTag::CancelOrder, data.user_id, e),
            audits: Vec::new(),
            changed_symbol: None,
        },
    }
}

fn handle_create_market(state: &mut EngineState, data: CreateMarketData) -> Outcome {
    let symbol = Symbol::new(data.symbol.clone());
    let key = data.symbol.clone();
    let seed = state.market_maker.clone();
    let result = market_manager::create_market(&mut state.ledger, &mut state.book, data, seed.as_ref());
    match result {
        Ok(market) => {
            state.markets.insert(symbol.clone(), market.clone());
            metrics::set_active_markets(state.markets.values().filter(|m| m.is_active()).count() as i64);
            Outcome {
                response: ok(CommandTag::CreateMarket, key, serde_json::to_value(&market).unwrap()),
                audits: Vec::new(),
                changed_symbol: Some(symbol),
            }
        }
        Err(e) => Outcome { response: err(CommandTag::CreateMarket, key, e), audits: Vec::new(), changed_symbol: None },
    }
}

fn handle_end_market(state: &mut EngineState, data: EndMarketData) -> Outcome {
    let symbol = Symbol::new(data.stock_symbol.clone());
    let key = data.stock_symbol.clone();
    let Some(winning_side) = data.winning_side() else {
        return Outcome {
            response: err(CommandTag::EndMarket, key, "winningStock must be \"yes\" or \"no\""),
            audits: Vec::new(),
            changed_symbol: None,
        };
    };
    let Some(mut market) = state.markets.get(&symbol).cloned() else {
        return Outcome {
            response: err(CommandTag::EndMarket, key, MatcherError::MarketNotActive),
            audits: Vec::new(),
            changed_symbol: None,
        };
    };

    // Winning shares redeem at the raw price ceiling — 1000 per share,
    // matching the raw scale every lock/unlock in the matcher already
    // uses, so a winner's payout and a loser's wipeout are exact
    // complements of the same unit.
    let payout_per_share = Decimal::from(crate::models::price::RAW_PRICE_MAX);
    let result =
        market_manager::end_market(&mut state.ledger, &mut state.book, &mut market, &symbol, winning_side, payout_per_share);
    match result {
        Ok(outcome) => {
            state.markets.insert(symbol.clone(), market);
            metrics::record_market_settled();
            metrics::set_active_markets(state.markets.values().filter(|m| m.is_active()).count() as i64);
            Outcome {
                response: ok(
                    CommandTag::EndMarket, key,
                    serde_json::json!({ "payouts": outcome.payouts.len() }),
                ),
                audits: Vec::new(),
                changed_symbol: Some(symbol),
            }
        }
        Err(e) => Outcome { response: err(CommandTag::EndMarket, key, e), audits: Vec::new(), changed_symbol: None },
    }
}

fn handle_get_order_book(state: &EngineState, symbol_raw: String) -> Outcome {
    let symbol = Symbol::new(symbol_raw.clone());
    let snapshot = state.book.snapshot(&symbol);
    Outcome {
        response: ok(CommandTag::GetOrderBook, symbol_raw, serde_json::to_value(&snapshot).unwrap()),
        audits: Vec::new(),
        changed_symbol: None,
    }
}

fn handle_get_all_order_book(state: &EngineState) -> Outcome {
    let snapshot = state.book.snapshot_all();
    Outcome {
        response: ok(CommandTag::GetAllOrderBook, "*", serde_json::to_value(&snapshot).unwrap()),
        audits: Vec::new(),
        changed_symbol: None,
    }
}

/// Tags with no in-memory store to answer from: there is no per-order
/// index by id, nor a queryable transaction history, only the ledger and
/// the live book. Rather than fabricate one, these return a not-found
/// style error — the HTTP front-end that would serve these reads is out
/// of this engine's scope.
fn handle_unsupported_query(tag: CommandTag, key: impl Into<String>) -> Outcome {
    Outcome { response: err(tag, key, "not served by the matching engine"), audits: Vec::new(), changed_symbol: None }
}

/// Parses and handles exactly one inbound command, mutating `state` in
/// place. Returns `None` for an unparseable envelope or an unknown tag
/// (logged and skipped per §7), never for a command that parsed but
/// failed business-rule validation — that case still returns `Some`
/// with an `ERROR` response. Exposed beyond this module so scenario
/// tests can drive the dispatcher one command at a time and inspect
/// `EngineState` between steps.
pub fn dispatch(state: &mut EngineState, envelope: RawEnvelope) -> Option<Outcome> {
    let tag: CommandTag = envelope.tag.parse().ok()?;
    metrics::record_command_received(&envelope.tag);

    let outcome = match tag {
        CommandTag::OnrampUsd => {
            handle_onramp(state, serde_json::from_value(envelope.data).ok()?)
        }
        CommandTag::BuyOrder => handle_buy(state, serde_json::from_value(envelope.data).ok()?),
        CommandTag::SellOrder => handle_sell(state, serde_json::from_value(envelope.data).ok()?),
        CommandTag::CancelOrder => handle_cancel(state, serde_json::from_value(envelope.data).ok()?),
        CommandTag::CreateMarket => handle_create_market(state, serde_json::from_value(envelope.data).ok()?),
        CommandTag::EndMarket => handle_end_market(state, serde_json::from_value(envelope.data).ok()?),
        CommandTag::GetOrderBook => {
            let query: crate::protocol::StockQuery = serde_json::from_value(envelope.data).ok()?;
            handle_get_order_book(state, query.stock_symbol)
        }
        CommandTag::GetAllOrderBook => handle_get_all_order_book(state),
        CommandTag::Order => handle_unsupported_query(CommandTag::Order, "order"),
        CommandTag::User => handle_unsupported_query(CommandTag::User, "user"),
        CommandTag::Balance => handle_unsupported_query(CommandTag::Balance, "balance"),
        CommandTag::Stock => handle_unsupported_query(CommandTag::Stock, "stock"),
        CommandTag::Market => handle_unsupported_query(CommandTag::Market, "market"),
        CommandTag::Transaction => handle_unsupported_query(CommandTag::Transaction, "transaction"),
    };

    if matches!(outcome.response.status, "ERROR") {
        metrics::record_command_rejected(&envelope.tag);
    }
    state.ledger.assert_invariants();
    Some(outcome)
}

/// Runs the dispatcher loop until `source.recv()` returns an error.
/// Spawns the three publisher tasks and returns once the command source
/// is exhausted or fails; publisher tasks are dropped with it.
pub async fn run<C, A, R, S>(
    mut state: EngineState,
    mut source: C,
    action_log_sink: A,
    response_sink: R,
    snapshot_sink: S,
) -> anyhow::Result<()>
where
    C: CommandSource,
    A: ActionLogSink + Send + Sync + 'static,
    R: ResponseSink + Send + Sync + 'static,
    S: SnapshotSink + Send + Sync + 'static,
{
    let (audit_tx, mut audit_rx) = mpsc::unbounded_channel::<AuditTransaction>();
    let (response_tx, mut response_rx) = mpsc::unbounded_channel::<ResponseEnvelope>();
    let (snapshot_tx, mut snapshot_rx) = mpsc::unbounded_channel::<(Symbol, crate::orderbook::SymbolBook)>();

    tokio::spawn(async move {
        while let Some(tx) = audit_rx.recv().await {
            if let Err(e) = action_log_sink.publish(&tx).await {
                tracing::warn!(error = %e, "dropping action-log publish");
                metrics::record_publish_dropped("action_log");
            }
        }
    });
    tokio::spawn(async move {
        while let Some(resp) = response_rx.recv().await {
            if let Err(e) = response_sink.publish(&resp).await {
                tracing::warn!(error = %e, "dropping response publish");
                metrics::record_publish_dropped("response");
            }
        }
    });
    tokio::spawn(async move {
        while let Some((symbol, book)) = snapshot_rx.recv().await {
            if let Err(e) = snapshot_sink.publish(&symbol, &book).await {
                tracing::warn!(error = %e, "dropping snapshot publish");
                metrics::record_publish_dropped("snapshot");
            }
        }
    });

    loop {
        let Some(envelope) = source.recv().await? else {
            continue;
        };
        let tag = envelope.tag.clone();
        let start = std::time::Instant::now();

        let Some(outcome) = dispatch(&mut state, envelope) else {
            tracing::warn!(tag = %tag, "dropping unparseable or unknown command");
            continue;
        };

        metrics::record_command_dispatch_duration(&tag, start.elapsed().as_secs_f64());

        for audit in outcome.audits {
            let _ = audit_tx.send(audit);
        }
        let _ = response_tx.send(outcome.response);
        if let Some(symbol) = outcome.changed_symbol {
            if let Some(book) = state.book.snapshot(&symbol) {
                let _ = snapshot_tx.send((symbol, book));
            }
        }
    }
}
