use crate::domain::decision::Decision;
use crate::domain::portfolio::{AccountState, PortfolioSnapshot, Position};
use crate::domain::signal::Action;
use crate::domain::trade::{Trade, TradeSide};
use chrono::Utc;

fn round(value: f64, places: i32) -> f64 {
    let factor = 10f64.powi(places);
    (value * factor).round() / factor
}

/// Deterministically replays an append-only trade log into an account
/// state, long-flat only, starting from `initial_balance`.
pub fn rebuild_account_state(trades: &[Trade], initial_balance: f64) -> AccountState {
    let mut state = AccountState {
        cash: initial_balance,
        ..Default::default()
    };
    let today = Utc::now().date_naive();

    for trade in trades {
        match trade.side {
            TradeSide::Buy => {
                let total_cost = trade.quantity * trade.price + trade.fee + trade.slippage;
                let new_qty = state.position_qty + trade.quantity;
                if new_qty > 0.0 {
                    state.avg_entry_price = (state.avg_entry_price * state.position_qty
                        + trade.price * trade.quantity)
                        / new_qty;
                }
                state.position_qty = new_qty;
                state.cash -= total_cost;
            }
            TradeSide::Sell => {
                let quantity = trade.quantity.min(state.position_qty);
                let proceeds = quantity * trade.price - trade.fee - trade.slippage;
                let trade_pnl = (trade.price - state.avg_entry_price) * quantity - trade.fee - trade.slippage;
                state.realized_pnl += trade_pnl;
                state.cash += proceeds;
                state.position_qty -= quantity;
                if state.position_qty <= 1e-12 {
                    state.position_qty = 0.0;
                    state.avg_entry_price = 0.0;
                }
                if trade.timestamp.date_naive() == today {
                    state.day_realized_pnl += trade_pnl;
                }
            }
        }
    }

    AccountState {
        cash: round(state.cash, 8),
        position_qty: round(state.position_qty, 8),
        avg_entry_price: round(state.avg_entry_price, 8),
        realized_pnl: round(state.realized_pnl, 8),
        day_realized_pnl: round(state.day_realized_pnl, 8),
    }
}

/// Projects an `AccountState` into a valued portfolio at `mark_price`.
pub fn portfolio_snapshot(state: &AccountState, symbol: &str, mark_price: f64, initial_balance: f64) -> PortfolioSnapshot {
    let unrealized_pnl = if state.position_qty > 0.0 && mark_price > 0.0 {
        (mark_price - state.avg_entry_price) * state.position_qty
    } else {
        0.0
    };
    let position_value = if mark_price > 0.0 {
        state.position_qty * mark_price
    } else {
        0.0
    };
    let equity = state.cash + position_value;
    let exposure_pct = if equity > 0.0 { position_value / equity * 100.0 } else { 0.0 };
    let daily_pnl_pct = if initial_balance > 0.0 {
        state.day_realized_pnl / initial_balance * 100.0
    } else {
        0.0
    };

    let positions = if state.position_qty > 0.0 {
        vec![Position {
            symbol: symbol.to_string(),
            side: "long".to_string(),
            quantity: round(state.position_qty, 8),
            entry_price: round(state.avg_entry_price, 2),
            mark_price: round(mark_price, 2),
            unrealized_pnl: round(unrealized_pnl, 2),
        }]
    } else {
        vec![]
    };

    PortfolioSnapshot {
        balance: round(state.cash, 2),
        equity: round(equity, 2),
        available: round(state.cash, 2),
        exposure_pct: round(exposure_pct, 2),
        daily_pnl_pct: round(daily_pnl_pct, 2),
        realized_pnl: round(state.realized_pnl, 2),
        positions,
    }
}

/// Result of executing one approved decision against the ledger.
pub struct ExecutionResult {
    pub executed_trade: Option<Trade>,
    pub portfolio_before: PortfolioSnapshot,
    pub portfolio_after: PortfolioSnapshot,
}

/// Applies an approved decision's action against the current trade log,
/// returning the (possibly none) trade it produced. Does not persist the
/// trade; the caller appends it to the log.
pub fn execute_decision(
    decision: &Decision,
    existing_trades: &[Trade],
    symbol: &str,
    market_price: f64,
    initial_balance: f64,
    trading_fee_pct: f64,
    slippage_pct: f64,
) -> ExecutionResult {
    let state = rebuild_account_state(existing_trades, initial_balance);
    let before = portfolio_snapshot(&state, symbol, market_price, initial_balance);
    let equity = before.equity;

    let mut executed_trade = None;

    match decision.action {
        Action::Buy => {
            let position_pct = decision.position_size_pct.max(0.0);
            let desired_notional = equity * (position_pct / 100.0);
            let buy_notional = desired_notional.min(state.cash);
            let execution_price = market_price * (1.0 + slippage_pct);
            let quantity = if execution_price > 0.0 {
                buy_notional / execution_price
            } else {
                0.0
            };
            if quantity > 0.0 {
                let fee = quantity * execution_price * trading_fee_pct;
                let slippage_cost = quantity * market_price * slippage_pct;
                executed_trade = Some(Trade {
                    id: None,
                    timestamp: Utc::now(),
                    symbol: symbol.to_string(),
                    side: TradeSide::Buy,
                    quantity,
                    price: execution_price,
                    fee,
                    slippage: slippage_cost,
                    pnl: 0.0,
                    notes: "executed_by_paper_engine".to_string(),
                });
            }
        }
        Action::Sell if state.position_qty > 0.0 => {
            let quantity = state.position_qty;
            let execution_price = market_price * (1.0 - slippage_pct);
            let fee = quantity * execution_price * trading_fee_pct;
            let slippage_cost = quantity * market_price * slippage_pct;
            let realized = (execution_price - state.avg_entry_price) * quantity - fee - slippage_cost;
            executed_trade = Some(Trade {
                id: None,
                timestamp: Utc::now(),
                symbol: symbol.to_string(),
                side: TradeSide::Sell,
                quantity,
                price: execution_price,
                fee,
                slippage: slippage_cost,
                pnl: realized,
                notes: "executed_by_paper_engine".to_string(),
            });
        }
        _ => {}
    }

    let mut trades_after = existing_trades.to_vec();
    if let Some(trade) = &executed_trade {
        trades_after.push(trade.clone());
    }
    let state_after = rebuild_account_state(&trades_after, initial_balance);
    let after = portfolio_snapshot(&state_after, symbol, market_price, initial_balance);

    ExecutionResult {
        executed_trade,
        portfolio_before: before,
        portfolio_after: after,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trade(side: TradeSide, quantity: f64, price: f64, fee: f64, slippage: f64, pnl: f64) -> Trade {
        Trade {
            id: None,
            timestamp: Utc::now(),
            symbol: "BTCUSDT".to_string(),
            side,
            quantity,
            price,
            fee,
            slippage,
            pnl,
            notes: String::new(),
        }
    }

    #[test]
    fn test_ledger_replay_is_deterministic() {
        let trades = vec![
            trade(TradeSide::Buy, 1.0, 3000.0, 3.0, 1.5, 0.0),
            trade(TradeSide::Sell, 1.0, 3100.0, 3.1, 1.55, 0.0),
        ];
        let first = rebuild_account_state(&trades, 10_000.0);
        let second = rebuild_account_state(&trades, 10_000.0);
        assert_eq!(first, second);
    }

    #[test]
    fn test_round_trip_monetary_conservation_at_flat_price() {
        let trades = vec![
            trade(TradeSide::Buy, 1.0, 3000.0, 3.0, 1.5, 0.0),
            trade(TradeSide::Sell, 1.0, 3000.0, 3.0, 1.5, 0.0),
        ];
        let state = rebuild_account_state(&trades, 10_000.0);
        let expected = -(3.0 + 1.5 + 3.0 + 1.5);
        assert!((state.realized_pnl - expected).abs() < 1e-6);
    }

    #[test]
    fn test_sell_clamped_to_position_qty_and_resets_avg_entry() {
        let trades = vec![
            trade(TradeSide::Buy, 1.0, 3000.0, 0.0, 0.0, 0.0),
            trade(TradeSide::Sell, 5.0, 3100.0, 0.0, 0.0, 0.0),
        ];
        let state = rebuild_account_state(&trades, 10_000.0);
        assert_eq!(state.position_qty, 0.0);
        assert_eq!(state.avg_entry_price, 0.0);
    }

    #[test]
    fn test_sell_with_no_position_is_a_noop_trade() {
        let decision = Decision {
            id: None,
            timestamp: Utc::now(),
            action: Action::Sell,
            position_size_pct: 0.0,
            entry_price: 245.0,
            stop_loss: 0.0,
            take_profit: 0.0,
            confidence: 0.5,
            reasoning: serde_json::json!({}),
            model_used: "deterministic-fallback".to_string(),
            input_hash: "h".to_string(),
        };
        let result = execute_decision(&decision, &[], "BTCUSDT", 245.0, 10_000.0, 0.001, 0.0005);
        assert!(result.executed_trade.is_none());
    }
}
