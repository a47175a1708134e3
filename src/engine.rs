use crate::config::{BotConfig, ConfigError};
use crate::models::*;
use crate::orders::{OrderError, OrderExecutor};
use crate::performance::{PerformanceCalculator, SessionSnapshot};
use crate::strategy::{create_strategy, Strategy};
use crate::strategy_utils::{is_warmup_hold, meets_confidence_threshold, MIN_CONFIDENCE};
use crate::trading_rules::{drawdown_percent, RiskManager};
use chrono::{DateTime, NaiveDate, Utc};
use log::{debug, info, warn};
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RiskLimit {
    DailyLoss,
    Drawdown,
}

/// Why a bar produced no (further) action. None of these are fatal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum SkipReason {
    OutOfOrderBar {
        index: usize,
        last_index: Option<usize>,
    },
    InvalidPrice(f64),
    InsufficientHistory,
    InactionableSignal,
    LowConfidenceSignal {
        confidence: f64,
    },
    SignalRejected,
    RiskLimitBreached(RiskLimit),
    InvalidSizing,
    InsufficientBalance {
        required: f64,
        available: f64,
    },
    UnknownOrder(String),
    NoOpenPosition,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::OutOfOrderBar { .. } => "out_of_order_bar",
            SkipReason::InvalidPrice(_) => "invalid_price",
            SkipReason::InsufficientHistory => "insufficient_history",
            SkipReason::InactionableSignal => "inactionable_signal",
            SkipReason::LowConfidenceSignal { .. } => "low_confidence_signal",
            SkipReason::SignalRejected => "signal_rejected",
            SkipReason::RiskLimitBreached(RiskLimit::DailyLoss) => "daily_loss_limit",
            SkipReason::RiskLimitBreached(RiskLimit::Drawdown) => "drawdown_limit",
            SkipReason::InvalidSizing => "invalid_sizing",
            SkipReason::InsufficientBalance { .. } => "insufficient_balance",
            SkipReason::UnknownOrder(_) => "unknown_order",
            SkipReason::NoOpenPosition => "no_open_position",
        }
    }
}

impl From<OrderError> for SkipReason {
    fn from(err: OrderError) -> Self {
        match err {
            OrderError::UnknownOrder(id) | OrderError::NotPending { id, .. } => {
                SkipReason::UnknownOrder(id)
            }
        }
    }
}

/// What happened on one call to [`TradingEngine::process_candle`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BarOutcome {
    pub index: usize,
    pub action: Option<SignalAction>,
    pub opened_trade: Option<String>,
    pub closed_trades: Vec<String>,
    pub skip: Option<SkipReason>,
    pub equity: f64,
}

impl BarOutcome {
    fn new(index: usize) -> Self {
        Self {
            index,
            action: None,
            opened_trade: None,
            closed_trades: Vec::new(),
            skip: None,
            equity: 0.0,
        }
    }

    fn ignored(index: usize, reason: SkipReason, equity: f64) -> Self {
        Self {
            skip: Some(reason),
            equity,
            ..Self::new(index)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub session_id: Uuid,
    pub strategy: String,
    pub bars_processed: usize,
    pub entries: usize,
    pub exits: usize,
    pub skips: BTreeMap<String, usize>,
}

/// One paper-trading session over a single instrument.
pub struct TradingEngine {
    config: BotConfig,
    session_id: Uuid,
    strategy: Box<dyn Strategy + Send>,
    risk_manager: RiskManager,
    executor: OrderExecutor,
    balance: f64,
    equity: f64,
    peak_equity: f64,
    worst_drawdown_percent: f64,
    open_trades: Vec<Trade>,
    closed_trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
    trade_counter: u64,
    current_day: Option<NaiveDate>,
    daily_trades: Vec<Trade>,
    daily_pnl: f64,
    last_index: Option<usize>,
}

impl TradingEngine {
    pub fn new(config: BotConfig, strategy: Box<dyn Strategy + Send>) -> Result<Self, ConfigError> {
        config.validate()?;

        let session_id = Uuid::new_v4();
        info!(
            "Session {} started: strategy={} symbol={} balance={:.2}",
            session_id,
            strategy.name(),
            config.symbol,
            config.account_size
        );

        Ok(Self {
            risk_manager: RiskManager::new(&config),
            executor: OrderExecutor::new(&config),
            balance: config.account_size,
            equity: config.account_size,
            peak_equity: config.account_size,
            worst_drawdown_percent: 0.0,
            open_trades: Vec::new(),
            closed_trades: Vec::new(),
            equity_curve: Vec::new(),
            trade_counter: 0,
            current_day: None,
            daily_trades: Vec::new(),
            daily_pnl: 0.0,
            last_index: None,
            session_id,
            strategy,
            config,
        })
    }

    /// Builds the engine with the strategy named in the config.
    pub fn from_config(config: BotConfig) -> Result<Self, ConfigError> {
        let strategy = create_strategy(config.strategy, &config);
        Self::new(config, strategy)
    }

    /// Advances the session by one bar: exits first, then the strategy's signal,
    /// then equity is marked at `price`.
    pub fn process_candle(&mut self, candles: &[Candle], index: usize, price: f64) -> BarOutcome {
        if index >= candles.len() || self.last_index.is_some_and(|last| index <= last) {
            warn!(
                "[{}] Ignoring bar {} (last processed {:?}, {} candles)",
                self.session_id,
                index,
                self.last_index,
                candles.len()
            );
            let reason = SkipReason::OutOfOrderBar {
                index,
                last_index: self.last_index,
            };
            return BarOutcome::ignored(index, reason, self.equity);
        }
        if !price.is_finite() || price <= 0.0 {
            warn!("[{}] Ignoring bar {} with price {}", self.session_id, index, price);
            return BarOutcome::ignored(index, SkipReason::InvalidPrice(price), self.equity);
        }

        self.last_index = Some(index);
        let time = candles[index].date;
        self.roll_trading_day(time.date_naive());

        let mut outcome = BarOutcome::new(index);
        outcome.closed_trades = self.check_open_trades(price, time);

        let signal = self.strategy.generate_signal(candles, index);
        outcome.action = Some(signal.action);

        if !self.strategy.validate_signal(&signal, self.balance) {
            outcome.skip = Some(self.classify_rejection(&signal, index));
        } else {
            info!(
                "[{}] {} signal at bar {} ({:.2}): {}",
                self.session_id,
                signal.action.as_str(),
                index,
                signal.confidence,
                signal.reason
            );
            match signal.action {
                SignalAction::Buy => match self.execute_buy_signal(candles, index, price, time) {
                    Ok(trade_id) => outcome.opened_trade = Some(trade_id),
                    Err(reason) => outcome.skip = Some(reason),
                },
                SignalAction::Sell => {
                    let closed = self.execute_sell_signal(price, time);
                    if closed.is_empty() {
                        outcome.skip = Some(SkipReason::NoOpenPosition);
                    }
                    outcome.closed_trades.extend(closed);
                }
                SignalAction::Hold => outcome.skip = Some(SkipReason::InactionableSignal),
            }
        }

        if let Some(reason) = &outcome.skip {
            self.log_skip(index, reason);
        }

        self.mark_to_market(price, time);
        outcome.equity = self.equity;
        outcome
    }

    /// Replays `candles[start_index..]` at their close prices.
    pub fn run(&mut self, candles: &[Candle], start_index: usize) -> RunSummary {
        let mut summary = RunSummary {
            session_id: self.session_id,
            strategy: self.strategy.name().to_string(),
            bars_processed: 0,
            entries: 0,
            exits: 0,
            skips: BTreeMap::new(),
        };

        for index in start_index..candles.len() {
            let outcome = self.process_candle(candles, index, candles[index].close);
            summary.bars_processed += 1;
            if outcome.opened_trade.is_some() {
                summary.entries += 1;
            }
            summary.exits += outcome.closed_trades.len();
            if let Some(reason) = outcome.skip {
                *summary.skips.entry(reason.as_str().to_string()).or_insert(0) += 1;
            }
        }

        info!(
            "[{}] Run complete: {} bars, {} entries, {} exits, balance {:.2}, equity {:.2}",
            self.session_id,
            summary.bars_processed,
            summary.entries,
            summary.exits,
            self.balance,
            self.equity
        );
        summary
    }

    fn classify_rejection(&self, signal: &StrategySignal, index: usize) -> SkipReason {
        match signal.action {
            SignalAction::Hold
                if index + 1 < self.strategy.min_data_points() || is_warmup_hold(signal) =>
            {
                SkipReason::InsufficientHistory
            }
            SignalAction::Hold => SkipReason::InactionableSignal,
            _ if !meets_confidence_threshold(signal.confidence, MIN_CONFIDENCE) => {
                SkipReason::LowConfidenceSignal {
                    confidence: signal.confidence,
                }
            }
            _ => SkipReason::SignalRejected,
        }
    }

    fn log_skip(&self, index: usize, reason: &SkipReason) {
        match reason {
            SkipReason::InsufficientHistory | SkipReason::InactionableSignal => {
                debug!("[{}] Bar {}: {}", self.session_id, index, reason.as_str())
            }
            SkipReason::InsufficientBalance {
                required,
                available,
            } => warn!(
                "[{}] Bar {}: insufficient balance (need {:.2}, have {:.2})",
                self.session_id, index, required, available
            ),
            SkipReason::RiskLimitBreached(limit) => warn!(
                "[{}] Bar {}: {:?} limit breached, entry suppressed",
                self.session_id, index, limit
            ),
            other => info!(
                "[{}] Bar {}: no action ({})",
                self.session_id,
                index,
                other.as_str()
            ),
        }
    }

    fn execute_buy_signal(
        &mut self,
        candles: &[Candle],
        index: usize,
        price: f64,
        time: DateTime<Utc>,
    ) -> Result<String, SkipReason> {
        if self.config.enforce_risk_limits {
            if self
                .risk_manager
                .daily_loss_breached(self.daily_pnl, self.balance)
            {
                return Err(SkipReason::RiskLimitBreached(RiskLimit::DailyLoss));
            }
            if self
                .risk_manager
                .drawdown_breached(self.equity, self.peak_equity)
            {
                return Err(SkipReason::RiskLimitBreached(RiskLimit::Drawdown));
            }
        }

        let entry_price = self.executor.fill_price(OrderSide::Buy, price);
        let Some((stop_loss, take_profit)) =
            self.strategy.compute_stop_take(entry_price, candles, index)
        else {
            return Err(SkipReason::InsufficientHistory);
        };

        let quantity = self
            .risk_manager
            .size_position(self.balance, entry_price, stop_loss);
        if quantity <= 0.0 {
            return Err(SkipReason::InvalidSizing);
        }

        let required = quantity * entry_price;
        if required > self.balance {
            return Err(SkipReason::InsufficientBalance {
                required,
                available: self.balance,
            });
        }

        let order = self.executor.execute_market(
            OrderSide::Buy,
            &self.config.symbol,
            quantity,
            price,
            time,
        )?;
        let fill_price = order.execution_price.unwrap_or(entry_price);

        self.trade_counter += 1;
        let trade = Trade {
            id: generate_trade_id(self.trade_counter),
            symbol: self.config.symbol.clone(),
            entry_price: fill_price,
            entry_time: time,
            quantity: order.filled_quantity,
            stop_loss,
            take_profit,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
        };
        self.balance -= trade.quantity * fill_price;

        info!(
            "[{}] Trade opened: {} {:.6} @ {:.4} | SL {:.4} | TP {:.4} | balance {:.2}",
            self.session_id,
            trade.id,
            trade.quantity,
            trade.entry_price,
            trade.stop_loss,
            trade.take_profit,
            self.balance
        );

        let trade_id = trade.id.clone();
        self.open_trades.push(trade);
        Ok(trade_id)
    }

    /// Long-only: a sell signal flattens every open trade at `price`.
    fn execute_sell_signal(&mut self, price: f64, time: DateTime<Utc>) -> Vec<String> {
        let mut closed = Vec::new();
        while !self.open_trades.is_empty() {
            match self.close_trade(0, OrderSide::Sell, price, ExitReason::SellSignal, time) {
                Ok(trade_id) => closed.push(trade_id),
                Err(err) => {
                    warn!("[{}] Sell aborted: {}", self.session_id, err);
                    break;
                }
            }
        }
        closed
    }

    /// Target is checked before stop on each open trade.
    fn check_open_trades(&mut self, price: f64, time: DateTime<Utc>) -> Vec<String> {
        let mut closed = Vec::new();
        let mut position = 0;

        while position < self.open_trades.len() {
            let trade = &self.open_trades[position];
            let exit = if price >= trade.take_profit {
                Some((trade.take_profit, ExitReason::TakeProfit))
            } else if price <= trade.stop_loss {
                Some((trade.stop_loss, ExitReason::StopLoss))
            } else {
                None
            };

            let Some((exit_level, reason)) = exit else {
                position += 1;
                continue;
            };

            match self.close_trade(position, OrderSide::Close, exit_level, reason, time) {
                Ok(trade_id) => closed.push(trade_id),
                Err(err) => {
                    warn!("[{}] Exit skipped: {}", self.session_id, err);
                    position += 1;
                }
            }
        }

        closed
    }

    fn close_trade(
        &mut self,
        position: usize,
        side: OrderSide,
        price: f64,
        reason: ExitReason,
        time: DateTime<Utc>,
    ) -> Result<String, OrderError> {
        let quantity = self.open_trades[position].quantity;
        let order = self
            .executor
            .execute_market(side, &self.config.symbol, quantity, price, time)?;
        let exit_price = order.execution_price.unwrap_or(price);

        let mut trade = self.open_trades.remove(position);
        trade.close(exit_price, time, reason);

        // Escrowed notional comes back at the exit price, which already carries the pnl
        self.balance += trade.quantity * exit_price;
        self.daily_pnl += trade.pnl();

        info!(
            "[{}] Trade closed: {} | {} | entry {:.4} exit {:.4} | PnL {:.2} ({:.2}%) | RR {:.2} | balance {:.2}",
            self.session_id,
            trade.id,
            reason,
            trade.entry_price,
            exit_price,
            trade.pnl(),
            trade.pnl_percent(),
            trade.risk_reward_actual(),
            self.balance
        );

        let trade_id = trade.id.clone();
        self.daily_trades.push(trade.clone());
        self.closed_trades.push(trade);
        Ok(trade_id)
    }

    fn roll_trading_day(&mut self, date: NaiveDate) {
        match self.current_day {
            Some(current) if current == date => {}
            Some(current) => {
                info!(
                    "[{}] New trading day {} (previous {}: {} trades, pnl {:.2})",
                    self.session_id,
                    date,
                    current,
                    self.daily_trades.len(),
                    self.daily_pnl
                );
                self.daily_trades.clear();
                self.daily_pnl = 0.0;
                self.current_day = Some(date);
            }
            None => self.current_day = Some(date),
        }
    }

    fn mark_to_market(&mut self, price: f64, time: DateTime<Utc>) {
        let positions_value: f64 = self
            .open_trades
            .iter()
            .map(|trade| trade.market_value(price))
            .sum();
        self.equity = self.balance + positions_value;
        self.peak_equity = self.peak_equity.max(self.equity);
        self.worst_drawdown_percent = self
            .worst_drawdown_percent
            .max(drawdown_percent(self.equity, self.peak_equity));

        self.equity_curve.push(EquityPoint {
            date: time,
            balance: self.balance,
            equity: self.equity,
            open_trades: self.open_trades.len(),
        });
    }

    pub fn daily_report(&self) -> DailyReport {
        PerformanceCalculator::daily_report(
            self.current_day,
            &self.daily_trades,
            self.daily_pnl,
            self.config.account_size,
            self.balance,
            self.equity,
        )
    }

    pub fn overall_report(&self) -> OverallReport {
        PerformanceCalculator::overall_report(&SessionSnapshot {
            closed_trades: &self.closed_trades,
            open_trades: self.open_trades.len(),
            account_size: self.config.account_size,
            balance: self.balance,
            equity: self.equity,
            peak_equity: self.peak_equity,
            worst_drawdown_percent: self.worst_drawdown_percent,
            equity_curve: &self.equity_curve,
        })
    }

    pub fn trade_summaries(&self, limit: usize) -> Vec<TradeSummary> {
        self.closed_trades
            .iter()
            .take(limit)
            .map(TradeSummary::from)
            .collect()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    pub fn strategy_name(&self) -> &str {
        self.strategy.name()
    }

    pub fn balance(&self) -> f64 {
        self.balance
    }

    pub fn equity(&self) -> f64 {
        self.equity
    }

    pub fn peak_equity(&self) -> f64 {
        self.peak_equity
    }

    pub fn closed_trades(&self) -> &[Trade] {
        &self.closed_trades
    }

    pub fn open_trades(&self) -> &[Trade] {
        &self.open_trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn orders(&self) -> &[Order] {
        self.executor.order_history()
    }
}
