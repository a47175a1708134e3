use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candle {
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SignalAction {
    Buy,
    Sell,
    Hold,
}

impl SignalAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalAction::Buy => "buy",
            SignalAction::Sell => "sell",
            SignalAction::Hold => "hold",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySignal {
    pub action: SignalAction,
    pub confidence: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum OrderSide {
    Buy,
    Sell,
    Close,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
            OrderSide::Close => "CLOSE",
        }
    }

    /// Sides that take liquidity out of the position rather than adding to it.
    pub fn is_exit(&self) -> bool {
        matches!(self, OrderSide::Sell | OrderSide::Close)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    Filled,
    PartiallyFilled,
    Cancelled,
    Rejected,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Filled => "filled",
            OrderStatus::PartiallyFilled => "partially_filled",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: String,
    pub side: OrderSide,
    pub symbol: String,
    pub quantity: f64,
    pub price: f64,
    pub status: OrderStatus,
    pub filled_quantity: f64,
    pub created_at: DateTime<Utc>,
    pub filled_at: Option<DateTime<Utc>>,
    pub execution_price: Option<f64>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ExitReason {
    #[serde(rename = "Take Profit Hit")]
    TakeProfit,
    #[serde(rename = "Stop Loss Hit")]
    StopLoss,
    #[serde(rename = "Sell Signal")]
    SellSignal,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::TakeProfit => "Take Profit Hit",
            ExitReason::StopLoss => "Stop Loss Hit",
            ExitReason::SellSignal => "Sell Signal",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trade {
    pub id: String,
    pub symbol: String,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub quantity: f64,
    pub stop_loss: f64,
    pub take_profit: f64,
    pub exit_price: Option<f64>,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
}

impl Trade {
    pub fn is_open(&self) -> bool {
        self.exit_price.is_none()
    }

    pub fn pnl(&self) -> f64 {
        match self.exit_price {
            Some(exit_price) => (exit_price - self.entry_price) * self.quantity,
            None => 0.0,
        }
    }

    pub fn pnl_percent(&self) -> f64 {
        match self.exit_price {
            Some(exit_price) if self.entry_price != 0.0 => {
                (exit_price - self.entry_price) / self.entry_price * 100.0
            }
            _ => 0.0,
        }
    }

    pub fn is_win(&self) -> bool {
        self.exit_price.is_some() && self.pnl() > 0.0
    }

    /// Realized reward distance over the initial risk distance.
    pub fn risk_reward_actual(&self) -> f64 {
        let Some(exit_price) = self.exit_price else {
            return 0.0;
        };
        let risk = self.entry_price - self.stop_loss;
        if risk == 0.0 {
            return 0.0;
        }
        (exit_price - self.entry_price).abs() / risk
    }

    /// Sets the exit fields. A trade closes at most once; later calls are ignored.
    pub fn close(&mut self, exit_price: f64, exit_time: DateTime<Utc>, reason: ExitReason) -> bool {
        if !self.is_open() {
            return false;
        }
        self.exit_price = Some(exit_price);
        self.exit_time = Some(exit_time);
        self.exit_reason = Some(reason);
        true
    }

    /// Value of the position at `mark_price`.
    pub fn market_value(&self, mark_price: f64) -> f64 {
        self.quantity * mark_price
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: DateTime<Utc>,
    pub balance: f64,
    pub equity: f64,
    pub open_trades: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DailyReport {
    pub date: Option<NaiveDate>,
    pub trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub daily_pnl: f64,
    pub daily_pnl_percent: f64,
    pub balance: f64,
    pub equity: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OverallReport {
    pub total_trades: usize,
    pub wins: usize,
    pub losses: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub total_pnl: f64,
    pub total_pnl_percent: f64,
    pub avg_win: f64,
    pub avg_loss: f64,
    pub max_win: f64,
    pub max_loss: f64,
    pub balance: f64,
    pub equity: f64,
    pub max_drawdown_percent: f64,
    pub worst_drawdown_percent: f64,
    pub sharpe_ratio: f64,
    pub open_trades: usize,
}

/// Display row for a closed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeSummary {
    pub id: String,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_price: f64,
    pub exit_time: Option<DateTime<Utc>>,
    pub exit_reason: Option<ExitReason>,
    pub quantity: f64,
    pub pnl: f64,
    pub pnl_percent: f64,
    pub risk_reward: f64,
}

impl From<&Trade> for TradeSummary {
    fn from(trade: &Trade) -> Self {
        Self {
            id: trade.id.clone(),
            entry_price: trade.entry_price,
            entry_time: trade.entry_time,
            exit_price: trade.exit_price.unwrap_or(0.0),
            exit_time: trade.exit_time,
            exit_reason: trade.exit_reason,
            quantity: trade.quantity,
            pnl: trade.pnl(),
            pnl_percent: trade.pnl_percent(),
            risk_reward: trade.risk_reward_actual(),
        }
    }
}

pub fn generate_trade_id(counter: u64) -> String {
    format!("TRADE_{}", counter)
}

pub fn generate_order_id(side: OrderSide, symbol: &str, counter: u64) -> String {
    format!("{}_{}_{}", side.as_str(), symbol, counter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn open_trade() -> Trade {
        Trade {
            id: generate_trade_id(1),
            symbol: "BTC/USD".to_string(),
            entry_price: 100.0,
            entry_time: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
            quantity: 5.0,
            stop_loss: 95.0,
            take_profit: 110.0,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
        }
    }

    #[test]
    fn open_trade_has_no_realized_figures() {
        let trade = open_trade();
        assert!(trade.is_open());
        assert_eq!(trade.pnl(), 0.0);
        assert_eq!(trade.pnl_percent(), 0.0);
        assert!(!trade.is_win());
        assert_eq!(trade.risk_reward_actual(), 0.0);
    }

    #[test]
    fn closed_trade_derives_pnl_and_risk_reward() {
        let mut trade = open_trade();
        let exit_time = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        assert!(trade.close(110.0, exit_time, ExitReason::TakeProfit));

        assert!((trade.pnl() - 50.0).abs() < 1e-9);
        assert!((trade.pnl_percent() - 10.0).abs() < 1e-9);
        assert!(trade.is_win());
        assert!((trade.risk_reward_actual() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn trade_closes_only_once() {
        let mut trade = open_trade();
        let exit_time = Utc.with_ymd_and_hms(2023, 1, 2, 0, 0, 0).unwrap();
        assert!(trade.close(95.0, exit_time, ExitReason::StopLoss));
        assert!(!trade.close(120.0, exit_time, ExitReason::SellSignal));
        assert_eq!(trade.exit_price, Some(95.0));
        assert_eq!(trade.exit_reason, Some(ExitReason::StopLoss));
        assert!((trade.pnl() + 25.0).abs() < 1e-9);
    }

    #[test]
    fn risk_reward_is_zero_when_stop_equals_entry() {
        let mut trade = open_trade();
        trade.stop_loss = trade.entry_price;
        trade.close(104.0, trade.entry_time, ExitReason::SellSignal);
        assert_eq!(trade.risk_reward_actual(), 0.0);
    }

    #[test]
    fn ids_follow_side_symbol_counter_format() {
        assert_eq!(generate_order_id(OrderSide::Buy, "BTC/USD", 3), "BUY_BTC/USD_3");
        assert_eq!(generate_trade_id(7), "TRADE_7");
        assert_eq!(
            serde_json::to_string(&ExitReason::TakeProfit).unwrap(),
            "\"Take Profit Hit\""
        );
    }
}
