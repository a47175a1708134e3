use crate::config::BotConfig;
use log::error;

pub const PRICE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, PartialEq)]
pub struct PositionAllocation {
    pub quantity: f64,
    pub risk_amount: f64,
    /// True when the max-position cap, not the risk budget, set the size.
    pub capped: bool,
}

#[derive(Debug, PartialEq)]
pub enum PositionSizingOutcome {
    Sized(PositionAllocation),
    /// Entry and stop coincide (or are not finite), so risk per unit is undefined.
    InvalidRisk { entry_price: f64, stop_loss: f64 },
    TooSmall,
}

/// Position sizing and account-level loss limits.
#[derive(Debug, Clone)]
pub struct RiskManager {
    risk_per_trade: f64,
    max_position_size: f64,
    max_daily_loss: f64,
    max_drawdown: f64,
}

impl RiskManager {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            risk_per_trade: config.risk_per_trade,
            max_position_size: config.max_position_size,
            max_daily_loss: config.max_daily_loss,
            max_drawdown: config.max_drawdown,
        }
    }

    pub fn determine_position_size(
        &self,
        balance: f64,
        entry_price: f64,
        stop_loss: f64,
    ) -> PositionSizingOutcome {
        let risk_per_unit = (entry_price - stop_loss).abs();
        if !risk_per_unit.is_finite() || risk_per_unit < f64::EPSILON {
            return PositionSizingOutcome::InvalidRisk {
                entry_price,
                stop_loss,
            };
        }
        if !balance.is_finite() || balance <= 0.0 || entry_price <= 0.0 {
            return PositionSizingOutcome::TooSmall;
        }

        let risk_amount = balance * self.risk_per_trade;
        let risk_units = risk_amount / risk_per_unit;
        let max_units = balance * self.max_position_size / entry_price;
        let quantity = risk_units.min(max_units).max(0.0);

        if quantity <= PRICE_EPSILON {
            return PositionSizingOutcome::TooSmall;
        }

        PositionSizingOutcome::Sized(PositionAllocation {
            quantity,
            risk_amount,
            capped: max_units < risk_units,
        })
    }

    /// Units to buy so that hitting the stop loses at most `risk_per_trade` of the
    /// balance, capped at `max_position_size` of the balance in notional.
    pub fn size_position(&self, balance: f64, entry_price: f64, stop_loss: f64) -> f64 {
        match self.determine_position_size(balance, entry_price, stop_loss) {
            PositionSizingOutcome::Sized(allocation) => allocation.quantity,
            PositionSizingOutcome::InvalidRisk {
                entry_price,
                stop_loss,
            } => {
                error!(
                    "Risk per unit is zero (entry {:.4}, stop {:.4}), cannot size position",
                    entry_price, stop_loss
                );
                0.0
            }
            PositionSizingOutcome::TooSmall => 0.0,
        }
    }

    pub fn daily_loss_breached(&self, daily_pnl: f64, balance: f64) -> bool {
        daily_pnl < -(balance * self.max_daily_loss)
    }

    pub fn drawdown_breached(&self, equity: f64, peak_equity: f64) -> bool {
        if peak_equity == 0.0 {
            return false;
        }
        (peak_equity - equity) / peak_equity > self.max_drawdown
    }
}

/// Percentage drop of `equity` below `peak_equity`; zero without a peak.
pub fn drawdown_percent(equity: f64, peak_equity: f64) -> f64 {
    if peak_equity <= 0.0 {
        return 0.0;
    }
    ((peak_equity - equity) / peak_equity * 100.0).max(0.0)
}
