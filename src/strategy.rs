use crate::config::{BotConfig, StrategyKind};
use crate::models::*;
use crate::strategy_utils;

pub trait Strategy {
    fn name(&self) -> &str;

    /// Bars of history required before the strategy can emit anything but Hold.
    fn min_data_points(&self) -> usize;

    /// Signal for the bar at `index`, looking only at `candles[..=index]`.
    fn generate_signal(&mut self, candles: &[Candle], index: usize) -> StrategySignal;

    /// `(stop_loss, take_profit)` for a long entry at `entry_price`, or `None` while
    /// volatility is not yet measurable.
    fn compute_stop_take(
        &mut self,
        entry_price: f64,
        candles: &[Candle],
        index: usize,
    ) -> Option<(f64, f64)>;

    fn validate_signal(&self, signal: &StrategySignal, balance: f64) -> bool {
        strategy_utils::is_actionable(signal, balance)
    }
}

#[path = "strategies/trend_crossover.rs"]
pub mod trend_crossover;

pub use trend_crossover::TrendCrossoverRsiStrategy;

#[path = "strategies/mean_reversion.rs"]
pub mod mean_reversion;

pub use mean_reversion::MeanReversionStrategy;

pub fn create_strategy(kind: StrategyKind, config: &BotConfig) -> Box<dyn Strategy + Send> {
    match kind {
        StrategyKind::TrendCrossoverRsi => Box::new(TrendCrossoverRsiStrategy::new(config)),
        StrategyKind::MeanReversion => Box::new(MeanReversionStrategy::new(config)),
    }
}
