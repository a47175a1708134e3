use crate::config::BotConfig;
use crate::indicators::{
    IncrementalIndicators, IndicatorCursor, RollingAtr, RollingBollinger, RollingRsi,
    RollingWindow,
};
use crate::models::*;
use crate::strategy_utils::{
    atr_stop_take, buy_signal, hold_signal, indicators_not_ready, insufficient_data, sell_signal,
    VOLUME_LOOKBACK,
};

const BAND_PERIOD: usize = 20;
const BAND_STD_DEV: f64 = 2.0;
const WARMUP_BARS: usize = 30;
const VOLUME_CONFIRMATION: f64 = 0.8;

struct ReversionIndicators {
    bands: RollingBollinger,
    rsi: RollingRsi,
    atr: RollingAtr,
    volume: RollingWindow,
}

impl IncrementalIndicators for ReversionIndicators {
    fn push(&mut self, candle: &Candle) {
        self.bands.push(candle.close);
        self.rsi.push(candle.close);
        self.atr.push(candle);
        self.volume.push(candle.volume);
    }

    fn reset(&mut self) {
        self.bands.reset();
        self.rsi.reset();
        self.atr.reset();
        self.volume.clear();
    }
}

/// Fades closes outside the Bollinger(20, 2) bands when RSI agrees.
pub struct MeanReversionStrategy {
    rsi_oversold: f64,
    rsi_overbought: f64,
    atr_multiplier_sl: f64,
    atr_multiplier_tp: f64,
    indicators: IndicatorCursor<ReversionIndicators>,
}

impl MeanReversionStrategy {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            rsi_oversold: config.rsi_oversold,
            rsi_overbought: config.rsi_overbought,
            atr_multiplier_sl: config.atr_multiplier_sl,
            atr_multiplier_tp: config.atr_multiplier_tp,
            indicators: IndicatorCursor::new(ReversionIndicators {
                bands: RollingBollinger::new(BAND_PERIOD, BAND_STD_DEV),
                rsi: RollingRsi::new(config.rsi_period),
                atr: RollingAtr::new(config.atr_period),
                volume: RollingWindow::new(VOLUME_LOOKBACK),
            }),
        }
    }
}

impl super::Strategy for MeanReversionStrategy {
    fn name(&self) -> &str {
        "mean_reversion"
    }

    fn min_data_points(&self) -> usize {
        WARMUP_BARS + 1
    }

    fn generate_signal(&mut self, candles: &[Candle], index: usize) -> StrategySignal {
        if index >= candles.len() || index < WARMUP_BARS {
            return insufficient_data();
        }
        let Some(state) = self.indicators.sync(candles, index) else {
            return insufficient_data();
        };
        let (Some(bands), Some(avg_volume)) = (state.bands.value(), state.volume.mean()) else {
            return indicators_not_ready();
        };
        if !state.rsi.is_ready() {
            return indicators_not_ready();
        }
        let Some(rsi) = state.rsi.value() else {
            return hold_signal("rsi undefined");
        };

        let candle = &candles[index];
        let volume_confirmed = candle.volume >= VOLUME_CONFIRMATION * avg_volume;

        if candle.close <= bands.lower && rsi <= self.rsi_oversold && volume_confirmed {
            let confidence = (0.6 + (self.rsi_oversold - rsi) / 100.0).min(0.95);
            return buy_signal(confidence, format!("MeanReversion Buy | RSI:{:.1}", rsi));
        }

        if candle.close >= bands.upper && rsi >= self.rsi_overbought && volume_confirmed {
            let confidence = (0.6 + (rsi - self.rsi_overbought) / 100.0).min(0.95);
            return sell_signal(confidence, format!("MeanReversion Sell | RSI:{:.1}", rsi));
        }

        hold_signal("inside bands")
    }

    fn compute_stop_take(
        &mut self,
        entry_price: f64,
        candles: &[Candle],
        index: usize,
    ) -> Option<(f64, f64)> {
        let atr = self.indicators.sync(candles, index)?.atr.value()?;
        if !atr.is_finite() || !entry_price.is_finite() {
            return None;
        }
        Some(atr_stop_take(
            entry_price,
            atr,
            self.atr_multiplier_sl,
            self.atr_multiplier_tp,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::calculate_rsi;
    use crate::strategy::Strategy;
    use chrono::{Duration, TimeZone, Utc};

    fn candles(closes: &[f64], volumes: &[f64]) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2023, 3, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .zip(volumes.iter())
            .enumerate()
            .map(|(i, (&close, &volume))| Candle {
                date: base + Duration::hours(i as i64),
                open: close,
                high: close + 0.4,
                low: close - 0.4,
                close,
                volume,
            })
            .collect()
    }

    /// Quiet range around 100 followed by a slide into 90.
    fn selloff() -> Vec<f64> {
        let mut closes: Vec<f64> = (0..26)
            .map(|i| if i % 2 == 0 { 100.0 } else { 100.5 })
            .collect();
        closes.extend_from_slice(&[99.0, 98.0, 97.0, 96.0, 95.0, 90.0]);
        closes
    }

    #[test]
    fn holds_during_warmup() {
        let closes = selloff();
        let data = candles(&closes, &vec![1_000.0; closes.len()]);
        let mut strategy = MeanReversionStrategy::new(&BotConfig::default());
        let signal = strategy.generate_signal(&data, 29);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.reason, "insufficient data");
    }

    #[test]
    fn buys_below_lower_band_when_oversold() {
        let closes = selloff();
        let data = candles(&closes, &vec![1_000.0; closes.len()]);
        let mut strategy = MeanReversionStrategy::new(&BotConfig::default());

        let index = closes.len() - 1;
        let rsi = calculate_rsi(&closes, 14)[index];
        let signal = strategy.generate_signal(&data, index);
        assert_eq!(signal.action, SignalAction::Buy);
        assert!((signal.confidence - (0.6 + (30.0 - rsi) / 100.0)).abs() < 1e-6);
        assert_eq!(signal.reason, format!("MeanReversion Buy | RSI:{:.1}", rsi));
    }

    #[test]
    fn sells_above_upper_band_when_overbought() {
        let closes: Vec<f64> = selloff().iter().map(|c| 200.0 - c).collect();
        let data = candles(&closes, &vec![1_000.0; closes.len()]);
        let mut strategy = MeanReversionStrategy::new(&BotConfig::default());

        let index = closes.len() - 1;
        let rsi = calculate_rsi(&closes, 14)[index];
        let signal = strategy.generate_signal(&data, index);
        assert_eq!(signal.action, SignalAction::Sell);
        assert!((signal.confidence - (0.6 + (rsi - 70.0) / 100.0)).abs() < 1e-6);
    }

    #[test]
    fn unchanged_closes_hold_without_rsi() {
        let data = candles(&[100.0; 40], &[1_000.0; 40]);
        let mut strategy = MeanReversionStrategy::new(&BotConfig::default());
        let signal = strategy.generate_signal(&data, 39);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.reason, "rsi undefined");
    }

    #[test]
    fn thin_volume_blocks_entry() {
        let closes = selloff();
        let mut volumes = vec![1_000.0; closes.len()];
        let last = volumes.len() - 1;
        volumes[last] = 100.0;
        let data = candles(&closes, &volumes);
        let mut strategy = MeanReversionStrategy::new(&BotConfig::default());
        assert_eq!(
            strategy.generate_signal(&data, last).action,
            SignalAction::Hold
        );
    }

    #[test]
    fn rewinding_rebuilds_indicator_state() {
        let closes = selloff();
        let data = candles(&closes, &vec![1_000.0; closes.len()]);
        let mut strategy = MeanReversionStrategy::new(&BotConfig::default());

        let last = closes.len() - 1;
        let first = strategy.generate_signal(&data, last);
        strategy.generate_signal(&data, 30);
        let again = strategy.generate_signal(&data, last);
        assert_eq!(first.action, again.action);
        assert!((first.confidence - again.confidence).abs() < 1e-12);

        let (stop, take) = strategy.compute_stop_take(90.0, &data, last).unwrap();
        assert!(stop < 90.0 && take > 90.0);
    }
}
