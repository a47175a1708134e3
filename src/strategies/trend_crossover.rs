use crate::config::BotConfig;
use crate::indicators::{
    IncrementalIndicators, IndicatorCursor, RollingAtr, RollingRsi, RollingSma, RollingWindow,
};
use crate::models::*;
use crate::strategy_utils::{
    atr_stop_take, buy_signal, hold_signal, indicators_not_ready, insufficient_data, sell_signal,
    VOLUME_LOOKBACK,
};

struct TrendIndicators {
    fast: RollingSma,
    slow: RollingSma,
    rsi: RollingRsi,
    atr: RollingAtr,
    volume: RollingWindow,
    prev_fast: Option<f64>,
    prev_slow: Option<f64>,
}

impl TrendIndicators {
    fn new(config: &BotConfig) -> Self {
        Self {
            fast: RollingSma::new(config.fast_ma_period),
            slow: RollingSma::new(config.slow_ma_period),
            rsi: RollingRsi::new(config.rsi_period),
            atr: RollingAtr::new(config.atr_period),
            volume: RollingWindow::new(VOLUME_LOOKBACK),
            prev_fast: None,
            prev_slow: None,
        }
    }
}

impl IncrementalIndicators for TrendIndicators {
    fn push(&mut self, candle: &Candle) {
        self.prev_fast = self.fast.value();
        self.prev_slow = self.slow.value();
        self.fast.push(candle.close);
        self.slow.push(candle.close);
        self.rsi.push(candle.close);
        self.atr.push(candle);
        self.volume.push(candle.volume);
    }

    fn reset(&mut self) {
        self.fast.reset();
        self.slow.reset();
        self.rsi.reset();
        self.atr.reset();
        self.volume.clear();
        self.prev_fast = None;
        self.prev_slow = None;
    }
}

/// Fast/slow SMA crossover, filtered by an RSI band and above-average volume.
pub struct TrendCrossoverRsiStrategy {
    slow_period: usize,
    rsi_oversold: f64,
    rsi_overbought: f64,
    atr_multiplier_sl: f64,
    atr_multiplier_tp: f64,
    indicators: IndicatorCursor<TrendIndicators>,
}

impl TrendCrossoverRsiStrategy {
    pub fn new(config: &BotConfig) -> Self {
        Self {
            slow_period: config.slow_ma_period,
            rsi_oversold: config.rsi_oversold,
            rsi_overbought: config.rsi_overbought,
            atr_multiplier_sl: config.atr_multiplier_sl,
            atr_multiplier_tp: config.atr_multiplier_tp,
            indicators: IndicatorCursor::new(TrendIndicators::new(config)),
        }
    }
}

impl super::Strategy for TrendCrossoverRsiStrategy {
    fn name(&self) -> &str {
        "macrossover_rsi"
    }

    fn min_data_points(&self) -> usize {
        self.slow_period + 2
    }

    fn generate_signal(&mut self, candles: &[Candle], index: usize) -> StrategySignal {
        if index >= candles.len() || index < self.slow_period + 1 {
            return insufficient_data();
        }
        let Some(state) = self.indicators.sync(candles, index) else {
            return insufficient_data();
        };

        let (Some(fast), Some(slow), Some(prev_fast), Some(prev_slow), Some(avg_volume)) = (
            state.fast.value(),
            state.slow.value(),
            state.prev_fast,
            state.prev_slow,
            state.volume.mean(),
        ) else {
            return indicators_not_ready();
        };
        if !state.rsi.is_ready() {
            return indicators_not_ready();
        }
        // Unchanged closes over the RSI window leave it undefined
        let Some(rsi) = state.rsi.value() else {
            return hold_signal("rsi undefined");
        };

        let volume = candles[index].volume;
        let volume_ratio = if avg_volume > 0.0 {
            volume / avg_volume
        } else {
            0.0
        };

        if prev_fast <= prev_slow
            && fast > slow
            && rsi > self.rsi_oversold
            && rsi < self.rsi_overbought
            && volume > avg_volume
        {
            // Stronger momentum inside the band earns more confidence
            let confidence = (0.7 + (rsi - 30.0) / 100.0).min(0.95);
            return buy_signal(
                confidence,
                format!("MA Crossover Up | RSI:{:.1} | Volume:{:.1}x", rsi, volume_ratio),
            );
        }

        if prev_fast >= prev_slow && fast < slow && rsi < self.rsi_overbought && volume > avg_volume
        {
            let confidence = (0.7 + (70.0 - rsi) / 100.0).min(0.95);
            return sell_signal(
                confidence,
                format!("MA Crossover Down | RSI:{:.1} | Volume:{:.1}x", rsi, volume_ratio),
            );
        }

        hold_signal("no crossover")
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
    use crate::indicators::{calculate_atr_from_candles, calculate_rsi, calculate_sma};
    use crate::strategy_utils::INDICATORS_NOT_READY;
    use crate::strategy::Strategy;
    use chrono::{Duration, TimeZone, Utc};

    fn candles(closes: &[f64], volumes: &[f64]) -> Vec<Candle> {
        let base = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .zip(volumes.iter())
            .enumerate()
            .map(|(i, (&close, &volume))| Candle {
                date: base + Duration::hours(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume,
            })
            .collect()
    }

    fn small_config() -> BotConfig {
        BotConfig {
            fast_ma_period: 2,
            slow_ma_period: 3,
            rsi_period: 3,
            rsi_overbought: 80.0,
            atr_period: 3,
            ..BotConfig::default()
        }
    }

    const VOLUMES: [f64; 6] = [100.0, 100.0, 100.0, 100.0, 100.0, 400.0];

    #[test]
    fn holds_until_slow_period_plus_one() {
        let config = small_config();
        let data = candles(&[10.0; 6], &VOLUMES);
        let mut strategy = TrendCrossoverRsiStrategy::new(&config);
        for index in 0..=config.slow_ma_period {
            let signal = strategy.generate_signal(&data, index);
            assert_eq!(signal.action, SignalAction::Hold);
            assert_eq!(signal.reason, "insufficient data");
        }
    }

    #[test]
    fn buys_on_upward_crossover_with_volume() {
        let data = candles(&[10.0, 10.0, 10.0, 10.0, 9.0, 11.5], &VOLUMES);
        let mut strategy = TrendCrossoverRsiStrategy::new(&small_config());

        assert_eq!(strategy.generate_signal(&data, 4).action, SignalAction::Hold);
        let signal = strategy.generate_signal(&data, 5);
        assert_eq!(signal.action, SignalAction::Buy);
        assert!((signal.confidence - 0.95).abs() < 1e-9);
        assert!(signal.reason.starts_with("MA Crossover Up | RSI:71.4"));
        assert!(signal.reason.ends_with("Volume:2.7x"));
    }

    #[test]
    fn sells_on_downward_crossover_with_volume() {
        let data = candles(&[10.0, 10.0, 10.0, 10.0, 11.0, 8.5], &VOLUMES);
        let mut strategy = TrendCrossoverRsiStrategy::new(&small_config());

        let signal = strategy.generate_signal(&data, 5);
        assert_eq!(signal.action, SignalAction::Sell);
        assert!((signal.confidence - 0.95).abs() < 1e-9);
        assert!(signal.reason.starts_with("MA Crossover Down | RSI:28.6"));
    }

    #[test]
    fn crossover_below_oversold_rsi_holds() {
        // steady decline, then a bounce just strong enough to cross
        let mut closes: Vec<f64> = (0..11).map(|i| 40.0 - 2.0 * i as f64).collect();
        closes.push(24.5);
        let mut volumes = vec![100.0; 11];
        volumes.push(500.0);
        let data = candles(&closes, &volumes);
        let config = BotConfig {
            rsi_period: 10,
            ..small_config()
        };
        let mut strategy = TrendCrossoverRsiStrategy::new(&config);

        let fast = calculate_sma(&closes, config.fast_ma_period);
        let slow = calculate_sma(&closes, config.slow_ma_period);
        assert!(fast[10] <= slow[10]);
        assert!(fast[11] > slow[11]);
        let rsi = calculate_rsi(&closes, 10)[11];
        assert!(rsi < config.rsi_oversold);

        let signal = strategy.generate_signal(&data, 11);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.reason, "no crossover");
    }

    #[test]
    fn crossover_on_unchanged_rsi_window_holds() {
        let closes = [20.0, 20.0, 5.0, 9.0, 10.0, 10.0, 10.0];
        let volumes = [100.0, 100.0, 100.0, 100.0, 100.0, 100.0, 400.0];
        let data = candles(&closes, &volumes);
        let config = BotConfig {
            fast_ma_period: 2,
            slow_ma_period: 5,
            rsi_period: 2,
            ..BotConfig::default()
        };

        let fast = calculate_sma(&closes, 2);
        let slow = calculate_sma(&closes, 5);
        assert!(fast[5] <= slow[5]);
        assert!(fast[6] > slow[6]);
        assert!(calculate_rsi(&closes, 2)[6].is_nan());

        let signal = TrendCrossoverRsiStrategy::new(&config).generate_signal(&data, 6);
        assert_eq!(signal.action, SignalAction::Hold);
        assert_eq!(signal.reason, "rsi undefined");
    }

    #[test]
    fn long_rsi_window_reports_indicators_not_ready() {
        let data = candles(&[10.0, 10.0, 10.0, 10.0, 9.0, 11.5], &VOLUMES);
        let config = BotConfig {
            rsi_period: 6,
            ..small_config()
        };
        let signal = TrendCrossoverRsiStrategy::new(&config).generate_signal(&data, 4);
        assert_eq!(signal.reason, INDICATORS_NOT_READY);
    }

    #[test]
    fn crossover_without_volume_confirmation_holds() {
        let data = candles(&[10.0, 10.0, 10.0, 10.0, 9.0, 11.5], &[100.0; 6]);
        let mut strategy = TrendCrossoverRsiStrategy::new(&small_config());
        assert_eq!(strategy.generate_signal(&data, 5).action, SignalAction::Hold);
    }

    #[test]
    fn sequential_and_fresh_evaluation_agree() {
        let closes: Vec<f64> = (0..240)
            .map(|i| 100.0 + (i as f64 * 0.21).sin() * 6.0 + (i as f64 * 0.05).cos() * 3.0)
            .collect();
        let volumes: Vec<f64> = (0..240).map(|i| 900.0 + ((i * 37) % 11) as f64 * 40.0).collect();
        let data = candles(&closes, &volumes);
        let config = BotConfig {
            fast_ma_period: 5,
            slow_ma_period: 15,
            ..BotConfig::default()
        };

        let mut sequential = TrendCrossoverRsiStrategy::new(&config);
        for index in 0..data.len() {
            let incremental = sequential.generate_signal(&data, index);
            let fresh = TrendCrossoverRsiStrategy::new(&config).generate_signal(&data, index);
            assert_eq!(incremental.action, fresh.action, "bar {index}");
            assert!((incremental.confidence - fresh.confidence).abs() < 1e-9);
        }
    }

    #[test]
    fn stop_take_follow_atr() {
        let config = small_config();
        let data = candles(&[10.0, 10.0, 10.0, 10.0, 9.0, 11.5], &VOLUMES);
        let mut strategy = TrendCrossoverRsiStrategy::new(&config);

        assert!(strategy.compute_stop_take(10.0, &data, 1).is_none());

        let atr = calculate_atr_from_candles(&data, config.atr_period)[5];
        let (stop, take) = strategy.compute_stop_take(11.5, &data, 5).unwrap();
        assert!((stop - (11.5 - atr * 1.5)).abs() < 1e-9);
        assert!((take - (11.5 + atr * 2.0)).abs() < 1e-9);
        assert!(stop < 11.5 && take > 11.5);
    }
}
