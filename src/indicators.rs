//! Technical indicators.
//!
//! The `calculate_*` functions are the reference forms: pure, aligned to the input
//! length, `NaN` wherever the window is not yet filled. The `Rolling*` types compute
//! the same values one bar at a time and are what the strategies run on.

use crate::models::Candle;
use std::collections::VecDeque;

pub fn calculate_sma(values: &[f64], period: usize) -> Vec<f64> {
    let mut sma_values = vec![f64::NAN; values.len()];
    if period == 0 || values.len() < period {
        return sma_values;
    }

    let mut window_sum: f64 = values[..period].iter().sum();
    sma_values[period - 1] = window_sum / period as f64;
    for i in period..values.len() {
        window_sum += values[i] - values[i - period];
        sma_values[i] = window_sum / period as f64;
    }

    sma_values
}

pub fn calculate_ema(values: &[f64], span: usize) -> Vec<f64> {
    if values.is_empty() {
        return Vec::new();
    }

    let multiplier = 2.0 / (span as f64 + 1.0);
    let mut ema_values = Vec::with_capacity(values.len());
    ema_values.push(values[0]);

    for i in 1..values.len() {
        let prev = ema_values[i - 1];
        ema_values.push(prev + multiplier * (values[i] - prev));
    }

    ema_values
}

pub fn calculate_macd(
    values: &[f64],
    fast_span: usize,
    slow_span: usize,
    signal_span: usize,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let fast_ema = calculate_ema(values, fast_span);
    let slow_ema = calculate_ema(values, slow_span);

    let macd_line: Vec<f64> = fast_ema
        .iter()
        .zip(slow_ema.iter())
        .map(|(fast, slow)| fast - slow)
        .collect();
    let signal_line = calculate_ema(&macd_line, signal_span);
    let histogram = macd_line
        .iter()
        .zip(signal_line.iter())
        .map(|(macd, signal)| macd - signal)
        .collect();

    (macd_line, signal_line, histogram)
}

/// Averages this close to zero count as zero; running sums leave residue.
const AVERAGE_EPSILON: f64 = 1e-12;

/// `None` when the window holds neither gains nor losses (0/0).
fn rsi_from_avgs(avg_gain: f64, avg_loss: f64) -> Option<f64> {
    let no_gain = avg_gain.abs() < AVERAGE_EPSILON;
    let no_loss = avg_loss.abs() < AVERAGE_EPSILON;
    match (no_gain, no_loss) {
        (true, true) => None,
        (_, true) => Some(100.0),
        _ => {
            let rs = avg_gain.max(0.0) / avg_loss;
            Some(100.0 - 100.0 / (1.0 + rs))
        }
    }
}

/// Simple-average RSI. The first bar contributes a zero delta, so the value is
/// defined from index `period - 1`. A window without any price change is `NaN`.
pub fn calculate_rsi(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut gains = Vec::with_capacity(n);
    let mut losses = Vec::with_capacity(n);
    for i in 0..n {
        let delta = if i == 0 { 0.0 } else { values[i] - values[i - 1] };
        gains.push(delta.max(0.0));
        losses.push((-delta).max(0.0));
    }

    let avg_gains = calculate_sma(&gains, period);
    let avg_losses = calculate_sma(&losses, period);
    avg_gains
        .iter()
        .zip(avg_losses.iter())
        .map(|(&gain, &loss)| {
            if gain.is_nan() || loss.is_nan() {
                f64::NAN
            } else {
                rsi_from_avgs(gain, loss).unwrap_or(f64::NAN)
            }
        })
        .collect()
}

fn true_range(high: f64, low: f64, prev_close: Option<f64>) -> f64 {
    match prev_close {
        Some(prev_close) => (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs()),
        None => high - low,
    }
}

pub fn calculate_true_range(highs: &[f64], lows: &[f64], closes: &[f64]) -> Vec<f64> {
    (0..highs.len())
        .map(|i| {
            let prev_close = if i > 0 { Some(closes[i - 1]) } else { None };
            true_range(highs[i], lows[i], prev_close)
        })
        .collect()
}

pub fn calculate_atr(highs: &[f64], lows: &[f64], closes: &[f64], period: usize) -> Vec<f64> {
    calculate_sma(&calculate_true_range(highs, lows, closes), period)
}

/// Rolling sample standard deviation (n - 1 denominator).
pub fn calculate_rolling_std(values: &[f64], period: usize) -> Vec<f64> {
    let mut std_values = vec![f64::NAN; values.len()];
    if period < 2 || values.len() < period {
        return std_values;
    }

    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let mean = window.iter().sum::<f64>() / period as f64;
        let variance =
            window.iter().map(|&v| (v - mean).powi(2)).sum::<f64>() / (period as f64 - 1.0);
        std_values[i] = variance.sqrt();
    }

    std_values
}

/// Returns `(upper, middle, lower)`.
pub fn calculate_bollinger_bands(
    values: &[f64],
    period: usize,
    std_dev: f64,
) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
    let middle = calculate_sma(values, period);
    let std_values = calculate_rolling_std(values, period);

    let upper = middle
        .iter()
        .zip(std_values.iter())
        .map(|(mid, std)| mid + std_dev * std)
        .collect();
    let lower = middle
        .iter()
        .zip(std_values.iter())
        .map(|(mid, std)| mid - std_dev * std)
        .collect();

    (upper, middle, lower)
}

pub fn closes(candles: &[Candle]) -> Vec<f64> {
    candles.iter().map(|c| c.close).collect()
}

pub fn calculate_atr_from_candles(candles: &[Candle], period: usize) -> Vec<f64> {
    let highs: Vec<f64> = candles.iter().map(|c| c.high).collect();
    let lows: Vec<f64> = candles.iter().map(|c| c.low).collect();
    calculate_atr(&highs, &lows, &closes(candles), period)
}

/// Fixed-capacity window with a running mean and sliding Welford variance.
#[derive(Debug, Clone)]
pub struct RollingWindow {
    values: VecDeque<f64>,
    capacity: usize,
    mean: f64,
    m2: f64,
}

impl RollingWindow {
    pub fn new(capacity: usize) -> Self {
        Self {
            values: VecDeque::with_capacity(capacity),
            capacity,
            mean: 0.0,
            m2: 0.0,
        }
    }

    pub fn push(&mut self, value: f64) {
        if self.capacity == 0 {
            return;
        }

        if self.values.len() < self.capacity {
            self.values.push_back(value);
            let n = self.values.len() as f64;
            let delta = value - self.mean;
            self.mean += delta / n;
            self.m2 += delta * (value - self.mean);
            return;
        }

        let Some(old) = self.values.pop_front() else {
            return;
        };
        self.values.push_back(value);
        let n = self.capacity as f64;
        let old_mean = self.mean;
        self.mean += (value - old) / n;
        self.m2 += (value - old) * (value - self.mean + old - old_mean);
        if self.m2 < 0.0 {
            self.m2 = 0.0;
        }
    }

    pub fn is_full(&self) -> bool {
        self.capacity > 0 && self.values.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.values.clear();
        self.mean = 0.0;
        self.m2 = 0.0;
    }

    pub fn mean(&self) -> Option<f64> {
        if self.values.is_empty() {
            None
        } else {
            Some(self.mean)
        }
    }

    pub fn sample_std(&self) -> Option<f64> {
        if self.values.len() < 2 {
            return None;
        }
        Some((self.m2 / (self.values.len() as f64 - 1.0)).sqrt())
    }
}

#[derive(Debug, Clone)]
pub struct RollingSma {
    window: RollingWindow,
}

impl RollingSma {
    pub fn new(period: usize) -> Self {
        Self {
            window: RollingWindow::new(period),
        }
    }

    pub fn push(&mut self, value: f64) {
        self.window.push(value);
    }

    pub fn value(&self) -> Option<f64> {
        if self.window.is_full() {
            self.window.mean()
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

#[derive(Debug, Clone)]
pub struct RollingRsi {
    gains: RollingWindow,
    losses: RollingWindow,
    prev_close: Option<f64>,
}

impl RollingRsi {
    pub fn new(period: usize) -> Self {
        Self {
            gains: RollingWindow::new(period),
            losses: RollingWindow::new(period),
            prev_close: None,
        }
    }

    pub fn push(&mut self, close: f64) {
        let delta = self.prev_close.map(|prev| close - prev).unwrap_or(0.0);
        self.gains.push(delta.max(0.0));
        self.losses.push((-delta).max(0.0));
        self.prev_close = Some(close);
    }

    /// Whether a full `period` of deltas has been seen.
    pub fn is_ready(&self) -> bool {
        self.gains.is_full()
    }

    /// `None` until ready, and on a window without any price change.
    pub fn value(&self) -> Option<f64> {
        if !self.is_ready() {
            return None;
        }
        let avg_gain = self.gains.mean()?;
        let avg_loss = self.losses.mean()?;
        rsi_from_avgs(avg_gain, avg_loss.max(0.0))
    }

    pub fn reset(&mut self) {
        self.gains.clear();
        self.losses.clear();
        self.prev_close = None;
    }
}

#[derive(Debug, Clone)]
pub struct RollingAtr {
    ranges: RollingSma,
    prev_close: Option<f64>,
}

impl RollingAtr {
    pub fn new(period: usize) -> Self {
        Self {
            ranges: RollingSma::new(period),
            prev_close: None,
        }
    }

    pub fn push(&mut self, candle: &Candle) {
        self.ranges
            .push(true_range(candle.high, candle.low, self.prev_close));
        self.prev_close = Some(candle.close);
    }

    pub fn value(&self) -> Option<f64> {
        self.ranges.value()
    }

    pub fn reset(&mut self) {
        self.ranges.reset();
        self.prev_close = None;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerBands {
    pub upper: f64,
    pub middle: f64,
    pub lower: f64,
}

#[derive(Debug, Clone)]
pub struct RollingBollinger {
    window: RollingWindow,
    std_dev: f64,
}

impl RollingBollinger {
    pub fn new(period: usize, std_dev: f64) -> Self {
        Self {
            window: RollingWindow::new(period),
            std_dev,
        }
    }

    pub fn push(&mut self, value: f64) {
        self.window.push(value);
    }

    pub fn value(&self) -> Option<BollingerBands> {
        if !self.window.is_full() {
            return None;
        }
        let middle = self.window.mean()?;
        let std = self.window.sample_std()?;
        Some(BollingerBands {
            upper: middle + self.std_dev * std,
            middle,
            lower: middle - self.std_dev * std,
        })
    }

    pub fn reset(&mut self) {
        self.window.clear();
    }
}

/// Indicator state that can be fed one candle at a time.
pub trait IncrementalIndicators {
    fn push(&mut self, candle: &Candle);
    fn reset(&mut self);
}

/// Keeps incremental indicator state aligned with a caller-supplied bar index.
///
/// Sequential indices cost one `push` each. A rewind (or the first call) replays the
/// window from the start, so the state always reflects `candles[..=index]`.
#[derive(Debug, Clone)]
pub struct IndicatorCursor<T> {
    state: T,
    last_index: Option<usize>,
}

impl<T: IncrementalIndicators> IndicatorCursor<T> {
    pub fn new(state: T) -> Self {
        Self {
            state,
            last_index: None,
        }
    }

    pub fn sync(&mut self, candles: &[Candle], index: usize) -> Option<&T> {
        if index >= candles.len() {
            return None;
        }

        let replay_from = match self.last_index {
            Some(last) if last == index => return Some(&self.state),
            Some(last) if last < index => last + 1,
            _ => {
                self.state.reset();
                0
            }
        };

        for candle in &candles[replay_from..=index] {
            self.state.push(candle);
        }
        self.last_index = Some(index);
        Some(&self.state)
    }

    pub fn last_index(&self) -> Option<usize> {
        self.last_index
    }
}
