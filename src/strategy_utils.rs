use crate::models::{SignalAction, StrategySignal};

/// Signals below this confidence are never acted on.
pub const MIN_CONFIDENCE: f64 = 0.5;

/// Trailing bars used for the average-volume filter.
pub const VOLUME_LOOKBACK: usize = 50;

/// Create a hold signal (default action when no trade signal is generated)
pub fn hold_signal(reason: impl Into<String>) -> StrategySignal {
    StrategySignal {
        action: SignalAction::Hold,
        confidence: 0.0,
        reason: reason.into(),
    }
}

/// Hold reasons for bars where the indicator history is too short.
pub const INSUFFICIENT_DATA: &str = "insufficient data";
pub const INDICATORS_NOT_READY: &str = "indicators not ready";

pub fn insufficient_data() -> StrategySignal {
    hold_signal(INSUFFICIENT_DATA)
}

pub fn indicators_not_ready() -> StrategySignal {
    hold_signal(INDICATORS_NOT_READY)
}

/// Whether a hold only reflects missing history rather than market conditions.
pub fn is_warmup_hold(signal: &StrategySignal) -> bool {
    signal.action == SignalAction::Hold
        && (signal.reason == INSUFFICIENT_DATA || signal.reason == INDICATORS_NOT_READY)
}

/// Create a buy signal with the given confidence, clamped to [0, 1]
pub fn buy_signal(confidence: f64, reason: impl Into<String>) -> StrategySignal {
    StrategySignal {
        action: SignalAction::Buy,
        confidence: clamp_confidence(confidence),
        reason: reason.into(),
    }
}

/// Create a sell signal with the given confidence, clamped to [0, 1]
pub fn sell_signal(confidence: f64, reason: impl Into<String>) -> StrategySignal {
    StrategySignal {
        action: SignalAction::Sell,
        confidence: clamp_confidence(confidence),
        reason: reason.into(),
    }
}

pub fn clamp_confidence(confidence: f64) -> f64 {
    if confidence.is_nan() {
        0.0
    } else {
        confidence.clamp(0.0, 1.0)
    }
}

/// Check if confidence meets the minimum threshold
pub fn meets_confidence_threshold(confidence: f64, min_confidence: f64) -> bool {
    confidence >= min_confidence - 1e-6
}

/// Shared acceptance rule: actionable, confident enough, and money to act with.
pub fn is_actionable(signal: &StrategySignal, balance: f64) -> bool {
    signal.action != SignalAction::Hold
        && meets_confidence_threshold(signal.confidence, MIN_CONFIDENCE)
        && balance > 0.0
}

/// Stop below and target above the entry, both scaled by ATR.
pub fn atr_stop_take(entry_price: f64, atr: f64, sl_multiplier: f64, tp_multiplier: f64) -> (f64, f64) {
    (
        entry_price - atr * sl_multiplier,
        entry_price + atr * tp_multiplier,
    )
}
