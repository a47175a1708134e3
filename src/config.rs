use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    #[error("{field} must be greater than zero (value: {value})")]
    NonPositive { field: &'static str, value: f64 },
    #[error("{field} must be within [{min}, {max}] (value: {value})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    #[error("fast MA period ({fast}) must be shorter than slow MA period ({slow})")]
    MovingAveragePeriods { fast: usize, slow: usize },
    #[error("RSI oversold level ({oversold}) must be below overbought level ({overbought})")]
    RsiThresholds { oversold: f64, overbought: f64 },
    #[error("slippage rate ({rate}) must be between 0 and max slippage ({max})")]
    SlippageRate { rate: f64, max: f64 },
    #[error("symbol must not be empty")]
    EmptySymbol,
    #[error("unknown strategy '{0}' (expected macrossover_rsi or mean_reversion)")]
    UnknownStrategy(String),
    #[error("unsupported order type '{0}' (only market orders are simulated)")]
    UnsupportedOrderType(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyKind {
    #[serde(rename = "macrossover_rsi", alias = "ma_crossover_rsi")]
    TrendCrossoverRsi,
    #[serde(rename = "mean_reversion", alias = "meanreversion", alias = "mean_rev")]
    MeanReversion,
}

impl StrategyKind {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "macrossover_rsi" | "ma_crossover_rsi" => Ok(Self::TrendCrossoverRsi),
            "mean_reversion" | "meanreversion" | "mean_rev" => Ok(Self::MeanReversion),
            other => Err(ConfigError::UnknownStrategy(other.to_string())),
        }
    }

    pub fn id(self) -> &'static str {
        match self {
            Self::TrendCrossoverRsi => "macrossover_rsi",
            Self::MeanReversion => "mean_reversion",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum OrderType {
    Market,
}

impl OrderType {
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "market" => Ok(Self::Market),
            other => Err(ConfigError::UnsupportedOrderType(other.to_string())),
        }
    }
}

impl TryFrom<String> for OrderType {
    type Error = ConfigError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

/// Session configuration. Immutable once handed to an engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BotConfig {
    // Strategy parameters
    pub fast_ma_period: usize,
    pub slow_ma_period: usize,
    pub rsi_period: usize,
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,

    // Risk management
    pub account_size: f64,
    pub risk_per_trade: f64,
    pub max_position_size: f64,
    pub max_daily_loss: f64,
    pub max_drawdown: f64,
    pub enforce_risk_limits: bool,

    // Trade management
    pub rr_ratio: f64,
    pub atr_multiplier_sl: f64,
    pub atr_multiplier_tp: f64,
    pub atr_period: usize,

    // Execution
    pub order_type: OrderType,
    pub max_slippage: f64,
    pub slippage_rate: f64,
    pub symbol: String,

    pub strategy: StrategyKind,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            fast_ma_period: 20,
            slow_ma_period: 50,
            rsi_period: 14,
            rsi_overbought: 70.0,
            rsi_oversold: 30.0,
            account_size: 10_000.0,
            risk_per_trade: 0.02,
            max_position_size: 0.05,
            max_daily_loss: 0.05,
            max_drawdown: 0.20,
            enforce_risk_limits: true,
            rr_ratio: 2.0,
            atr_multiplier_sl: 1.5,
            atr_multiplier_tp: 2.0,
            atr_period: 14,
            order_type: OrderType::Market,
            max_slippage: 0.01,
            slippage_rate: 0.0,
            symbol: "BTC/USD".to_string(),
            strategy: StrategyKind::TrendCrossoverRsi,
        }
    }
}

impl BotConfig {
    /// Builds a config from a camelCase parameter map, falling back to defaults.
    pub fn from_parameters(parameters: &HashMap<String, f64>) -> Self {
        use crate::param_utils::*;

        let defaults = Self::default();
        Self {
            fast_ma_period: get_param_usize(parameters, "fastMaPeriod", defaults.fast_ma_period),
            slow_ma_period: get_param_usize(parameters, "slowMaPeriod", defaults.slow_ma_period),
            rsi_period: get_param_usize(parameters, "rsiPeriod", defaults.rsi_period),
            rsi_overbought: get_param_f64(parameters, "rsiOverbought", defaults.rsi_overbought),
            rsi_oversold: get_param_f64(parameters, "rsiOversold", defaults.rsi_oversold),
            account_size: get_param_f64(parameters, "accountSize", defaults.account_size),
            risk_per_trade: get_param_f64(parameters, "riskPerTrade", defaults.risk_per_trade),
            max_position_size: get_param_f64(
                parameters,
                "maxPositionSize",
                defaults.max_position_size,
            ),
            max_daily_loss: get_param_f64(parameters, "maxDailyLoss", defaults.max_daily_loss),
            max_drawdown: get_param_f64(parameters, "maxDrawdown", defaults.max_drawdown),
            enforce_risk_limits: coerce_binary_param(
                get_param_f64(parameters, "enforceRiskLimits", 1.0),
                1.0,
            ) >= 0.5,
            rr_ratio: get_param_f64(parameters, "rrRatio", defaults.rr_ratio),
            atr_multiplier_sl: get_param_f64(
                parameters,
                "atrMultiplierSl",
                defaults.atr_multiplier_sl,
            ),
            atr_multiplier_tp: get_param_f64(
                parameters,
                "atrMultiplierTp",
                defaults.atr_multiplier_tp,
            ),
            atr_period: get_param_usize(parameters, "atrPeriod", defaults.atr_period),
            order_type: defaults.order_type,
            max_slippage: get_param_f64(parameters, "maxSlippage", defaults.max_slippage),
            slippage_rate: get_param_f64(parameters, "slippageRate", defaults.slippage_rate),
            symbol: defaults.symbol,
            strategy: defaults.strategy,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).context("Invalid config JSON")?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_json_str(&raw).with_context(|| format!("Invalid config in {}", path.display()))
    }

    /// Returns a copy with the strategy overridden.
    pub fn with_strategy(mut self, strategy: StrategyKind) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive_period("fast_ma_period", self.fast_ma_period)?;
        require_positive_period("slow_ma_period", self.slow_ma_period)?;
        require_positive_period("rsi_period", self.rsi_period)?;
        require_positive_period("atr_period", self.atr_period)?;
        if self.fast_ma_period >= self.slow_ma_period {
            return Err(ConfigError::MovingAveragePeriods {
                fast: self.fast_ma_period,
                slow: self.slow_ma_period,
            });
        }

        require_in_range("rsi_oversold", self.rsi_oversold, 0.0, 100.0)?;
        require_in_range("rsi_overbought", self.rsi_overbought, 0.0, 100.0)?;
        if self.rsi_oversold >= self.rsi_overbought {
            return Err(ConfigError::RsiThresholds {
                oversold: self.rsi_oversold,
                overbought: self.rsi_overbought,
            });
        }

        require_positive("account_size", self.account_size)?;
        require_fraction("risk_per_trade", self.risk_per_trade)?;
        require_fraction("max_position_size", self.max_position_size)?;
        require_fraction("max_daily_loss", self.max_daily_loss)?;
        require_fraction("max_drawdown", self.max_drawdown)?;

        require_positive("rr_ratio", self.rr_ratio)?;
        require_positive("atr_multiplier_sl", self.atr_multiplier_sl)?;
        require_positive("atr_multiplier_tp", self.atr_multiplier_tp)?;

        require_in_range("max_slippage", self.max_slippage, 0.0, 1.0)?;
        if !self.slippage_rate.is_finite()
            || self.slippage_rate < 0.0
            || self.slippage_rate > self.max_slippage
        {
            return Err(ConfigError::SlippageRate {
                rate: self.slippage_rate,
                max: self.max_slippage,
            });
        }

        if self.symbol.trim().is_empty() {
            return Err(ConfigError::EmptySymbol);
        }

        Ok(())
    }
}

fn require_positive_period(field: &'static str, value: usize) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::NonPositive { field, value: 0.0 });
    }
    Ok(())
}

fn require_positive(field: &'static str, value: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value <= 0.0 {
        return Err(ConfigError::NonPositive { field, value });
    }
    Ok(())
}

fn require_in_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if !value.is_finite() || value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

fn require_fraction(field: &'static str, value: f64) -> Result<(), ConfigError> {
    require_positive(field, value)?;
    require_in_range(field, value, 0.0, 1.0)
}
