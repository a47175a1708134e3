use crate::config::BotConfig;
use crate::engine::TradingEngine;
use crate::models::Candle;
use crate::param_utils::get_param_usize;
use anyhow::{ensure, Result};
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParameterRange {
    pub min: f64,
    pub max: f64,
    pub step: f64,
}

impl ParameterRange {
    pub fn values(&self) -> Vec<f64> {
        if !self.step.is_finite() || self.step <= 0.0 || self.max < self.min {
            return vec![self.min];
        }
        let count = ((self.max - self.min) / self.step + 1e-9).floor() as usize + 1;
        (0..count)
            .map(|i| self.min + self.step * i as f64)
            .collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SweepObjective {
    TotalPnl,
    Sharpe,
}

#[derive(Debug, Clone, Serialize)]
pub struct SweepResult {
    pub parameters: HashMap<String, f64>,
    pub fast_ma_period: usize,
    pub slow_ma_period: usize,
    pub total_trades: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub total_pnl_percent: f64,
    pub profit_factor: f64,
    pub max_drawdown_percent: f64,
    pub sharpe_ratio: f64,
    pub equity: f64,
}

pub(crate) fn parameter_signature(parameters: &HashMap<String, f64>) -> String {
    let mut sorted: Vec<_> = parameters.iter().collect();
    sorted.sort_by(|a, b| a.0.cmp(b.0));
    format!("{:?}", sorted)
}

/// Every fast/slow combination with fast strictly below slow.
pub fn build_ma_grid(fast: &ParameterRange, slow: &ParameterRange) -> Vec<HashMap<String, f64>> {
    let mut grid = Vec::new();
    for fast_value in fast.values() {
        for slow_value in slow.values() {
            if fast_value.round() >= slow_value.round() || fast_value < 1.0 {
                continue;
            }
            let mut parameters = HashMap::new();
            parameters.insert("fastMaPeriod".to_string(), fast_value.round());
            parameters.insert("slowMaPeriod".to_string(), slow_value.round());
            grid.push(parameters);
        }
    }
    grid.sort_by_key(parameter_signature);
    grid.dedup_by_key(|p| parameter_signature(p));
    grid
}

fn apply_parameters(base: &BotConfig, parameters: &HashMap<String, f64>) -> BotConfig {
    BotConfig {
        fast_ma_period: get_param_usize(parameters, "fastMaPeriod", base.fast_ma_period),
        slow_ma_period: get_param_usize(parameters, "slowMaPeriod", base.slow_ma_period),
        ..base.clone()
    }
}

fn objective_score(result: &SweepResult, objective: SweepObjective) -> f64 {
    let score = match objective {
        SweepObjective::TotalPnl => result.total_pnl,
        SweepObjective::Sharpe => result.sharpe_ratio,
    };
    if score.is_finite() {
        score
    } else {
        f64::NEG_INFINITY
    }
}

fn run_single(
    base: &BotConfig,
    parameters: &HashMap<String, f64>,
    candles: &[Candle],
    start_index: usize,
) -> Option<SweepResult> {
    let config = apply_parameters(base, parameters);
    let mut engine = match TradingEngine::from_config(config) {
        Ok(engine) => engine,
        Err(err) => {
            warn!(
                "Skipping parameters {}: {}",
                parameter_signature(parameters),
                err
            );
            return None;
        }
    };
    engine.run(candles, start_index);

    let report = engine.overall_report();
    Some(SweepResult {
        parameters: parameters.clone(),
        fast_ma_period: engine.config().fast_ma_period,
        slow_ma_period: engine.config().slow_ma_period,
        total_trades: report.total_trades,
        win_rate: report.win_rate,
        total_pnl: report.total_pnl,
        total_pnl_percent: report.total_pnl_percent,
        profit_factor: report.profit_factor,
        max_drawdown_percent: report.worst_drawdown_percent,
        sharpe_ratio: report.sharpe_ratio,
        equity: report.equity,
    })
}

/// Runs one isolated session per grid point in parallel and returns the results
/// best first.
pub fn run_parameter_sweep(
    base: &BotConfig,
    grid: &[HashMap<String, f64>],
    candles: &[Candle],
    start_index: usize,
    objective: SweepObjective,
    show_progress: bool,
) -> Result<Vec<SweepResult>> {
    ensure!(!grid.is_empty(), "Parameter grid is empty");
    ensure!(
        start_index < candles.len(),
        "Start index {} is beyond the {} available candles",
        start_index,
        candles.len()
    );

    info!(
        "Sweeping {} parameter combinations over {} bars ({} strategy)",
        grid.len(),
        candles.len() - start_index,
        base.strategy.id()
    );
    let started = Instant::now();

    let pb = if show_progress {
        ProgressBar::new(grid.len() as u64)
    } else {
        ProgressBar::hidden()
    };
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")?
            .progress_chars("#>-"),
    );

    let mut results: Vec<SweepResult> = grid
        .par_iter()
        .filter_map(|parameters| {
            let result = run_single(base, parameters, candles, start_index);
            pb.inc(1);
            result
        })
        .collect();

    let failed = grid.len() - results.len();
    if failed > 0 {
        warn!("Sweep completed with {} rejected combinations", failed);
        pb.finish_with_message("Sweep completed with errors");
    } else {
        pb.finish_with_message("Sweep completed");
    }

    results.sort_by(|a, b| {
        objective_score(b, objective)
            .partial_cmp(&objective_score(a, objective))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.fast_ma_period.cmp(&b.fast_ma_period))
            .then_with(|| a.slow_ma_period.cmp(&b.slow_ma_period))
    });

    if let Some(best) = results.first() {
        info!(
            "Best of {} in {:.1}s: fast={} slow={} pnl={:.2} sharpe={:.4}",
            results.len(),
            started.elapsed().as_secs_f64(),
            best.fast_ma_period,
            best.slow_ma_period,
            best.total_pnl,
            best.sharpe_ratio
        );
    }

    Ok(results)
}
