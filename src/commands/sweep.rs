use crate::commands::session::{load_candles, load_config};
use crate::optimizer::{build_ma_grid, run_parameter_sweep, ParameterRange, SweepObjective};
use anyhow::Result;
use log::info;
use std::path::PathBuf;

pub struct SweepOptions {
    pub config_file: Option<PathBuf>,
    pub strategy: Option<String>,
    pub data_file: Option<PathBuf>,
    pub bars: usize,
    pub seed: u64,
    pub start_index: usize,
    pub fast: ParameterRange,
    pub slow: ParameterRange,
    pub objective: SweepObjective,
    pub top: usize,
}

pub fn run(options: &SweepOptions) -> Result<()> {
    let config = load_config(options.config_file.as_deref(), options.strategy.as_deref())?;
    let candles = load_candles(options.data_file.as_deref(), options.bars, options.seed)?;

    let grid = build_ma_grid(&options.fast, &options.slow);
    info!("Built grid of {} fast/slow combinations", grid.len());

    let results = run_parameter_sweep(
        &config,
        &grid,
        &candles,
        options.start_index,
        options.objective,
        true,
    )?;

    println!(
        "\n{:>4} {:>5} {:>5} {:>7} {:>8} {:>12} {:>8} {:>8} {:>9}",
        "rank", "fast", "slow", "trades", "win%", "pnl", "pf", "maxdd%", "sharpe"
    );
    for (rank, result) in results.iter().take(options.top).enumerate() {
        println!(
            "{:>4} {:>5} {:>5} {:>7} {:>8.2} {:>12.2} {:>8.2} {:>8.2} {:>9.4}",
            rank + 1,
            result.fast_ma_period,
            result.slow_ma_period,
            result.total_trades,
            result.win_rate,
            result.total_pnl,
            result.profit_factor,
            result.max_drawdown_percent,
            result.sharpe_ratio
        );
    }

    Ok(())
}
