use crate::commands::session::{load_candles, load_config};
use crate::engine::TradingEngine;
use anyhow::{ensure, Result};
use log::info;
use std::path::PathBuf;

pub struct BacktestOptions {
    pub config_file: Option<PathBuf>,
    pub strategy: Option<String>,
    pub data_file: Option<PathBuf>,
    pub bars: usize,
    pub seed: u64,
    pub start_index: usize,
    pub trade_limit: usize,
}

fn print_section(title: &str) {
    println!("\n{}", "=".repeat(60));
    println!("{}", title);
    println!("{}", "=".repeat(60));
}

pub fn run(options: &BacktestOptions) -> Result<()> {
    let config = load_config(options.config_file.as_deref(), options.strategy.as_deref())?;
    let candles = load_candles(options.data_file.as_deref(), options.bars, options.seed)?;
    ensure!(
        options.start_index < candles.len(),
        "Start index {} is beyond the {} available candles",
        options.start_index,
        candles.len()
    );

    let mut engine = TradingEngine::from_config(config)?;
    info!(
        "Trading engine initialized (session {}, strategy {})",
        engine.session_id(),
        engine.strategy_name()
    );

    let summary = engine.run(&candles, options.start_index);

    print_section("DAILY REPORT");
    println!("{}", serde_json::to_string_pretty(&engine.daily_report())?);

    print_section("OVERALL REPORT");
    println!("{}", serde_json::to_string_pretty(&engine.overall_report())?);

    print_section("RUN SUMMARY");
    println!("{}", serde_json::to_string_pretty(&summary)?);

    print_section("TRADES CLOSED");
    for trade in engine.trade_summaries(options.trade_limit) {
        let exit_time = trade
            .exit_time
            .map(|t| t.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        let reason = trade
            .exit_reason
            .map(|r| r.to_string())
            .unwrap_or_else(|| "-".to_string());
        println!("\nTrade: {}", trade.id);
        println!(
            "  Entry: {:.2} @ {}",
            trade.entry_price,
            trade.entry_time.to_rfc3339()
        );
        println!("  Exit: {:.2} @ {} ({})", trade.exit_price, exit_time, reason);
        println!("  P&L: {:.2} ({:.2}%)", trade.pnl, trade.pnl_percent);
        println!("  RR: {:.2}", trade.risk_reward);
        println!("  Size: {:.4}", trade.quantity);
    }

    Ok(())
}
