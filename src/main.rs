use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use log::info;
use papertrader::commands::{
    backtest::{self, BacktestOptions},
    sweep::{self, SweepOptions},
};
use papertrader::optimizer::{ParameterRange, SweepObjective};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "papertrader")]
#[command(about = "Single-instrument paper trading and backtesting engine")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SessionArgs {
    /// JSON config file (fields default when omitted)
    #[arg(long = "config", value_name = "FILE")]
    config_file: Option<PathBuf>,
    /// Strategy id: macrossover_rsi or mean_reversion (falls back to $STRATEGY)
    #[arg(long)]
    strategy: Option<String>,
    /// JSON array of candles to replay instead of generated sample data
    #[arg(long = "data", value_name = "FILE")]
    data_file: Option<PathBuf>,
    /// Number of generated sample bars
    #[arg(long, default_value_t = 500)]
    bars: usize,
    /// Seed for generated sample data
    #[arg(long, default_value_t = 42)]
    seed: u64,
    /// First bar index to trade on; earlier bars are indicator history
    #[arg(long = "start", default_value_t = 200)]
    start_index: usize,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay one session and print the daily, overall and trade reports
    Run {
        #[command(flatten)]
        session: SessionArgs,
        /// Number of closed trades to print
        #[arg(long, default_value_t = 10)]
        trades: usize,
    },
    /// Grid-search fast/slow moving-average periods in parallel
    Sweep {
        #[command(flatten)]
        session: SessionArgs,
        #[arg(long, default_value_t = 5.0)]
        fast_min: f64,
        #[arg(long, default_value_t = 30.0)]
        fast_max: f64,
        #[arg(long, default_value_t = 5.0)]
        fast_step: f64,
        #[arg(long, default_value_t = 20.0)]
        slow_min: f64,
        #[arg(long, default_value_t = 100.0)]
        slow_max: f64,
        #[arg(long, default_value_t = 10.0)]
        slow_step: f64,
        /// Ranking objective
        #[arg(long, value_enum, default_value_t = SweepObjective::TotalPnl)]
        objective: SweepObjective,
        /// Number of ranked results to print
        #[arg(long, default_value_t = 10)]
        top: usize,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let Cli { command } = Cli::parse();

    info!("Starting papertrader. Simulated fills only; no orders reach an exchange.");

    match command {
        Commands::Run { session, trades } => {
            backtest::run(&BacktestOptions {
                config_file: session.config_file,
                strategy: session.strategy,
                data_file: session.data_file,
                bars: session.bars,
                seed: session.seed,
                start_index: session.start_index,
                trade_limit: trades,
            })?;
        }
        Commands::Sweep {
            session,
            fast_min,
            fast_max,
            fast_step,
            slow_min,
            slow_max,
            slow_step,
            objective,
            top,
        } => {
            sweep::run(&SweepOptions {
                config_file: session.config_file,
                strategy: session.strategy,
                data_file: session.data_file,
                bars: session.bars,
                seed: session.seed,
                start_index: session.start_index,
                fast: ParameterRange {
                    min: fast_min,
                    max: fast_max,
                    step: fast_step,
                },
                slow: ParameterRange {
                    min: slow_min,
                    max: slow_max,
                    step: slow_step,
                },
                objective,
                top,
            })?;
        }
    }

    Ok(())
}
