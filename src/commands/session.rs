use crate::config::{BotConfig, StrategyKind};
use crate::models::Candle;
use crate::sample_data::{generate_candles, load_candles_json, SampleDataSpec};
use anyhow::{Context, Result};
use log::info;
use std::env;
use std::path::Path;

pub const STRATEGY_ENV_VAR: &str = "STRATEGY";

/// Config file (or defaults), with the strategy taken from the flag, then the
/// `STRATEGY` environment variable, then the file.
pub fn load_config(config_file: Option<&Path>, strategy_flag: Option<&str>) -> Result<BotConfig> {
    let mut config = match config_file {
        Some(path) => BotConfig::from_json_file(path)?,
        None => BotConfig::default(),
    };

    let env_strategy = env::var(STRATEGY_ENV_VAR).ok();
    let requested = strategy_flag.or(env_strategy.as_deref());
    if let Some(raw) = requested {
        let kind = StrategyKind::parse(raw).context("Invalid strategy selection")?;
        config = config.with_strategy(kind);
    }

    config.validate()?;
    info!("Selected strategy: {}", config.strategy.id());
    Ok(config)
}

pub fn load_candles(data_file: Option<&Path>, bars: usize, seed: u64) -> Result<Vec<Candle>> {
    match data_file {
        Some(path) => {
            let candles = load_candles_json(path)?;
            info!("Loaded {} candles from {}", candles.len(), path.display());
            Ok(candles)
        }
        None => {
            let candles = generate_candles(&SampleDataSpec::new(bars, seed))?;
            info!("Generated {} sample candles (seed {})", candles.len(), seed);
            Ok(candles)
        }
    }
}
