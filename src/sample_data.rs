use crate::models::Candle;
use anyhow::{anyhow, ensure, Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use statrs::distribution::Normal;
use std::fs;
use std::path::Path;

const MIN_PRICE: f64 = 0.01;

/// Parameters of the synthetic hourly random walk.
#[derive(Debug, Clone)]
pub struct SampleDataSpec {
    pub bars: usize,
    pub seed: u64,
    pub start: DateTime<Utc>,
    pub interval: Duration,
    pub base_price: f64,
    pub step_std: f64,
    pub base_volume: f64,
    pub volume_jitter: f64,
}

impl SampleDataSpec {
    pub fn new(bars: usize, seed: u64) -> Self {
        Self {
            bars,
            seed,
            start: Utc
                .with_ymd_and_hms(2023, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
            interval: Duration::hours(1),
            base_price: 100.0,
            step_std: 0.5,
            base_volume: 1_000_000.0,
            volume_jitter: 100_000.0,
        }
    }
}

/// Open, high, low and close each follow their own cumulative normal walk; high and
/// low are then widened to contain the open and close.
pub fn generate_candles(spec: &SampleDataSpec) -> Result<Vec<Candle>> {
    let step = Normal::new(0.0, spec.step_std)
        .map_err(|e| anyhow!("Invalid step deviation {}: {}", spec.step_std, e))?;
    let mut rng = StdRng::seed_from_u64(spec.seed);

    let mut walks = [0.0_f64; 4];
    let mut candles = Vec::with_capacity(spec.bars);

    for i in 0..spec.bars {
        for walk in walks.iter_mut() {
            *walk += rng.sample(step);
        }
        let open = (spec.base_price + walks[0]).max(MIN_PRICE);
        let high = (spec.base_price + 2.0 + walks[1]).max(MIN_PRICE);
        let low = (spec.base_price - 2.0 + walks[2]).max(MIN_PRICE);
        let close = (spec.base_price + walks[3]).max(MIN_PRICE);
        let volume = if spec.volume_jitter > 0.0 {
            spec.base_volume + rng.gen_range(-spec.volume_jitter..spec.volume_jitter)
        } else {
            spec.base_volume
        };

        candles.push(Candle {
            date: spec.start + spec.interval * i as i32,
            open,
            high: high.max(close).max(open),
            low: low.min(close).min(open),
            close,
            volume: volume.max(0.0),
        });
    }

    Ok(candles)
}

/// Loads a JSON array of candles, oldest first.
pub fn load_candles_json(path: &Path) -> Result<Vec<Candle>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("Failed to read candle file {}", path.display()))?;
    let candles: Vec<Candle> = serde_json::from_str(&raw)
        .with_context(|| format!("Invalid candle JSON in {}", path.display()))?;

    ensure!(
        candles.windows(2).all(|pair| pair[0].date < pair[1].date),
        "Candles in {} must be sorted by strictly increasing date",
        path.display()
    );
    Ok(candles)
}
