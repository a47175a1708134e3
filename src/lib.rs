pub mod commands;
pub mod config;
pub mod engine;
pub mod indicators;
pub mod models;
pub mod optimizer;
pub mod orders;
pub mod param_utils;
pub mod performance;
pub mod sample_data;
pub mod strategy;
pub mod strategy_utils;
pub mod trading_rules;
