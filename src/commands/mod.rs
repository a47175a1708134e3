pub mod backtest;
pub mod session;
pub mod sweep;
