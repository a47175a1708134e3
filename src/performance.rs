use crate::models::*;
use chrono::NaiveDate;
use statrs::statistics::Statistics;

/// Inputs for the whole-session report.
pub struct SessionSnapshot<'a> {
    pub closed_trades: &'a [Trade],
    pub open_trades: usize,
    pub account_size: f64,
    pub balance: f64,
    pub equity: f64,
    pub peak_equity: f64,
    pub worst_drawdown_percent: f64,
    pub equity_curve: &'a [EquityPoint],
}

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    pub fn daily_report(
        date: Option<NaiveDate>,
        daily_trades: &[Trade],
        daily_pnl: f64,
        account_size: f64,
        balance: f64,
        equity: f64,
    ) -> DailyReport {
        if daily_trades.is_empty() {
            return DailyReport {
                date,
                trades: 0,
                wins: 0,
                losses: 0,
                win_rate: 0.0,
                daily_pnl: 0.0,
                daily_pnl_percent: 0.0,
                balance,
                equity,
            };
        }

        let wins = daily_trades.iter().filter(|t| t.is_win()).count();
        let trades = daily_trades.len();

        DailyReport {
            date,
            trades,
            wins,
            losses: trades - wins,
            win_rate: wins as f64 / trades as f64 * 100.0,
            daily_pnl,
            daily_pnl_percent: Self::percent_of(daily_pnl, account_size),
            balance,
            equity,
        }
    }

    pub fn overall_report(session: &SessionSnapshot<'_>) -> OverallReport {
        let max_drawdown_percent =
            crate::trading_rules::drawdown_percent(session.equity, session.peak_equity);
        let sharpe_ratio = Self::calculate_sharpe_ratio(session.equity_curve);

        if session.closed_trades.is_empty() {
            return OverallReport {
                total_trades: 0,
                wins: 0,
                losses: 0,
                win_rate: 0.0,
                profit_factor: 0.0,
                total_pnl: 0.0,
                total_pnl_percent: 0.0,
                avg_win: 0.0,
                avg_loss: 0.0,
                max_win: 0.0,
                max_loss: 0.0,
                balance: session.balance,
                equity: session.equity,
                max_drawdown_percent,
                worst_drawdown_percent: session.worst_drawdown_percent,
                sharpe_ratio,
                open_trades: session.open_trades,
            };
        }

        let mut winning_pnls = Vec::new();
        let mut losing_pnls = Vec::new();
        for trade in session.closed_trades {
            if trade.is_win() {
                winning_pnls.push(trade.pnl());
            } else {
                losing_pnls.push(trade.pnl());
            }
        }

        let total_trades = session.closed_trades.len();
        let total_pnl: f64 = session.closed_trades.iter().map(|t| t.pnl()).sum();
        let gross_profit: f64 = winning_pnls.iter().sum();
        let gross_loss = losing_pnls.iter().sum::<f64>().abs();

        let profit_factor = if gross_loss > 0.0 {
            gross_profit / gross_loss
        } else {
            0.0
        };
        let avg_win = if winning_pnls.is_empty() {
            0.0
        } else {
            gross_profit / winning_pnls.len() as f64
        };
        let avg_loss = if losing_pnls.is_empty() {
            0.0
        } else {
            -(gross_loss / losing_pnls.len() as f64)
        };
        let max_win = winning_pnls
            .iter()
            .copied()
            .fold(None, |best: Option<f64>, pnl| Some(best.map_or(pnl, |b| b.max(pnl))))
            .unwrap_or(0.0);
        let max_loss = losing_pnls
            .iter()
            .copied()
            .fold(None, |worst: Option<f64>, pnl| Some(worst.map_or(pnl, |w| w.min(pnl))))
            .unwrap_or(0.0);

        OverallReport {
            total_trades,
            wins: winning_pnls.len(),
            losses: losing_pnls.len(),
            win_rate: winning_pnls.len() as f64 / total_trades as f64 * 100.0,
            profit_factor,
            total_pnl,
            total_pnl_percent: Self::percent_of(total_pnl, session.account_size),
            avg_win,
            avg_loss,
            max_win,
            max_loss,
            balance: session.balance,
            equity: session.equity,
            max_drawdown_percent,
            worst_drawdown_percent: session.worst_drawdown_percent,
            sharpe_ratio,
            open_trades: session.open_trades,
        }
    }

    /// Per-bar Sharpe ratio of equity returns, not annualized.
    pub fn calculate_sharpe_ratio(equity_curve: &[EquityPoint]) -> f64 {
        if equity_curve.len() < 3 {
            return 0.0;
        }

        let returns: Vec<f64> = equity_curve
            .windows(2)
            .map(|window| {
                let prev_value = window[0].equity;
                let curr_value = window[1].equity;
                if prev_value > 0.0 {
                    (curr_value - prev_value) / prev_value
                } else {
                    0.0
                }
            })
            .collect();

        let mean_return = returns.clone().mean();
        let std_dev = returns.std_dev();

        if !std_dev.is_finite() || std_dev <= f64::EPSILON || !mean_return.is_finite() {
            return 0.0;
        }

        mean_return / std_dev
    }

    fn percent_of(value: f64, base: f64) -> f64 {
        if base == 0.0 {
            0.0
        } else {
            value / base * 100.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Duration, TimeZone, Utc};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap()
    }

    fn closed_trade(id: u64, entry: f64, exit: f64, quantity: f64) -> Trade {
        let mut trade = Trade {
            id: generate_trade_id(id),
            symbol: "BTC/USD".to_string(),
            entry_price: entry,
            entry_time: start(),
            quantity,
            stop_loss: entry * 0.95,
            take_profit: entry * 1.1,
            exit_price: None,
            exit_time: None,
            exit_reason: None,
        };
        trade.close(exit, start() + Duration::hours(1), ExitReason::SellSignal);
        trade
    }

    fn curve(equities: &[f64]) -> Vec<EquityPoint> {
        equities
            .iter()
            .enumerate()
            .map(|(i, &equity)| EquityPoint {
                date: start() + Duration::hours(i as i64),
                balance: equity,
                equity,
                open_trades: 0,
            })
            .collect()
    }

    fn snapshot<'a>(trades: &'a [Trade], equity_curve: &'a [EquityPoint]) -> SessionSnapshot<'a> {
        SessionSnapshot {
            closed_trades: trades,
            open_trades: 0,
            account_size: 10_000.0,
            balance: 10_000.0,
            equity: 10_000.0,
            peak_equity: 10_000.0,
            worst_drawdown_percent: 0.0,
            equity_curve,
        }
    }

    #[test]
    fn empty_history_reports_zeros() {
        let report = PerformanceCalculator::overall_report(&snapshot(&[], &[]));
        assert_eq!(report.total_trades, 0);
        assert_eq!(report.profit_factor, 0.0);
        assert_eq!(report.total_pnl, 0.0);
        assert_eq!(report.total_pnl_percent, 0.0);
        assert_eq!(report.avg_win, 0.0);
        assert_eq!(report.avg_loss, 0.0);
        assert_eq!(report.max_win, 0.0);
        assert_eq!(report.max_loss, 0.0);
        assert_eq!(report.balance, 10_000.0);
        assert_eq!(report.sharpe_ratio, 0.0);
    }

    #[test]
    fn overall_report_aggregates_wins_and_losses() {
        let trades = vec![
            closed_trade(1, 100.0, 110.0, 5.0), // +50
            closed_trade(2, 100.0, 95.0, 5.0),  // -25
            closed_trade(3, 100.0, 130.0, 1.0), // +30
            closed_trade(4, 100.0, 100.0, 2.0), // 0, counted as a loss
        ];
        let report = PerformanceCalculator::overall_report(&snapshot(&trades, &[]));

        assert_eq!(report.total_trades, 4);
        assert_eq!(report.wins, 2);
        assert_eq!(report.losses, 2);
        assert!((report.win_rate - 50.0).abs() < 1e-9);
        assert!((report.total_pnl - 55.0).abs() < 1e-9);
        assert!((report.total_pnl_percent - 0.55).abs() < 1e-9);
        assert!((report.profit_factor - 80.0 / 25.0).abs() < 1e-9);
        assert!((report.avg_win - 40.0).abs() < 1e-9);
        assert!((report.avg_loss + 12.5).abs() < 1e-9);
        assert!((report.max_win - 50.0).abs() < 1e-9);
        assert!((report.max_loss + 25.0).abs() < 1e-9);
    }

    #[test]
    fn profit_factor_is_zero_without_losses() {
        let trades = vec![closed_trade(1, 100.0, 110.0, 1.0)];
        let report = PerformanceCalculator::overall_report(&snapshot(&trades, &[]));
        assert_eq!(report.profit_factor, 0.0);
        assert_eq!(report.avg_loss, 0.0);
        assert_eq!(report.max_loss, 0.0);
    }

    #[test]
    fn daily_report_uses_account_size_for_percent() {
        let trades = vec![
            closed_trade(1, 100.0, 110.0, 5.0),
            closed_trade(2, 100.0, 95.0, 5.0),
        ];
        let date = NaiveDate::from_ymd_opt(2023, 1, 1);
        let report =
            PerformanceCalculator::daily_report(date, &trades, 25.0, 10_000.0, 10_025.0, 10_025.0);
        assert_eq!(report.trades, 2);
        assert_eq!(report.wins, 1);
        assert_eq!(report.losses, 1);
        assert!((report.win_rate - 50.0).abs() < 1e-9);
        assert!((report.daily_pnl_percent - 0.25).abs() < 1e-9);

        let empty = PerformanceCalculator::daily_report(date, &[], 0.0, 10_000.0, 9_000.0, 9_500.0);
        assert_eq!(empty.trades, 0);
        assert_eq!(empty.win_rate, 0.0);
        assert_eq!(empty.balance, 9_000.0);
        assert_eq!(empty.equity, 9_500.0);
    }

    #[test]
    fn sharpe_is_zero_for_flat_equity_and_positive_for_steady_gains() {
        assert_eq!(
            PerformanceCalculator::calculate_sharpe_ratio(&curve(&[100.0, 100.0, 100.0, 100.0])),
            0.0
        );
        let rising = curve(&[100.0, 101.0, 103.0, 104.0, 106.0]);
        assert!(PerformanceCalculator::calculate_sharpe_ratio(&rising) > 0.0);
    }
}
