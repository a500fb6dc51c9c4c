use crate::markets::ANNUAL_FACTOR;
use crate::metrics::timeseries::{calculate_curve, max_drawdown};
use crate::series::TimeSeries;
use chrono::NaiveDate;
use prettytable::{Cell, Row, Table};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;

//summary metrics for a backtested return series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryMetrics {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub n_periods: usize,
    pub total_return: f64,
    pub annualized_return: f64,
    pub annualized_vol: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    pub hit_rate: f64,
    pub best_period: f64,
    pub worst_period: f64,
}

impl SummaryMetrics {
    //calculate summary metrics from a per-period return series
    pub fn from_returns(returns: &TimeSeries) -> Self {
        let curve = calculate_curve(returns);
        let values: Vec<f64> = returns
            .values()
            .iter()
            .map(|&v| if v.is_nan() { 0.0 } else { v })
            .collect();

        let total_return = curve.last().map(|p| p.level - 1.0).unwrap_or(0.0);

        let years = values.len() as f64 / ANNUAL_FACTOR;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (annualized_vol, sharpe) = if values.len() >= 2 {
            let slice: &[f64] = &values;
            let mean = slice.mean();
            let std_dev = slice.std_dev();
            let vol = std_dev * ANNUAL_FACTOR.sqrt();
            let sharpe = if std_dev > 0.0 {
                (mean / std_dev) * ANNUAL_FACTOR.sqrt()
            } else {
                0.0
            };
            (vol, sharpe)
        } else {
            (0.0, 0.0)
        };

        let traded: Vec<f64> = values.iter().copied().filter(|v| *v != 0.0).collect();
        let hit_rate = if traded.is_empty() {
            0.0
        } else {
            traded.iter().filter(|v| **v > 0.0).count() as f64 / traded.len() as f64
        };

        SummaryMetrics {
            start_date: returns.first_date(),
            end_date: returns.last_date(),
            n_periods: values.len(),
            total_return,
            annualized_return,
            annualized_vol,
            sharpe_ratio: sharpe,
            max_drawdown: max_drawdown(&curve),
            hit_rate,
            best_period: values.iter().copied().fold(0.0, f64::max),
            worst_period: values.iter().copied().fold(0.0, f64::min),
        }
    }

    //prints metrics in a formatted table
    pub fn pretty_print_table(&self) {
        let mut table = Table::new();

        table.add_row(Row::new(vec![Cell::new("Metric"), Cell::new("Value")]));

        let date_cell = |d: Option<NaiveDate>| {
            d.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string())
        };
        table.add_row(Row::new(vec![
            Cell::new("Start Date"),
            Cell::new(&date_cell(self.start_date)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("End Date"),
            Cell::new(&date_cell(self.end_date)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Periods"),
            Cell::new(&format!("{}", self.n_periods)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Total Return"),
            Cell::new(&format!("{:.2}%", self.total_return * 100.0)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Annualized Return"),
            Cell::new(&format!("{:.2}%", self.annualized_return * 100.0)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Annualized Volatility"),
            Cell::new(&format!("{:.2}%", self.annualized_vol * 100.0)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Sharpe Ratio"),
            Cell::new(&format!("{:.2}", self.sharpe_ratio)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Max Drawdown"),
            Cell::new(&format!("{:.2}%", self.max_drawdown * 100.0)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Hit Rate"),
            Cell::new(&format!("{:.2}%", self.hit_rate * 100.0)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Best Period"),
            Cell::new(&format!("{:.2}%", self.best_period * 100.0)),
        ]));
        table.add_row(Row::new(vec![
            Cell::new("Worst Period"),
            Cell::new(&format!("{:.2}%", self.worst_period * 100.0)),
        ]));

        table.printstd();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn summary_from_simple_series() {
        let dates: Vec<NaiveDate> = (0..4)
            .map(|i| {
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64)
            })
            .collect();
        let returns = TimeSeries::new(dates, vec![0.01, -0.02, 0.03, 0.0]);
        let summary = SummaryMetrics::from_returns(&returns);

        assert_eq!(summary.n_periods, 4);
        assert_relative_eq!(
            summary.total_return,
            1.01 * 0.98 * 1.03 - 1.0,
            epsilon = 1e-12
        );
        //two of the three non-flat periods are positive
        assert_relative_eq!(summary.hit_rate, 2.0 / 3.0, epsilon = 1e-12);
        assert_relative_eq!(summary.best_period, 0.03);
        assert_relative_eq!(summary.worst_period, -0.02);
        assert!(summary.max_drawdown > 0.0);
    }
}
