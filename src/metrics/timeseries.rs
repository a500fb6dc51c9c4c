use crate::series::TimeSeries;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

//a point on the compounded return index
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CurvePoint {
    pub date: NaiveDate,
    pub level: f64,
    pub drawdown: f64,
    pub returns: f64,
}

//compounds a per-period return series into an index starting at 1.0,
//tracking drawdowns from the running peak
pub fn calculate_curve(returns: &TimeSeries) -> Vec<CurvePoint> {
    let mut curve = Vec::with_capacity(returns.len());
    let mut level = 1.0;
    let mut peak = 1.0;

    for (date, ret) in returns.iter() {
        let ret = if ret.is_nan() { 0.0 } else { ret };
        level *= 1.0 + ret;

        if level > peak {
            peak = level;
        }
        let drawdown = if peak > 0.0 { (peak - level) / peak } else { 0.0 };

        curve.push(CurvePoint {
            date,
            level,
            drawdown,
            returns: ret,
        });
    }

    curve
}

//largest peak-to-trough drawdown of the index
pub fn max_drawdown(curve: &[CurvePoint]) -> f64 {
    curve.iter().map(|point| point.drawdown).fold(0.0, f64::max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn returns(values: Vec<f64>) -> TimeSeries {
        let dates = (0..values.len())
            .map(|i| {
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64)
            })
            .collect();
        TimeSeries::new(dates, values)
    }

    #[test]
    fn curve_compounds_and_tracks_drawdown() {
        let curve = calculate_curve(&returns(vec![0.10, -0.50, 0.10]));
        assert_relative_eq!(curve[0].level, 1.10, epsilon = 1e-12);
        assert_relative_eq!(curve[1].level, 0.55, epsilon = 1e-12);
        assert_relative_eq!(max_drawdown(&curve), 0.5, epsilon = 1e-12);
    }
}
