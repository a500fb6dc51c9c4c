use crate::calendar::resample_on_rule;
use crate::config::{SignalConfig, SignalTransform};
use crate::layers::{single_driving, EngineError, RootItem, UnitPosition, TRADING_LAG};
use crate::series::{mean_series, EwmDecay, TimeSeries};
use tracing::info;

//half-life of the normalization of the raw trend signal
const NORMALIZATION_HALFLIFE: f64 = 252.0;

//trend following signal from moving average cross-overs of the log
//cumulative return level, averaged over the configured window pairs
#[derive(Debug)]
pub struct SignalUnit {
    config: SignalConfig,
    name: String,
    position: Option<UnitPosition>,
}

impl SignalUnit {
    pub fn new(config: SignalConfig) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| "trend_ma_xover".to_string());
        SignalUnit {
            config,
            name,
            position: None,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn position(&self) -> Option<&UnitPosition> {
        self.position.as_ref()
    }

    pub fn backtest(&mut self, driving: &[RootItem]) -> Result<(), EngineError> {
        info!(layer = %self.name, "running signal layer");
        let item = single_driving(driving)?;
        let returns = item.final_net_returns()?;

        let pair_signals: Vec<TimeSeries> = self
            .config
            .windows
            .iter()
            .map(|&(short, long)| trend_xover_single(&returns, short, long))
            .collect();

        let mut signal = mean_series(&pair_signals).shift(TRADING_LAG);
        if let Some(rule) = &self.config.chg_rule {
            signal = resample_on_rule(&signal, rule)?;
        }
        let signal = signal.fill_backward();

        self.position = Some(UnitPosition::Series(self.signal_to_position(&signal)));
        Ok(())
    }

    fn signal_to_position(&self, signal: &TimeSeries) -> TimeSeries {
        match self.config.to_position {
            SignalTransform::Linear => {
                signal.clip(self.config.position_floor, self.config.position_cap)
            }
        }
    }
}

//short minus long EWM trend of the log cumulative level, normalized by
//its own long-run EWM standard deviation
fn trend_xover_single(returns: &TimeSeries, short_halflife: f64, long_halflife: f64) -> TimeSeries {
    let ln_level = log_cum_level(returns);
    let short_trend = ln_level.ewm_mean(EwmDecay::HalfLife(short_halflife).alpha());
    let long_trend = ln_level.ewm_mean(EwmDecay::HalfLife(long_halflife).alpha());
    let raw = short_trend.sub(&long_trend);
    raw.div(&raw.ewm_std(EwmDecay::HalfLife(NORMALIZATION_HALFLIFE).alpha()))
}

//log of the compounded return level; missing returns do not compound
fn log_cum_level(returns: &TimeSeries) -> TimeSeries {
    let mut level = 0.0;
    let values = returns
        .values()
        .iter()
        .map(|&r| {
            if !r.is_nan() {
                level += (1.0 + r).ln();
            }
            level
        })
        .collect();
    TimeSeries::new(returns.dates().to_vec(), values)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    fn returns(values: Vec<f64>) -> TimeSeries {
        let dates = (0..values.len())
            .map(|i| {
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64)
            })
            .collect();
        TimeSeries::new(dates, values)
    }

    #[test]
    fn log_level_compounds() {
        let level = log_cum_level(&returns(vec![0.0, 0.1, 0.1]));
        assert_relative_eq!(level.values()[0], 0.0);
        assert_relative_eq!(level.values()[2], 1.1f64.ln() * 2.0, epsilon = 1e-12);
    }

    #[test]
    fn uptrend_gives_positive_signal() {
        let series = returns(vec![0.01; 40]);
        let signal = trend_xover_single(&series, 4.0, 16.0);
        //a steady uptrend keeps the short trend above the long trend
        assert!(signal.values()[39] > 0.0);
    }

    #[test]
    fn linear_transform_clips_to_bounds() {
        let config = SignalConfig {
            name: None,
            windows: vec![(4.0, 16.0)],
            chg_rule: None,
            to_position: SignalTransform::Linear,
            position_floor: Some(-1.0),
            position_cap: Some(1.0),
        };
        let unit = SignalUnit::new(config);
        let clipped = unit.signal_to_position(&returns(vec![-3.0, -0.5, 0.5, 3.0]));
        assert_eq!(clipped.values(), &[-1.0, -0.5, 0.5, 1.0]);
    }
}
