use crate::calendar::resample_on_rule;
use crate::config::{VolMethod, VolScalingConfig};
use crate::layers::{single_driving, EngineError, RootItem, UnitPosition, TRADING_LAG};
use crate::markets::ANNUAL_FACTOR;
use crate::series::{sum_series, TimeSeries};
use tracing::info;

//target volatility over realized volatility of one driving item
#[derive(Debug)]
pub struct VolatilityScaling {
    config: VolScalingConfig,
    name: String,
    position: Option<UnitPosition>,
}

impl VolatilityScaling {
    pub fn new(config: VolScalingConfig) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| "volatility_scaling".to_string());
        VolatilityScaling {
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
        info!(layer = %self.name, "running volatility scaling layer");
        let item = single_driving(driving)?;
        let returns = item.final_net_returns()?;
        let leverage = scale_to_target(&returns, &self.config)?;
        self.position = Some(UnitPosition::Series(leverage));
        Ok(())
    }
}

//same computation over the summed net returns of a whole layer
#[derive(Debug)]
pub struct PortfolioVolatilityScaling {
    config: VolScalingConfig,
    name: String,
    position: Option<UnitPosition>,
}

impl PortfolioVolatilityScaling {
    pub fn new(config: VolScalingConfig) -> Self {
        let name = config
            .name
            .clone()
            .unwrap_or_else(|| "portfolio_volatility_scaling".to_string());
        PortfolioVolatilityScaling {
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
        info!(layer = %self.name, "running portfolio volatility scaling layer");
        let parts = driving
            .iter()
            .map(RootItem::final_net_returns)
            .collect::<Result<Vec<_>, _>>()?;
        let aggregate = sum_series(&parts);
        let leverage = scale_to_target(&aggregate, &self.config)?;
        self.position = Some(UnitPosition::Series(leverage));
        Ok(())
    }
}

//target volatility divided by annualized realized volatility, clipped,
//lagged, resampled onto the change-frequency rule and back-filled
pub fn scale_to_target(
    returns: &TimeSeries,
    config: &VolScalingConfig,
) -> Result<TimeSeries, EngineError> {
    let realized = match config.method {
        VolMethod::Rolling { window } => returns.rolling_std(window),
        VolMethod::Ewm { decay } => returns.ewm_std(decay.alpha()),
    };

    let mut leverage = realized
        .scale(ANNUAL_FACTOR.sqrt())
        .recip()
        .scale(config.target_vol)
        .clip(config.floor, config.cap)
        .shift(TRADING_LAG);

    if let Some(rule) = &config.chg_rule {
        leverage = resample_on_rule(&leverage, rule)?;
    }
    Ok(leverage.fill_backward())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;
    use statrs::statistics::Statistics;

    fn returns(values: Vec<f64>) -> TimeSeries {
        let dates = (0..values.len())
            .map(|i| {
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64)
            })
            .collect();
        TimeSeries::new(dates, values)
    }

    fn config(floor: Option<f64>, cap: Option<f64>) -> VolScalingConfig {
        VolScalingConfig {
            name: None,
            target_vol: 0.1,
            method: VolMethod::Rolling { window: 3 },
            chg_rule: None,
            floor,
            cap,
        }
    }

    #[test]
    fn leverage_hits_target_over_realized() {
        let series = returns(vec![0.01, -0.01, 0.01, -0.01, 0.01, -0.01]);
        let leverage = scale_to_target(&series, &config(None, None)).unwrap();

        //realized vol of the alternating series over any 3-period window
        let window: &[f64] = &[0.01, -0.01, 0.01];
        let realized = window.std_dev() * ANNUAL_FACTOR.sqrt();
        let expected = 0.1 / realized;
        //trading lag pushes the first estimate two periods out
        assert_relative_eq!(leverage.values()[4], expected, epsilon = 1e-12);
        //leading gap is back-filled
        assert_relative_eq!(leverage.values()[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn floor_and_cap_clip_leverage() {
        let series = returns(vec![0.01, -0.01, 0.01, -0.01, 0.01, -0.01]);
        let capped = scale_to_target(&series, &config(None, Some(0.5))).unwrap();
        assert!(capped.values().iter().all(|&v| v <= 0.5));

        let floored = scale_to_target(&series, &config(Some(2.0), None)).unwrap();
        assert!(floored.values().iter().all(|&v| v >= 2.0));
    }
}
