use crate::calendar::resample_on_rule;
use crate::config::{PortfolioConfig, Weighting};
use crate::layers::{EngineError, RootItem, UnitPosition};
use crate::series::count_observed;
use indexmap::IndexMap;
use tracing::info;

//binds a set of instruments (or nested engines) into one book
#[derive(Debug)]
pub struct PortfolioUnit {
    config: PortfolioConfig,
    name: String,
    position: Option<UnitPosition>,
}

impl PortfolioUnit {
    pub fn new(config: PortfolioConfig) -> Self {
        let name = config.name.clone().unwrap_or_else(|| "portfolio".to_string());
        PortfolioUnit {
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
        info!(layer = %self.name, "running portfolio layer");

        let position = match &self.config.weighting {
            //weight each date by the number of items carrying a return
            Weighting::EqualWeight => {
                let returns = driving
                    .iter()
                    .map(RootItem::final_net_returns)
                    .collect::<Result<Vec<_>, _>>()?;
                let count = count_observed(&returns);
                let mut weight =
                    count.map(|c| if c > 0.0 { 1.0 / c } else { f64::NAN });
                if let Some(rule) = &self.config.chg_rule {
                    weight = resample_on_rule(&weight, rule)?;
                }
                UnitPosition::Series(weight.fill_backward())
            }
            //one declared weight per driving item, fanned out to its leaves
            Weighting::Explicit(weights) => {
                if weights.len() != driving.len() {
                    return Err(EngineError::WeightCount {
                        expected: driving.len(),
                        got: weights.len(),
                    });
                }
                let mut by_leaf = IndexMap::new();
                for (item, &weight) in driving.iter().zip(weights) {
                    for leaf in item.leaf_names() {
                        by_leaf.insert(leaf, weight);
                    }
                }
                UnitPosition::Named(by_leaf)
            }
        };

        self.position = Some(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::InstrumentConfig;
    use crate::instrument::ContinuousInstrument;
    use crate::markets::lookup;

    fn instrument(market: &str) -> RootItem {
        let config = InstrumentConfig {
            markets: vec![market.to_string()],
            nth_contract: 1,
            roll_rule: None,
            slippage: 0.0,
            force_refresh: false,
            price_source: Default::default(),
        };
        RootItem::Instrument(ContinuousInstrument::new(lookup(market).unwrap(), &config))
    }

    #[test]
    fn explicit_weights_key_by_leaf_name() {
        let driving = [instrument("CME_ES"), instrument("CME_TY")];
        let config = PortfolioConfig {
            name: None,
            weighting: Weighting::Explicit(vec![0.1, 0.9]),
            chg_rule: None,
        };
        let mut unit = PortfolioUnit::new(config);
        unit.backtest(&driving).unwrap();

        match unit.position().unwrap() {
            UnitPosition::Named(weights) => {
                assert_eq!(weights["CME_ES"], 0.1);
                assert_eq!(weights["CME_TY"], 0.9);
            }
            other => panic!("unexpected position {:?}", other),
        }
    }

    #[test]
    fn weight_count_must_match() {
        let driving = [instrument("CME_ES"), instrument("CME_TY")];
        let config = PortfolioConfig {
            name: None,
            weighting: Weighting::Explicit(vec![1.0]),
            chg_rule: None,
        };
        let mut unit = PortfolioUnit::new(config);
        assert!(matches!(
            unit.backtest(&driving),
            Err(EngineError::WeightCount {
                expected: 2,
                got: 1
            })
        ));
    }
}
