use crate::series::EwmDecay;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

//where contract price history comes from; only listed futures contracts
//are implemented, the other variants are reserved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSourceKind {
    #[default]
    FuturesContracts,
    GenericIndex,
    SpotFx,
}

//instrument layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    //market names from the registry, e.g. CME_ES
    pub markets: Vec<String>,

    //1 holds the front contract, 2 the second nearest, and so on
    #[serde(default = "default_nth_contract")]
    pub nth_contract: usize,

    //override of the market roll rule, e.g. "-3bd"
    #[serde(default)]
    pub roll_rule: Option<String>,

    //slippage rate charged per tick traded
    #[serde(default)]
    pub slippage: f64,

    #[serde(default)]
    pub force_refresh: bool,

    #[serde(default)]
    pub price_source: PriceSourceKind,
}

fn default_nth_contract() -> usize {
    1
}

//realized volatility estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VolMethod {
    Rolling { window: usize },
    Ewm { decay: EwmDecay },
}

//volatility scaling layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VolScalingConfig {
    #[serde(default)]
    pub name: Option<String>,

    //annualized volatility target, e.g. 0.1
    pub target_vol: f64,

    pub method: VolMethod,

    //change-frequency rule for the multiplier; daily when omitted
    #[serde(default)]
    pub chg_rule: Option<String>,

    #[serde(default)]
    pub floor: Option<f64>,

    #[serde(default)]
    pub cap: Option<f64>,
}

//how a signal becomes a position multiplier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalTransform {
    #[default]
    Linear,
}

//trend signal layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default)]
    pub name: Option<String>,

    //short and long half-life pairs averaged into one signal
    pub windows: Vec<(f64, f64)>,

    #[serde(default)]
    pub chg_rule: Option<String>,

    #[serde(default)]
    pub to_position: SignalTransform,

    #[serde(default)]
    pub position_floor: Option<f64>,

    #[serde(default)]
    pub position_cap: Option<f64>,
}

//portfolio weighting mode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Weighting {
    //renormalized each date by the number of instruments with returns
    EqualWeight,
    //one weight per root item, in layer order
    Explicit(Vec<f64>),
}

//portfolio layer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioConfig {
    #[serde(default)]
    pub name: Option<String>,

    pub weighting: Weighting,

    #[serde(default)]
    pub chg_rule: Option<String>,
}

//declarative description of one layer of an engine
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayerConfig {
    Instruments(InstrumentConfig),
    Engines(Vec<EngineConfig>),
    VolScaling(VolScalingConfig),
    PortfolioVolScaling(VolScalingConfig),
    Signal(SignalConfig),
    Portfolio(PortfolioConfig),
}

//complete engine configuration, recursively nestable
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_engine_name")]
    pub name: String,

    #[serde(default = "default_backtest_ccy")]
    pub backtest_ccy: String,

    #[serde(default)]
    pub start_date: Option<NaiveDate>,

    #[serde(default)]
    pub end_date: Option<NaiveDate>,

    pub layers: Vec<LayerConfig>,
}

fn default_engine_name() -> String {
    "engine".to_string()
}

fn default_backtest_ccy() -> String {
    "USD".to_string()
}

impl EngineConfig {
    //load configuration from a JSON file
    pub fn from_json_file(path: &PathBuf) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&contents)?;
        Ok(config)
    }

    //save configuration to a JSON file
    pub fn to_json_file(&self, path: &PathBuf) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layer_config_json_round_trip() {
        let config = EngineConfig {
            name: "trend".to_string(),
            backtest_ccy: "USD".to_string(),
            start_date: NaiveDate::from_ymd_opt(2017, 1, 3),
            end_date: None,
            layers: vec![
                LayerConfig::Instruments(InstrumentConfig {
                    markets: vec!["CME_ES".to_string()],
                    nth_contract: 1,
                    roll_rule: None,
                    slippage: 0.5,
                    force_refresh: false,
                    price_source: PriceSourceKind::FuturesContracts,
                }),
                LayerConfig::VolScaling(VolScalingConfig {
                    name: None,
                    target_vol: 0.1,
                    method: VolMethod::Rolling { window: 63 },
                    chg_rule: Some("+Wed-1bd+1bd".to_string()),
                    floor: None,
                    cap: None,
                }),
            ],
        };

        let json = serde_json::to_string(&config).unwrap();
        let parsed: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.name, "trend");
        assert_eq!(parsed.layers.len(), 2);
        match &parsed.layers[1] {
            LayerConfig::VolScaling(vs) => {
                assert_eq!(vs.method, VolMethod::Rolling { window: 63 })
            }
            other => panic!("unexpected layer {:?}", other),
        }
    }

    #[test]
    fn defaults_are_applied() {
        let json = r#"{"layers": [{"instruments": {"markets": ["CME_TY"]}}]}"#;
        let config: EngineConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "engine");
        assert_eq!(config.backtest_ccy, "USD");
        match &config.layers[0] {
            LayerConfig::Instruments(cfg) => {
                assert_eq!(cfg.nth_contract, 1);
                assert_eq!(cfg.price_source, PriceSourceKind::FuturesContracts);
            }
            other => panic!("unexpected layer {:?}", other),
        }
    }
}
