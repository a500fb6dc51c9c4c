use crate::config::{
    EngineConfig, InstrumentConfig, LayerConfig, PortfolioConfig, SignalConfig, VolScalingConfig,
};
use crate::instrument::{BacktestContext, ContinuousInstrument, InstrumentError};
use crate::layers::{
    EngineError, Layer, PortfolioUnit, PortfolioVolatilityScaling, RootItem, SignalUnit, UnitItem,
    VolatilityScaling,
};
use crate::markets;
use crate::series::{sum_series, TimeSeries};
use chrono::NaiveDate;
use tracing::{debug, info};

//engine-wide backtest parameters
#[derive(Debug, Clone)]
pub struct EngineParams {
    pub name: String,
    pub backtest_ccy: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl Default for EngineParams {
    fn default() -> Self {
        EngineParams {
            name: "engine".to_string(),
            backtest_ccy: "USD".to_string(),
            start_date: None,
            end_date: None,
        }
    }
}

//declarative layer added before compilation
#[derive(Debug)]
pub enum LayerDef {
    Instruments(InstrumentConfig),
    Engines(Vec<CompositionEngine>),
    VolScaling(VolScalingConfig),
    PortfolioVolScaling(VolScalingConfig),
    Signal(SignalConfig),
    Portfolio(PortfolioConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineState {
    Uncompiled,
    Compiled,
    Backtested,
}

//an ordered stack of layers: the root layer produces raw instrument
//returns and positions, every further layer computes a multiplier from
//the root layer and pushes it down to the leaf contracts
#[derive(Debug)]
pub struct CompositionEngine {
    params: EngineParams,
    defs: Vec<LayerDef>,
    root: Layer<RootItem>,
    units: Vec<Layer<UnitItem>>,
    state: EngineState,
}

impl CompositionEngine {
    pub fn new(params: EngineParams) -> Self {
        CompositionEngine {
            params,
            defs: Vec::new(),
            root: Layer::default(),
            units: Vec::new(),
            state: EngineState::Uncompiled,
        }
    }

    //builds an engine tree from its configuration, recursing into nested
    //engine layers
    pub fn from_config(config: EngineConfig) -> Self {
        let params = EngineParams {
            name: config.name,
            backtest_ccy: config.backtest_ccy,
            start_date: config.start_date,
            end_date: config.end_date,
        };
        let mut engine = CompositionEngine::new(params);

        for layer in config.layers {
            let def = match layer {
                LayerConfig::Instruments(cfg) => LayerDef::Instruments(cfg),
                LayerConfig::Engines(children) => LayerDef::Engines(
                    children
                        .into_iter()
                        .map(CompositionEngine::from_config)
                        .collect(),
                ),
                LayerConfig::VolScaling(cfg) => LayerDef::VolScaling(cfg),
                LayerConfig::PortfolioVolScaling(cfg) => LayerDef::PortfolioVolScaling(cfg),
                LayerConfig::Signal(cfg) => LayerDef::Signal(cfg),
                LayerConfig::Portfolio(cfg) => LayerDef::Portfolio(cfg),
            };
            engine.add(def);
        }
        engine
    }

    //appends a layer definition; takes effect at the next compile
    pub fn add(&mut self, def: LayerDef) {
        self.defs.push(def);
    }

    pub fn name(&self) -> &str {
        &self.params.name
    }

    pub fn params(&self) -> &EngineParams {
        &self.params
    }

    pub fn state(&self) -> EngineState {
        self.state
    }

    pub fn root(&self) -> &Layer<RootItem> {
        &self.root
    }

    pub fn unit_layers(&self) -> &[Layer<UnitItem>] {
        &self.units
    }

    pub fn n_layers(&self) -> usize {
        if self.state == EngineState::Uncompiled {
            self.defs.len()
        } else {
            1 + self.units.len()
        }
    }

    //instrument names reachable beneath the root layer, depth first
    pub fn leaf_names(&self) -> Vec<String> {
        self.root
            .items()
            .iter()
            .flat_map(RootItem::leaf_names)
            .collect()
    }

    //turns layer definitions into concrete typed items; idempotent, and
    //required before backtesting
    pub fn compile(&mut self) -> Result<(), EngineError> {
        if self.state != EngineState::Uncompiled {
            debug!(engine = %self.params.name, "already compiled");
            return Ok(());
        }
        info!(engine = %self.params.name, "compiling engine");

        let mut defs = std::mem::take(&mut self.defs).into_iter();
        let first = defs.next().ok_or(EngineError::InvalidRootLayer)?;

        let root_items = match first {
            LayerDef::Instruments(cfg) => {
                if cfg.markets.is_empty() {
                    return Err(EngineError::InvalidRootLayer);
                }
                cfg.markets
                    .iter()
                    .map(|market| {
                        markets::lookup(market)
                            .map(|spec| {
                                RootItem::Instrument(ContinuousInstrument::new(spec, &cfg))
                            })
                            .ok_or_else(|| {
                                InstrumentError::UnknownMarket(market.clone()).into()
                            })
                    })
                    .collect::<Result<Vec<_>, EngineError>>()?
            }
            LayerDef::Engines(children) => {
                if children.is_empty() {
                    return Err(EngineError::InvalidRootLayer);
                }
                children
                    .into_iter()
                    .map(|mut child| {
                        child.compile()?;
                        Ok(RootItem::Engine(Box::new(child)))
                    })
                    .collect::<Result<Vec<_>, EngineError>>()?
            }
            _ => return Err(EngineError::InvalidRootLayer),
        };
        self.root = Layer::new(root_items);

        //per-instrument unit kinds fan out to the previous layer's count
        let mut previous_len = self.root.len();
        for def in defs {
            let layer = match def {
                LayerDef::VolScaling(cfg) => Layer::new(
                    (0..previous_len)
                        .map(|_| UnitItem::VolScaling(VolatilityScaling::new(cfg.clone())))
                        .collect(),
                ),
                LayerDef::Signal(cfg) => Layer::new(
                    (0..previous_len)
                        .map(|_| UnitItem::Signal(SignalUnit::new(cfg.clone())))
                        .collect(),
                ),
                LayerDef::PortfolioVolScaling(cfg) => Layer::new(vec![
                    UnitItem::PortfolioVolScaling(PortfolioVolatilityScaling::new(cfg)),
                ]),
                LayerDef::Portfolio(cfg) => {
                    Layer::new(vec![UnitItem::Portfolio(PortfolioUnit::new(cfg))])
                }
                LayerDef::Instruments(_) | LayerDef::Engines(_) => {
                    return Err(EngineError::MisplacedRootLayer)
                }
            };
            previous_len = layer.len();
            self.units.push(layer);
        }

        let currency = self.params.backtest_ccy.clone();
        self.cascade_set_currency(&currency);
        self.state = EngineState::Compiled;
        Ok(())
    }

    //pushes the backtest currency to every leaf capable of accepting it
    pub fn cascade_set_currency(&mut self, currency: &str) {
        self.root.set_return_currency(currency);
    }

    //pushes a unit layer's multipliers down through the root layer,
    //recursing into nested engines
    pub fn cascade_propagate(&mut self, units: &Layer<UnitItem>) -> Result<(), EngineError> {
        self.root.propagate(units)
    }

    //single forward pass: the root layer first, then every unit layer run
    //against the root layer followed by position propagation
    pub fn backtest(&mut self, ctx: &BacktestContext) -> Result<(), EngineError> {
        self.compile()?;
        if self.state == EngineState::Backtested {
            debug!(engine = %self.params.name, "already backtested");
            return Ok(());
        }
        info!(engine = %self.params.name, "running backtest");

        self.root
            .backtest_root(ctx, self.params.start_date, self.params.end_date)?;

        for idx in 0..self.units.len() {
            self.units[idx].run_backtest(&self.root)?;
            self.root.propagate(&self.units[idx])?;
        }

        self.state = EngineState::Backtested;
        info!(engine = %self.params.name, "backtest completed");
        Ok(())
    }

    pub fn final_gross_returns(&self) -> Result<TimeSeries, EngineError> {
        let parts = self
            .root
            .items()
            .iter()
            .map(RootItem::final_gross_returns)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sum_series(&parts))
    }

    pub fn final_net_returns(&self) -> Result<TimeSeries, EngineError> {
        let parts = self
            .root
            .items()
            .iter()
            .map(RootItem::final_net_returns)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sum_series(&parts))
    }

    pub fn final_positions(&self) -> Result<TimeSeries, EngineError> {
        let parts = self
            .root
            .items()
            .iter()
            .map(RootItem::final_positions)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sum_series(&parts))
    }
}
