pub mod engine;
pub mod portfolio;
pub mod scaling;
pub mod signal;

pub use engine::{CompositionEngine, EngineParams, EngineState, LayerDef};
pub use portfolio::PortfolioUnit;
pub use scaling::{PortfolioVolatilityScaling, VolatilityScaling};
pub use signal::SignalUnit;

use crate::calendar::CalendarError;
use crate::instrument::{BacktestContext, ContinuousInstrument, InstrumentError};
use crate::series::TimeSeries;
use chrono::NaiveDate;
use indexmap::IndexMap;
use rayon::prelude::*;
use thiserror::Error;

//periods between computing a signal or weight and it taking effect
pub const TRADING_LAG: i64 = 2;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Layer arity mismatch: {left} item(s) against {right} item(s)")]
    ArityMismatch { left: usize, right: usize },
    #[error("The first layer must consist of instruments or nested engines only")]
    InvalidRootLayer,
    #[error("Instrument and engine layers may only appear first")]
    MisplacedRootLayer,
    #[error("Explicit weighting expects {expected} weight(s), got {got}")]
    WeightCount { expected: usize, got: usize },
    #[error("No portfolio weight found for '{0}'")]
    MissingWeight(String),
    #[error("Layer '{0}' has not computed a position")]
    MissingPosition(String),
    #[error(transparent)]
    Instrument(#[from] InstrumentError),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
}

//an item of the root layer: a leaf instrument or a nested engine
#[derive(Debug)]
pub enum RootItem {
    Instrument(ContinuousInstrument),
    Engine(Box<CompositionEngine>),
}

impl RootItem {
    pub fn name(&self) -> &str {
        match self {
            RootItem::Instrument(instrument) => instrument.name(),
            RootItem::Engine(engine) => engine.name(),
        }
    }

    //instrument names reachable beneath this item, depth first
    pub fn leaf_names(&self) -> Vec<String> {
        match self {
            RootItem::Instrument(instrument) => vec![instrument.name().to_string()],
            RootItem::Engine(engine) => engine.leaf_names(),
        }
    }

    pub fn final_gross_returns(&self) -> Result<TimeSeries, EngineError> {
        match self {
            RootItem::Instrument(instrument) => Ok(instrument.final_gross_returns()?),
            RootItem::Engine(engine) => engine.final_gross_returns(),
        }
    }

    pub fn final_net_returns(&self) -> Result<TimeSeries, EngineError> {
        match self {
            RootItem::Instrument(instrument) => Ok(instrument.final_net_returns()?),
            RootItem::Engine(engine) => engine.final_net_returns(),
        }
    }

    pub fn final_positions(&self) -> Result<TimeSeries, EngineError> {
        match self {
            RootItem::Instrument(instrument) => Ok(instrument.final_positions()),
            RootItem::Engine(engine) => engine.final_positions(),
        }
    }

    fn backtest(
        &mut self,
        ctx: &BacktestContext,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(), EngineError> {
        match self {
            RootItem::Instrument(instrument) => Ok(instrument.backtest(ctx, start, end)?),
            //nested engines run under their own declared window
            RootItem::Engine(engine) => engine.backtest(ctx),
        }
    }

    fn set_return_currency(&mut self, currency: &str) {
        match self {
            RootItem::Instrument(instrument) => instrument.set_return_currency(currency),
            RootItem::Engine(engine) => engine.cascade_set_currency(currency),
        }
    }
}

//a multiplier computed by a unit layer: one shared series, or one constant
//weight per leaf instrument name
#[derive(Debug, Clone)]
pub enum UnitPosition {
    Series(TimeSeries),
    Named(IndexMap<String, f64>),
}

//an item of a non-root layer
#[derive(Debug)]
pub enum UnitItem {
    VolScaling(VolatilityScaling),
    PortfolioVolScaling(PortfolioVolatilityScaling),
    Signal(SignalUnit),
    Portfolio(PortfolioUnit),
}

impl UnitItem {
    pub fn name(&self) -> &str {
        match self {
            UnitItem::VolScaling(unit) => unit.name(),
            UnitItem::PortfolioVolScaling(unit) => unit.name(),
            UnitItem::Signal(unit) => unit.name(),
            UnitItem::Portfolio(unit) => unit.name(),
        }
    }

    pub fn position(&self) -> Option<&UnitPosition> {
        match self {
            UnitItem::VolScaling(unit) => unit.position(),
            UnitItem::PortfolioVolScaling(unit) => unit.position(),
            UnitItem::Signal(unit) => unit.position(),
            UnitItem::Portfolio(unit) => unit.position(),
        }
    }

    fn backtest(&mut self, driving: &[RootItem]) -> Result<(), EngineError> {
        match self {
            UnitItem::VolScaling(unit) => unit.backtest(driving),
            UnitItem::PortfolioVolScaling(unit) => unit.backtest(driving),
            UnitItem::Signal(unit) => unit.backtest(driving),
            UnitItem::Portfolio(unit) => unit.backtest(driving),
        }
    }
}

//a homogeneous collection of same-kind processing items
#[derive(Debug)]
pub struct Layer<T> {
    items: Vec<T>,
}

impl<T> Default for Layer<T> {
    fn default() -> Self {
        Layer { items: Vec::new() }
    }
}

impl<T> Layer<T> {
    pub fn new(items: Vec<T>) -> Self {
        Layer { items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn items_mut(&mut self) -> &mut [T] {
        &mut self.items
    }
}

//arity rules for applying one layer against another: equal lengths zip,
//a single item on either side broadcasts, anything else is an error
enum Pairing {
    Zip,
    SingleLeft,
    SingleRight,
}

fn pairing(left: usize, right: usize) -> Result<Pairing, EngineError> {
    if left == right {
        Ok(Pairing::Zip)
    } else if left == 1 {
        Ok(Pairing::SingleLeft)
    } else if right == 1 {
        Ok(Pairing::SingleRight)
    } else {
        Err(EngineError::ArityMismatch { left, right })
    }
}

impl Layer<RootItem> {
    pub fn all_instruments(&self) -> bool {
        self.items
            .iter()
            .all(|item| matches!(item, RootItem::Instrument(_)))
    }

    pub fn all_engines(&self) -> bool {
        self.items
            .iter()
            .all(|item| matches!(item, RootItem::Engine(_)))
    }

    //independent instruments fan out in parallel; nested engines recurse
    pub fn backtest_root(
        &mut self,
        ctx: &BacktestContext,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(), EngineError> {
        if self.all_instruments() {
            self.items
                .par_iter_mut()
                .try_for_each(|item| item.backtest(ctx, start, end))
        } else {
            for item in &mut self.items {
                item.backtest(ctx, start, end)?;
            }
            Ok(())
        }
    }

    pub fn set_return_currency(&mut self, currency: &str) {
        for item in &mut self.items {
            item.set_return_currency(currency);
        }
    }

    //pushes a unit layer's multipliers down into every leaf contract,
    //recursing through nested engines with the whole unit layer
    pub fn propagate(&mut self, units: &Layer<UnitItem>) -> Result<(), EngineError> {
        if self.all_engines() {
            for item in &mut self.items {
                if let RootItem::Engine(engine) = item {
                    engine.cascade_propagate(units)?;
                }
            }
            return Ok(());
        }
        if !self.all_instruments() {
            return Err(EngineError::InvalidRootLayer);
        }

        match pairing(self.len(), units.len())? {
            Pairing::Zip => {
                for (item, unit) in self.items.iter_mut().zip(units.items()) {
                    apply_unit_position(item, unit)?;
                }
            }
            Pairing::SingleLeft => {
                for unit in units.items() {
                    apply_unit_position(&mut self.items[0], unit)?;
                }
            }
            Pairing::SingleRight => {
                for item in &mut self.items {
                    apply_unit_position(item, &units.items()[0])?;
                }
            }
        }
        Ok(())
    }
}

fn apply_unit_position(item: &mut RootItem, unit: &UnitItem) -> Result<(), EngineError> {
    let instrument = match item {
        RootItem::Instrument(instrument) => instrument,
        RootItem::Engine(_) => return Err(EngineError::InvalidRootLayer),
    };
    let position = unit
        .position()
        .ok_or_else(|| EngineError::MissingPosition(unit.name().to_string()))?;

    match position {
        UnitPosition::Series(series) => {
            instrument.propagate_series(unit.name(), series)?;
        }
        UnitPosition::Named(weights) => {
            let weight = weights
                .get(instrument.name())
                .ok_or_else(|| EngineError::MissingWeight(instrument.name().to_string()))?;
            instrument.propagate_constant(unit.name(), *weight)?;
        }
    }
    Ok(())
}

impl Layer<UnitItem> {
    //runs every unit against the root layer under the arity rules
    pub fn run_backtest(&mut self, root: &Layer<RootItem>) -> Result<(), EngineError> {
        match pairing(self.len(), root.len())? {
            Pairing::Zip => {
                for (unit, item) in self.items.iter_mut().zip(root.items()) {
                    unit.backtest(std::slice::from_ref(item))?;
                }
            }
            Pairing::SingleLeft => {
                self.items[0].backtest(root.items())?;
            }
            Pairing::SingleRight => {
                for unit in &mut self.items {
                    unit.backtest(&root.items()[..1])?;
                }
            }
        }
        Ok(())
    }
}

//helper for units that consume exactly one driving item
pub(crate) fn single_driving<'a>(driving: &'a [RootItem]) -> Result<&'a RootItem, EngineError> {
    if driving.len() == 1 {
        Ok(&driving[0])
    } else {
        Err(EngineError::ArityMismatch {
            left: 1,
            right: driving.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pairing_rules() {
        assert!(matches!(pairing(3, 3), Ok(Pairing::Zip)));
        assert!(matches!(pairing(1, 4), Ok(Pairing::SingleLeft)));
        assert!(matches!(pairing(4, 1), Ok(Pairing::SingleRight)));
        assert!(matches!(
            pairing(2, 3),
            Err(EngineError::ArityMismatch { left: 2, right: 3 })
        ));
    }
}
