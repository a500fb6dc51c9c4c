//a Rust-based layered backtesting engine for rolled futures strategies

pub mod calendar;
pub mod config;
pub mod data;
pub mod instrument;
pub mod layers;
pub mod markets;
pub mod metrics;
pub mod series;
pub mod ticker;

//prelude module for convenient imports
pub mod prelude {
    pub use crate::calendar::{date_shift, resample_on_rule, CalendarError};
    pub use crate::config::{
        EngineConfig, InstrumentConfig, LayerConfig, PortfolioConfig, PriceSourceKind,
        SignalConfig, SignalTransform, VolMethod, VolScalingConfig, Weighting,
    };
    pub use crate::data::{CsvDataSource, CsvStore, DataError, DataSource, PriceTable};
    pub use crate::instrument::{
        BacktestContext, ContinuousInstrument, ContractSeries, InstrumentError,
    };
    pub use crate::layers::{
        CompositionEngine, EngineError, EngineParams, EngineState, Layer, LayerDef, RootItem,
        UnitItem, UnitPosition, TRADING_LAG,
    };
    pub use crate::markets::{
        all_markets, lookup, AssetClass, Denominator, MarketSpec, ANNUAL_FACTOR,
        DEFAULT_ROLL_RULE,
    };
    pub use crate::metrics::{calculate_curve, CurvePoint, SummaryMetrics};
    pub use crate::series::{EwmDecay, PositionTable, TimeSeries};
    pub use crate::ticker::{decompose, next_ticker, to_yyyymm, TickerError};
}
