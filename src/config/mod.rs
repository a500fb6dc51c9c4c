pub mod backtest_config;

pub use backtest_config::{
    EngineConfig, InstrumentConfig, LayerConfig, PortfolioConfig, PriceSourceKind, SignalConfig,
    SignalTransform, VolMethod, VolScalingConfig, Weighting,
};
