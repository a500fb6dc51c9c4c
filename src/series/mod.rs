pub mod position;
pub mod timeseries;

pub use position::{DuplicateColumn, PositionTable};
pub use timeseries::{count_observed, mean_series, sum_series, union_dates, EwmDecay, TimeSeries};
