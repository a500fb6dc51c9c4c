pub mod continuous;
pub mod contract;

pub use continuous::ContinuousInstrument;
pub use contract::ContractSeries;

use crate::calendar::CalendarError;
use crate::data::{CsvStore, DataError, DataSource};
use crate::series::DuplicateColumn;
use crate::ticker::TickerError;
use chrono::NaiveDate;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum InstrumentError {
    #[error("Unknown market '{0}'")]
    UnknownMarket(String),
    #[error(
        "Roll date from first notice ({first_notice}) must precede roll date \
         from last trade ({last_trade}) for {ticker}"
    )]
    FirstNoticeOrder {
        ticker: String,
        first_notice: NaiveDate,
        last_trade: NaiveDate,
    },
    #[error("{0} is not implemented")]
    Unsupported(String),
    #[error(transparent)]
    Calendar(#[from] CalendarError),
    #[error(transparent)]
    Ticker(#[from] TickerError),
    #[error(transparent)]
    Data(#[from] DataError),
    #[error(transparent)]
    Position(#[from] DuplicateColumn),
}

//handles to the external collaborators, opened by the caller and passed
//down through the whole backtest pass
pub struct BacktestContext<'a> {
    pub source: &'a dyn DataSource,
    pub store: &'a CsvStore,
    pub today: NaiveDate,
}
