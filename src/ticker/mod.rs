pub mod symbol;

pub use symbol::{
    decompose, delivery_month, delivery_month_begin, is_generic, next_ticker, to_yyyymm,
    TickerError, TickerParts, MONTH_CODES,
};
