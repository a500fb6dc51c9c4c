pub mod source;
pub mod store;
pub mod table;

pub use source::{CsvDataSource, DataSource};
pub use store::{load_fx_rates, CsvStore};
pub use table::{DataError, PriceTable, RETURN_KEY_PRIORITY, VOLUME_KEY};
