use crate::data::table::{DataError, PriceTable};
use std::fs::File;
use std::path::PathBuf;

//remote market-data endpoint; NotFound signals a contract that is not
//listed, which chain enumeration treats as a termination hint
//shared across instrument fan-out, hence Sync
pub trait DataSource: Sync {
    fn fetch(&self, ticker: &str) -> Result<PriceTable, DataError>;
}

//flat directory of per-contract csv files, one file per ticker with the
//slash replaced by an underscore (CME/ESZ1997 -> CME_ESZ1997.csv)
#[derive(Debug, Clone)]
pub struct CsvDataSource {
    dir: PathBuf,
}

impl CsvDataSource {
    pub fn new<P: Into<PathBuf>>(dir: P) -> Self {
        CsvDataSource { dir: dir.into() }
    }

    fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", ticker.replace('/', "_")))
    }
}

impl DataSource for CsvDataSource {
    fn fetch(&self, ticker: &str) -> Result<PriceTable, DataError> {
        let path = self.path_for(ticker);
        if !path.exists() {
            return Err(DataError::NotFound(ticker.to_string()));
        }
        let file = File::open(path)?;
        PriceTable::from_csv(file)
    }
}
