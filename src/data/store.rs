use crate::data::table::{DataError, PriceTable};
use crate::series::TimeSeries;
use std::fs::{self, File};
use std::path::PathBuf;

//local csv-backed cache keyed by symbol; the symbol's slash is replaced
//by an underscore in the file name
#[derive(Debug, Clone)]
pub struct CsvStore {
    dir: PathBuf,
}

impl CsvStore {
    pub fn open<P: Into<PathBuf>>(dir: P) -> Result<Self, DataError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(CsvStore { dir })
    }

    fn path_for(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", symbol.replace('/', "_")))
    }

    pub fn read(&self, symbol: &str) -> Result<Option<PriceTable>, DataError> {
        let path = self.path_for(symbol);
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path)?;
        Ok(Some(PriceTable::from_csv(file)?))
    }

    pub fn write(&self, symbol: &str, table: &PriceTable) -> Result<(), DataError> {
        let file = File::create(self.path_for(symbol))?;
        table.to_csv(file)
    }

    //symbols whose name contains the pattern
    pub fn list(&self, pattern: &str) -> Result<Vec<String>, DataError> {
        let mut symbols = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if let Some(stem) = name.strip_suffix(".csv") {
                let symbol = stem.replace('_', "/");
                if symbol.contains(pattern) {
                    symbols.push(symbol);
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

//looks up the spot series converting the contract currency into the
//backtest currency, inverting the quote direction when necessary
pub fn load_fx_rates(
    store: &CsvStore,
    contract_ccy: &str,
    backtest_ccy: &str,
) -> Result<TimeSeries, DataError> {
    let candidates = store.list(contract_ccy)?;
    if candidates.len() > 1 {
        return Err(DataError::AmbiguousFxRates(contract_ccy.to_string()));
    }

    let missing =
        || DataError::MissingFxRates(contract_ccy.to_string(), backtest_ccy.to_string());
    let symbol = candidates.into_iter().next().ok_or_else(missing)?;

    let table = store.read(&symbol)?.ok_or_else(missing)?;
    let spot = table.first_series().ok_or_else(missing)?;

    if symbol == format!("{}{}", contract_ccy, backtest_ccy) {
        Ok(spot)
    } else if symbol == format!("{}{}", backtest_ccy, contract_ccy) {
        Ok(spot.recip())
    } else {
        Err(missing())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use indexmap::IndexMap;
    use chrono::NaiveDate;

    fn fx_table() -> PriceTable {
        let dates = vec![
            NaiveDate::from_ymd_opt(2017, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2017, 1, 4).unwrap(),
        ];
        let mut columns = IndexMap::new();
        columns.insert("Rate".to_string(), vec![2.0, 4.0]);
        PriceTable::new(dates, columns)
    }

    #[test]
    fn round_trip_and_list() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path()).unwrap();

        assert!(store.read("JPYUSD").unwrap().is_none());
        store.write("JPYUSD", &fx_table()).unwrap();
        let table = store.read("JPYUSD").unwrap().unwrap();
        assert_eq!(table.len(), 2);

        assert_eq!(store.list("JPY").unwrap(), vec!["JPYUSD".to_string()]);
        assert!(store.list("EUR").unwrap().is_empty());
    }

    #[test]
    fn fx_lookup_inverts_when_quoted_backwards() {
        let dir = tempfile::tempdir().unwrap();
        let store = CsvStore::open(dir.path()).unwrap();
        store.write("USDJPY", &fx_table()).unwrap();

        let spot = load_fx_rates(&store, "JPY", "USD").unwrap();
        assert_relative_eq!(spot.values()[0], 0.5);

        assert!(matches!(
            load_fx_rates(&store, "EUR", "USD"),
            Err(DataError::MissingFxRates(..))
        ));
    }
}
