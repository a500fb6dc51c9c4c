use crate::series::timeseries::TimeSeries;
use chrono::NaiveDate;
use indexmap::IndexMap;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Position column '{0}' already exists")]
pub struct DuplicateColumn(pub String);

//per-contract stack of position multiplier columns over one date index
//columns keep insertion order: base first, then one column per layer
#[derive(Debug, Clone)]
pub struct PositionTable {
    dates: Vec<NaiveDate>,
    columns: IndexMap<String, Vec<f64>>,
}

impl PositionTable {
    pub fn new(dates: Vec<NaiveDate>, base: Vec<f64>) -> Self {
        assert_eq!(dates.len(), base.len(), "base column must align with dates");
        let mut columns = IndexMap::new();
        columns.insert("base".to_string(), base);
        PositionTable { dates, columns }
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, name: &str) -> Option<TimeSeries> {
        self.columns
            .get(name)
            .map(|values| TimeSeries::new(self.dates.clone(), values.clone()))
    }

    //joins a layer's multiplier series, reindexed onto this table's dates;
    //dates the layer does not cover stay missing
    pub fn join(&mut self, name: &str, series: &TimeSeries) -> Result<(), DuplicateColumn> {
        if self.columns.contains_key(name) {
            return Err(DuplicateColumn(name.to_string()));
        }
        let aligned = series.reindex(&self.dates);
        self.columns
            .insert(name.to_string(), aligned.values().to_vec());
        Ok(())
    }

    //row-wise product across columns, skipping missing entries
    pub fn product(&self) -> TimeSeries {
        let values = (0..self.dates.len())
            .map(|row| {
                self.columns
                    .values()
                    .map(|col| col[row])
                    .filter(|v| !v.is_nan())
                    .product()
            })
            .collect();
        TimeSeries::new(self.dates.clone(), values)
    }

    pub fn trim(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        let keep: Vec<bool> = self
            .dates
            .iter()
            .map(|&d| !(start.is_some_and(|s| d < s) || end.is_some_and(|e| d > e)))
            .collect();

        let mut idx = 0;
        self.dates.retain(|_| {
            let k = keep[idx];
            idx += 1;
            k
        });
        for col in self.columns.values_mut() {
            let mut idx = 0;
            col.retain(|_| {
                let k = keep[idx];
                idx += 1;
                k
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn dates(n: usize) -> Vec<NaiveDate> {
        (0..n)
            .map(|i| NaiveDate::from_ymd_opt(2020, 1, 1).unwrap() + chrono::Duration::days(i as i64))
            .collect()
    }

    #[test]
    fn product_skips_missing() {
        let idx = dates(3);
        let mut table = PositionTable::new(idx.clone(), vec![1.0, 1.0, 0.0]);
        let scaling = TimeSeries::new(idx[1..].to_vec(), vec![2.0, 2.0]);
        table.join("volatility_scaling", &scaling).unwrap();

        let product = table.product();
        //missing scaling entry contributes nothing on the first date
        assert_relative_eq!(product.values()[0], 1.0);
        assert_relative_eq!(product.values()[1], 2.0);
        assert_relative_eq!(product.values()[2], 0.0);
    }

    #[test]
    fn duplicate_columns_are_rejected() {
        let idx = dates(2);
        let mut table = PositionTable::new(idx.clone(), vec![1.0, 1.0]);
        let col = TimeSeries::constant(&idx, 0.5);
        table.join("portfolio", &col).unwrap();
        assert!(table.join("portfolio", &col).is_err());
        assert_eq!(table.n_columns(), 2);
    }
}
