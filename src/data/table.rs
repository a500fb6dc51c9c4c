use crate::series::TimeSeries;
use chrono::NaiveDate;
use indexmap::IndexMap;
use std::io;
use thiserror::Error;

//price column names recognized for return computation, in priority order
pub const RETURN_KEY_PRIORITY: [&str; 6] = [
    "Settle",
    "Settlement Price",
    "Last Traded",
    "Last",
    "Close",
    "Previous Settlement",
];

pub const VOLUME_KEY: &str = "Volume";

#[derive(Error, Debug)]
pub enum DataError {
    #[error("No data found for '{0}'")]
    NotFound(String),
    #[error("No recognized price column; table contains {columns:?}")]
    NoPriceColumn { columns: Vec<String> },
    #[error("Table has no date column")]
    MissingDateColumn,
    #[error("Invalid date '{0}' in table")]
    BadDate(String),
    #[error("Invalid number '{value}' in column '{column}'")]
    BadNumber { value: String, column: String },
    #[error("Multiple fx rate candidates matching '{0}'")]
    AmbiguousFxRates(String),
    #[error("No fx rates found for {0}/{1}")]
    MissingFxRates(String, String),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

//date-indexed table of named numeric columns, as fetched for one contract
#[derive(Debug, Clone)]
pub struct PriceTable {
    dates: Vec<NaiveDate>,
    columns: IndexMap<String, Vec<f64>>,
}

impl PriceTable {
    pub fn new(dates: Vec<NaiveDate>, columns: IndexMap<String, Vec<f64>>) -> Self {
        for col in columns.values() {
            assert_eq!(col.len(), dates.len(), "columns must align with dates");
        }
        PriceTable { dates, columns }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn dates(&self) -> &[NaiveDate] {
        &self.dates
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.keys().cloned().collect()
    }

    pub fn column(&self, name: &str) -> Option<TimeSeries> {
        self.columns
            .get(name)
            .map(|values| TimeSeries::new(self.dates.clone(), values.clone()))
    }

    pub fn first_series(&self) -> Option<TimeSeries> {
        let name = self.columns.keys().next()?.clone();
        self.column(&name)
    }

    //recognized price column in priority order
    pub fn price_column(&self) -> Result<&'static str, DataError> {
        RETURN_KEY_PRIORITY
            .iter()
            .find(|key| self.columns.contains_key(**key))
            .copied()
            .ok_or_else(|| DataError::NoPriceColumn {
                columns: self.column_names(),
            })
    }

    pub fn price_series(&self) -> Result<TimeSeries, DataError> {
        let key = self.price_column()?;
        Ok(self.column(key).unwrap())
    }

    pub fn trim(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        let keep: Vec<bool> = self
            .dates
            .iter()
            .map(|&d| !(start.is_some_and(|s| d < s) || end.is_some_and(|e| d > e)))
            .collect();

        retain_by_mask(&mut self.dates, &keep);
        for col in self.columns.values_mut() {
            retain_by_mask(col, &keep);
        }
    }

    //blanks out whole rows on the given dates
    pub fn set_rows_missing(&mut self, dates: &[NaiveDate]) {
        for date in dates {
            if let Ok(row) = self.dates.binary_search(date) {
                for col in self.columns.values_mut() {
                    col[row] = f64::NAN;
                }
            }
        }
    }

    //blanks out rows where the given column is missing or non-positive
    pub fn mask_rows_where_nonpositive(&mut self, column: &str) {
        let flags: Vec<bool> = match self.columns.get(column) {
            Some(col) => col.iter().map(|&v| !(v > 0.0)).collect(),
            None => return,
        };
        for col in self.columns.values_mut() {
            for (row, &bad) in flags.iter().enumerate() {
                if bad {
                    col[row] = f64::NAN;
                }
            }
        }
    }

    //per-column forward fill then backward fill
    pub fn fill_forward_backward(&mut self) {
        for col in self.columns.values_mut() {
            let mut last = f64::NAN;
            for v in col.iter_mut() {
                if v.is_nan() {
                    *v = last;
                } else {
                    last = *v;
                }
            }
            let mut next = f64::NAN;
            for v in col.iter_mut().rev() {
                if v.is_nan() {
                    *v = next;
                } else {
                    next = *v;
                }
            }
        }
    }

    //rescales every column up to and including a date
    pub fn scale_through(&mut self, date: NaiveDate, factor: f64) {
        let cutoff = self.dates.partition_point(|&d| d <= date);
        for col in self.columns.values_mut() {
            for v in col.iter_mut().take(cutoff) {
                *v *= factor;
            }
        }
    }

    pub fn from_csv<R: io::Read>(reader: R) -> Result<Self, DataError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_reader(reader);

        let headers = csv_reader.headers()?.clone();
        if headers.is_empty() {
            return Err(DataError::MissingDateColumn);
        }
        let names: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();

        let mut dates = Vec::new();
        let mut columns: IndexMap<String, Vec<f64>> =
            names.iter().map(|n| (n.clone(), Vec::new())).collect();

        for record in csv_reader.records() {
            let record = record?;
            let raw_date = record.get(0).unwrap_or_default();
            let date = NaiveDate::parse_from_str(raw_date, "%Y-%m-%d")
                .map_err(|_| DataError::BadDate(raw_date.to_string()))?;
            dates.push(date);

            for (idx, name) in names.iter().enumerate() {
                let cell = record.get(idx + 1).unwrap_or_default().trim();
                let value = if cell.is_empty() {
                    f64::NAN
                } else {
                    cell.parse().map_err(|_| DataError::BadNumber {
                        value: cell.to_string(),
                        column: name.clone(),
                    })?
                };
                columns.get_mut(name).unwrap().push(value);
            }
        }

        //ensure chronological order regardless of file order
        if !dates.windows(2).all(|w| w[0] < w[1]) {
            let mut order: Vec<usize> = (0..dates.len()).collect();
            order.sort_by_key(|&i| dates[i]);
            dates = order.iter().map(|&i| dates[i]).collect();
            for col in columns.values_mut() {
                *col = order.iter().map(|&i| col[i]).collect();
            }
        }

        Ok(PriceTable::new(dates, columns))
    }

    pub fn to_csv<W: io::Write>(&self, writer: W) -> Result<(), DataError> {
        let mut csv_writer = csv::Writer::from_writer(writer);

        let mut header = vec!["Date".to_string()];
        header.extend(self.columns.keys().cloned());
        csv_writer.write_record(&header)?;

        for (row, date) in self.dates.iter().enumerate() {
            let mut record = vec![date.format("%Y-%m-%d").to_string()];
            for col in self.columns.values() {
                let v = col[row];
                record.push(if v.is_nan() {
                    String::new()
                } else {
                    format!("{}", v)
                });
            }
            csv_writer.write_record(&record)?;
        }
        csv_writer.flush()?;
        Ok(())
    }
}

fn retain_by_mask<T>(items: &mut Vec<T>, keep: &[bool]) {
    let mut idx = 0;
    items.retain(|_| {
        let k = keep[idx];
        idx += 1;
        k
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_csv() -> &'static str {
        "Date,Settle,Volume\n2017-01-03,100.0,5\n2017-01-04,101.5,\n2017-01-05,99.0,7\n"
    }

    #[test]
    fn csv_round_trip() {
        let table = PriceTable::from_csv(sample_csv().as_bytes()).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.price_column().unwrap(), "Settle");
        assert!(table.column(VOLUME_KEY).unwrap().values()[1].is_nan());

        let mut buffer = Vec::new();
        table.to_csv(&mut buffer).unwrap();
        let again = PriceTable::from_csv(buffer.as_slice()).unwrap();
        assert_eq!(again.len(), 3);
        assert_eq!(again.price_series().unwrap().values()[2], 99.0);
    }

    #[test]
    fn price_column_priority() {
        let csv = "Date,Close,Settle\n2017-01-03,1.0,2.0\n";
        let table = PriceTable::from_csv(csv.as_bytes()).unwrap();
        assert_eq!(table.price_column().unwrap(), "Settle");

        let csv = "Date,Open,High\n2017-01-03,1.0,2.0\n";
        let table = PriceTable::from_csv(csv.as_bytes()).unwrap();
        assert!(matches!(
            table.price_column(),
            Err(DataError::NoPriceColumn { .. })
        ));
    }

    #[test]
    fn cleaning_primitives() {
        let csv = "Date,Settle\n2017-01-03,100.0\n2017-01-04,-1.0\n2017-01-05,102.0\n";
        let mut table = PriceTable::from_csv(csv.as_bytes()).unwrap();
        table.mask_rows_where_nonpositive("Settle");
        table.fill_forward_backward();
        let prices = table.price_series().unwrap();
        assert_eq!(prices.values(), &[100.0, 100.0, 102.0]);

        table.scale_through(NaiveDate::from_ymd_opt(2017, 1, 4).unwrap(), 0.1);
        let prices = table.price_series().unwrap();
        assert_eq!(prices.values(), &[10.0, 10.0, 102.0]);
    }
}
