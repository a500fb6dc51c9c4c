use crate::calendar::shift::{date_shift, CalendarError};
use crate::series::TimeSeries;

//changes the observation frequency of a series while keeping its index:
//a value survives only on dates where the rule-shifted index moves, the
//rest is forward-filled and the leading gap stays missing
pub fn resample_on_rule(series: &TimeSeries, rule: &str) -> Result<TimeSeries, CalendarError> {
    if series.is_empty() {
        return Ok(series.clone());
    }

    let shifted: Vec<_> = series
        .dates()
        .iter()
        .map(|&d| date_shift(d, rule))
        .collect::<Result<_, _>>()?;

    let values = series
        .values()
        .iter()
        .enumerate()
        .map(|(i, &v)| {
            if i > 0 && shifted[i] != shifted[i - 1] {
                v
            } else {
                f64::NAN
            }
        })
        .collect();

    Ok(TimeSeries::new(series.dates().to_vec(), values).fill_forward())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::NaiveDate;

    #[test]
    fn weekly_resample_holds_values_between_anchors() {
        //ten consecutive business days starting monday 2020-01-06
        let dates: Vec<NaiveDate> = (0..10)
            .map(|i| {
                let d = NaiveDate::from_ymd_opt(2020, 1, 6).unwrap()
                    + chrono::Duration::days(i + 2 * (i / 5));
                d
            })
            .collect();
        let values: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let series = TimeSeries::new(dates, values);

        let resampled = resample_on_rule(&series, "+Wed").unwrap();
        //the leading stretch before the first anchor change stays missing
        assert!(resampled.values()[0].is_nan());
        //a new value is picked up when the shifted index moves, then held
        let picked = resampled.values()[4];
        assert!(!picked.is_nan());
        assert_relative_eq!(resampled.values()[5], picked);
    }
}
