use chrono::NaiveDate;
use statrs::statistics::Statistics;

//a date-indexed series of f64 observations
//dates are strictly ascending and NaN marks a missing value
#[derive(Debug, Clone, PartialEq)]
pub struct TimeSeries {
    dates: Vec<NaiveDate>,
    values: Vec<f64>,
}

//exponential decay parameterizations, all reducible to a single alpha
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EwmDecay {
    CenterOfMass(f64),
    Span(f64),
    HalfLife(f64),
    Alpha(f64),
}

impl EwmDecay {
    pub fn alpha(&self) -> f64 {
        match *self {
            EwmDecay::CenterOfMass(com) => 1.0 / (1.0 + com),
            EwmDecay::Span(span) => 2.0 / (span + 1.0),
            EwmDecay::HalfLife(halflife) => 1.0 - (0.5f64.ln() / halflife).exp(),
            EwmDecay::Alpha(alpha) => alpha,
        }
    }
}

impl TimeSeries {
    pub fn new(dates: Vec<NaiveDate>, values: Vec<f64>) -> Self {
        assert_eq!(dates.len(), values.len(), "dates and values must align");
        debug_assert!(dates.windows(2).all(|w| w[0] < w[1]), "dates must ascend");
        TimeSeries { dates, values }
    }

    pub fn empty() -> Self {
        TimeSeries {
            dates: Vec::new(),
            values: Vec::new(),
        }
    }

    pub fn constant(dates: &[NaiveDate], value: f64) -> Self {
        TimeSeries::new(dates.to_vec(), vec![value; dates.len()])
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

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    //looks up the observation on an exact date
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.dates
            .binary_search(&date)
            .ok()
            .map(|idx| self.values[idx])
    }

    pub fn set(&mut self, date: NaiveDate, value: f64) {
        if let Ok(idx) = self.dates.binary_search(&date) {
            self.values[idx] = value;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, f64)> + '_ {
        self.dates.iter().copied().zip(self.values.iter().copied())
    }

    //moves values forward (positive) or backward (negative) by whole periods
    pub fn shift(&self, periods: i64) -> Self {
        let n = self.len() as i64;
        let values = (0..n)
            .map(|i| {
                let src = i - periods;
                if src < 0 || src >= n {
                    f64::NAN
                } else {
                    self.values[src as usize]
                }
            })
            .collect();
        TimeSeries::new(self.dates.clone(), values)
    }

    pub fn diff(&self) -> Self {
        let values = (0..self.len())
            .map(|i| {
                if i == 0 {
                    f64::NAN
                } else {
                    self.values[i] - self.values[i - 1]
                }
            })
            .collect();
        TimeSeries::new(self.dates.clone(), values)
    }

    pub fn pct_change(&self) -> Self {
        let values = (0..self.len())
            .map(|i| {
                if i == 0 {
                    f64::NAN
                } else {
                    self.values[i] / self.values[i - 1] - 1.0
                }
            })
            .collect();
        TimeSeries::new(self.dates.clone(), values)
    }

    pub fn map<F: Fn(f64) -> f64>(&self, f: F) -> Self {
        let values = self.values.iter().map(|&v| f(v)).collect();
        TimeSeries::new(self.dates.clone(), values)
    }

    pub fn abs(&self) -> Self {
        self.map(f64::abs)
    }

    pub fn scale(&self, factor: f64) -> Self {
        self.map(|v| v * factor)
    }

    //reciprocal with non-finite results treated as missing
    pub fn recip(&self) -> Self {
        self.map(|v| {
            let r = 1.0 / v;
            if r.is_finite() {
                r
            } else {
                f64::NAN
            }
        })
    }

    pub fn clip(&self, floor: Option<f64>, cap: Option<f64>) -> Self {
        self.map(|v| {
            let mut clipped = v;
            if let Some(lo) = floor {
                clipped = clipped.max(lo);
            }
            if let Some(hi) = cap {
                clipped = clipped.min(hi);
            }
            clipped
        })
    }

    pub fn fill_forward(&self) -> Self {
        let mut last = f64::NAN;
        let values = self
            .values
            .iter()
            .map(|&v| {
                if !v.is_nan() {
                    last = v;
                }
                last
            })
            .collect();
        TimeSeries::new(self.dates.clone(), values)
    }

    pub fn fill_backward(&self) -> Self {
        let mut next = f64::NAN;
        let mut values: Vec<f64> = self
            .values
            .iter()
            .rev()
            .map(|&v| {
                if !v.is_nan() {
                    next = v;
                }
                next
            })
            .collect();
        values.reverse();
        TimeSeries::new(self.dates.clone(), values)
    }

    pub fn fill_value(&self, fill: f64) -> Self {
        self.map(|v| if v.is_nan() { fill } else { v })
    }

    //aligns both series on the union of their dates and combines them;
    //a missing operand yields a missing result
    pub fn zip_with<F: Fn(f64, f64) -> f64>(&self, other: &TimeSeries, f: F) -> Self {
        let dates = union_dates(&[self.dates(), other.dates()]);
        let values = dates
            .iter()
            .map(|&d| {
                let a = self.get(d).unwrap_or(f64::NAN);
                let b = other.get(d).unwrap_or(f64::NAN);
                f(a, b)
            })
            .collect();
        TimeSeries::new(dates, values)
    }

    pub fn mul(&self, other: &TimeSeries) -> Self {
        self.zip_with(other, |a, b| a * b)
    }

    pub fn sub(&self, other: &TimeSeries) -> Self {
        self.zip_with(other, |a, b| a - b)
    }

    pub fn div(&self, other: &TimeSeries) -> Self {
        self.zip_with(other, |a, b| a / b)
    }

    //projects onto a new date index; dates absent from the series are missing
    pub fn reindex(&self, dates: &[NaiveDate]) -> Self {
        let values = dates
            .iter()
            .map(|&d| self.get(d).unwrap_or(f64::NAN))
            .collect();
        TimeSeries::new(dates.to_vec(), values)
    }

    pub fn slice(&self, start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        let (mut dates, mut values) = (Vec::new(), Vec::new());
        for (d, v) in self.iter() {
            if start.is_some_and(|s| d < s) || end.is_some_and(|e| d > e) {
                continue;
            }
            dates.push(d);
            values.push(v);
        }
        TimeSeries::new(dates, values)
    }

    //trailing sample standard deviation; missing until the window is full
    pub fn rolling_std(&self, window: usize) -> Self {
        let values = (0..self.len())
            .map(|i| {
                if i + 1 < window {
                    return f64::NAN;
                }
                let slice = &self.values[i + 1 - window..=i];
                if slice.iter().any(|v| v.is_nan()) {
                    return f64::NAN;
                }
                slice.std_dev()
            })
            .collect();
        TimeSeries::new(self.dates.clone(), values)
    }

    //exponentially weighted mean with weights (1 - alpha)^age
    pub fn ewm_mean(&self, alpha: f64) -> Self {
        let decay = 1.0 - alpha;
        let mut weighted_sum = 0.0;
        let mut weight = 0.0;
        let values = self
            .values
            .iter()
            .map(|&v| {
                weighted_sum *= decay;
                weight *= decay;
                if !v.is_nan() {
                    weighted_sum += v;
                    weight += 1.0;
                }
                if weight > 0.0 {
                    weighted_sum / weight
                } else {
                    f64::NAN
                }
            })
            .collect();
        TimeSeries::new(self.dates.clone(), values)
    }

    //exponentially weighted standard deviation, debiased; missing until two
    //observations have been seen
    pub fn ewm_std(&self, alpha: f64) -> Self {
        let decay = 1.0 - alpha;
        let mut weight = 0.0;
        let mut weight_sq = 0.0;
        let mut mean = 0.0;
        let mut dev_sum = 0.0;
        let values = self
            .values
            .iter()
            .map(|&v| {
                weight *= decay;
                weight_sq *= decay * decay;
                dev_sum *= decay;
                if !v.is_nan() {
                    weight += 1.0;
                    weight_sq += 1.0;
                    let delta = v - mean;
                    mean += delta / weight;
                    dev_sum += delta * (v - mean);
                }
                let denom = weight * weight - weight_sq;
                if denom > 0.0 {
                    let debias = weight * weight / denom;
                    (dev_sum / weight * debias).max(0.0).sqrt()
                } else {
                    f64::NAN
                }
            })
            .collect();
        TimeSeries::new(self.dates.clone(), values)
    }
}

//sorted union of several date indices
pub fn union_dates(indices: &[&[NaiveDate]]) -> Vec<NaiveDate> {
    let mut dates: Vec<NaiveDate> = indices.iter().flat_map(|idx| idx.iter().copied()).collect();
    dates.sort_unstable();
    dates.dedup();
    dates
}

//column-wise sum over the union index, skipping missing entries
pub fn sum_series(series: &[TimeSeries]) -> TimeSeries {
    let indices: Vec<&[NaiveDate]> = series.iter().map(|s| s.dates()).collect();
    let dates = union_dates(&indices);
    let values = dates
        .iter()
        .map(|&d| {
            series
                .iter()
                .filter_map(|s| s.get(d))
                .filter(|v| !v.is_nan())
                .sum()
        })
        .collect();
    TimeSeries::new(dates, values)
}

//column-wise mean over the union index, skipping missing entries;
//dates where every series is missing stay missing
pub fn mean_series(series: &[TimeSeries]) -> TimeSeries {
    let indices: Vec<&[NaiveDate]> = series.iter().map(|s| s.dates()).collect();
    let dates = union_dates(&indices);
    let values = dates
        .iter()
        .map(|&d| {
            let observed: Vec<f64> = series
                .iter()
                .filter_map(|s| s.get(d))
                .filter(|v| !v.is_nan())
                .collect();
            if observed.is_empty() {
                f64::NAN
            } else {
                observed.iter().sum::<f64>() / observed.len() as f64
            }
        })
        .collect();
    TimeSeries::new(dates, values)
}

//per-date count of series carrying an observation
pub fn count_observed(series: &[TimeSeries]) -> TimeSeries {
    let indices: Vec<&[NaiveDate]> = series.iter().map(|s| s.dates()).collect();
    let dates = union_dates(&indices);
    let values = dates
        .iter()
        .map(|&d| {
            series
                .iter()
                .filter_map(|s| s.get(d))
                .filter(|v| !v.is_nan())
                .count() as f64
        })
        .collect();
    TimeSeries::new(dates, values)
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
    fn shift_and_diff() {
        let s = TimeSeries::new(dates(4), vec![1.0, 2.0, 4.0, 7.0]);
        let lagged = s.shift(1);
        assert!(lagged.values()[0].is_nan());
        assert_relative_eq!(lagged.values()[1], 1.0);

        let advanced = s.shift(-1);
        assert_relative_eq!(advanced.values()[0], 2.0);
        assert!(advanced.values()[3].is_nan());

        let d = s.diff();
        assert!(d.values()[0].is_nan());
        assert_relative_eq!(d.values()[2], 2.0);
    }

    #[test]
    fn fills() {
        let s = TimeSeries::new(dates(4), vec![f64::NAN, 2.0, f64::NAN, 3.0]);
        let padded = s.fill_forward();
        assert!(padded.values()[0].is_nan());
        assert_relative_eq!(padded.values()[2], 2.0);

        let backed = s.fill_backward();
        assert_relative_eq!(backed.values()[0], 2.0);
        assert_relative_eq!(backed.values()[2], 3.0);
    }

    #[test]
    fn union_alignment() {
        let idx = dates(4);
        let a = TimeSeries::new(idx[..3].to_vec(), vec![1.0, 2.0, 3.0]);
        let b = TimeSeries::new(idx[1..].to_vec(), vec![10.0, 20.0, 30.0]);

        let product = a.mul(&b);
        assert_eq!(product.len(), 4);
        assert!(product.values()[0].is_nan());
        assert_relative_eq!(product.values()[1], 20.0);
        assert!(product.values()[3].is_nan());

        let total = sum_series(&[a.clone(), b.clone()]);
        assert_relative_eq!(total.values()[0], 1.0);
        assert_relative_eq!(total.values()[1], 12.0);
        assert_relative_eq!(total.values()[3], 30.0);

        let count = count_observed(&[a, b]);
        assert_relative_eq!(count.values()[0], 1.0);
        assert_relative_eq!(count.values()[2], 2.0);
    }

    #[test]
    fn rolling_std_matches_sample_std() {
        let s = TimeSeries::new(dates(5), vec![1.0, 2.0, 3.0, 4.0, 5.0]);
        let vol = s.rolling_std(3);
        assert!(vol.values()[1].is_nan());
        //sample std of [1, 2, 3]
        assert_relative_eq!(vol.values()[2], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn ewm_mean_adjusted_weights() {
        let s = TimeSeries::new(dates(3), vec![1.0, 2.0, 3.0]);
        let m = s.ewm_mean(0.5);
        //weights 0.25, 0.5, 1.0 over [1, 2, 3]
        let expected = (0.25 * 1.0 + 0.5 * 2.0 + 1.0 * 3.0) / 1.75;
        assert_relative_eq!(m.values()[2], expected, epsilon = 1e-12);
    }

    #[test]
    fn ewm_std_needs_two_observations() {
        let s = TimeSeries::new(dates(4), vec![1.0, 2.0, 3.0, 4.0]);
        let vol = s.ewm_std(0.5);
        assert!(vol.values()[0].is_nan());
        assert!(vol.values()[1] > 0.0);
    }

    #[test]
    fn ewm_decay_alphas() {
        assert_relative_eq!(EwmDecay::CenterOfMass(1.0).alpha(), 0.5);
        assert_relative_eq!(EwmDecay::Span(3.0).alpha(), 0.5);
        assert_relative_eq!(EwmDecay::Alpha(0.2).alpha(), 0.2);
        assert_relative_eq!(EwmDecay::HalfLife(1.0).alpha(), 0.5);
    }
}
