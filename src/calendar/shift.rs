use chrono::{Datelike, Duration, Months, NaiveDate, Weekday};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CalendarError {
    #[error("Empty shift expression")]
    EmptyExpression,
    #[error("Malformed shift token '{0}'")]
    MalformedToken(String),
    #[error("Unknown shift unit '{0}'")]
    UnknownUnit(String),
    #[error("Date arithmetic out of range for '{0}'")]
    OutOfRange(String),
}

//one unit of a shift expression
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ShiftUnit {
    Day,
    BusinessDay,
    Week,
    Month,
    Year,
    WeekdayAnchor(Weekday),
    MonthEnd,
    MonthBegin,
    BusinessMonthEnd,
}

//applies a shift expression such as "+MonthEnd-3bd" to a date
//tokens are applied left to right; each token is a signed or unsigned
//integer magnitude (defaulting to one) followed by a unit name
pub fn date_shift(date: NaiveDate, expression: &str) -> Result<NaiveDate, CalendarError> {
    let mut shifted = date;
    for (n, unit) in parse_shift(expression)? {
        shifted = apply_unit(shifted, n, unit, expression)?;
    }
    Ok(shifted)
}

fn parse_shift(expression: &str) -> Result<Vec<(i32, ShiftUnit)>, CalendarError> {
    let mut tokens: Vec<String> = Vec::new();
    let mut current = String::new();

    for ch in expression.chars() {
        if (ch == '+' || ch == '-') && !current.is_empty() {
            tokens.push(current.clone());
            current.clear();
        }
        if !ch.is_whitespace() {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    if tokens.is_empty() {
        return Err(CalendarError::EmptyExpression);
    }

    tokens.iter().map(|token| parse_token(token)).collect()
}

fn parse_token(token: &str) -> Result<(i32, ShiftUnit), CalendarError> {
    let (sign, rest) = if let Some(stripped) = token.strip_prefix('+') {
        (1, stripped)
    } else if let Some(stripped) = token.strip_prefix('-') {
        (-1, stripped)
    } else {
        (1, token)
    };

    let digits_end = rest
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(rest.len());
    let (digits, unit_name) = rest.split_at(digits_end);

    if unit_name.is_empty() {
        return Err(CalendarError::MalformedToken(token.to_string()));
    }

    let magnitude: i32 = if digits.is_empty() {
        1
    } else {
        digits
            .parse()
            .map_err(|_| CalendarError::MalformedToken(token.to_string()))?
    };

    let unit = match unit_name.to_ascii_lowercase().as_str() {
        "d" | "day" | "days" => ShiftUnit::Day,
        "bd" | "businessday" => ShiftUnit::BusinessDay,
        "w" | "week" => ShiftUnit::Week,
        "m" => ShiftUnit::Month,
        "y" => ShiftUnit::Year,
        "mon" => ShiftUnit::WeekdayAnchor(Weekday::Mon),
        "tue" => ShiftUnit::WeekdayAnchor(Weekday::Tue),
        "wed" => ShiftUnit::WeekdayAnchor(Weekday::Wed),
        "thu" => ShiftUnit::WeekdayAnchor(Weekday::Thu),
        "fri" => ShiftUnit::WeekdayAnchor(Weekday::Fri),
        "sat" => ShiftUnit::WeekdayAnchor(Weekday::Sat),
        "sun" => ShiftUnit::WeekdayAnchor(Weekday::Sun),
        "monthend" => ShiftUnit::MonthEnd,
        "monthbegin" => ShiftUnit::MonthBegin,
        "bmonthend" => ShiftUnit::BusinessMonthEnd,
        other => return Err(CalendarError::UnknownUnit(other.to_string())),
    };

    Ok((sign * magnitude, unit))
}

fn apply_unit(
    date: NaiveDate,
    n: i32,
    unit: ShiftUnit,
    expression: &str,
) -> Result<NaiveDate, CalendarError> {
    let out_of_range = || CalendarError::OutOfRange(expression.to_string());

    match unit {
        ShiftUnit::Day => date
            .checked_add_signed(Duration::days(n as i64))
            .ok_or_else(out_of_range),
        ShiftUnit::Week => date
            .checked_add_signed(Duration::days(7 * n as i64))
            .ok_or_else(out_of_range),
        ShiftUnit::Month => add_months(date, n).ok_or_else(out_of_range),
        ShiftUnit::Year => add_months(date, 12 * n).ok_or_else(out_of_range),
        ShiftUnit::BusinessDay => Ok(shift_business_days(date, n)),
        ShiftUnit::WeekdayAnchor(weekday) => Ok(shift_weekday_anchor(date, n, weekday)),
        ShiftUnit::MonthEnd => Ok(shift_month_anchor(date, n, month_end)),
        ShiftUnit::MonthBegin => Ok(shift_month_begin(date, n)),
        ShiftUnit::BusinessMonthEnd => Ok(shift_month_anchor(date, n, business_month_end)),
    }
}

fn add_months(date: NaiveDate, n: i32) -> Option<NaiveDate> {
    if n >= 0 {
        date.checked_add_months(Months::new(n as u32))
    } else {
        date.checked_sub_months(Months::new((-n) as u32))
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

//zero steps roll a weekend date forward to the next weekday
fn shift_business_days(date: NaiveDate, n: i32) -> NaiveDate {
    let mut current = date;
    if n == 0 {
        while is_weekend(current) {
            current += Duration::days(1);
        }
        return current;
    }

    let step = if n > 0 { 1 } else { -1 };
    for _ in 0..n.abs() {
        current += Duration::days(step);
        while is_weekend(current) {
            current += Duration::days(step);
        }
    }
    current
}

//moves to the n-th occurrence of the given weekday, strictly before or
//after the starting date
fn shift_weekday_anchor(date: NaiveDate, n: i32, weekday: Weekday) -> NaiveDate {
    let mut current = date;
    if n == 0 {
        while current.weekday() != weekday {
            current += Duration::days(1);
        }
        return current;
    }

    let step = if n > 0 { 1 } else { -1 };
    for _ in 0..n.abs() {
        current += Duration::days(step);
        while current.weekday() != weekday {
            current += Duration::days(step);
        }
    }
    current
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let first = NaiveDate::from_ymd_opt(year, month, 1).unwrap();
    let next = if month == 12 {
        NaiveDate::from_ymd_opt(year + 1, 1, 1).unwrap()
    } else {
        NaiveDate::from_ymd_opt(year, month + 1, 1).unwrap()
    };
    (next - first).num_days() as u32
}

fn month_end(year: i32, month: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(year, month, days_in_month(year, month)).unwrap()
}

fn business_month_end(year: i32, month: u32) -> NaiveDate {
    let mut current = month_end(year, month);
    while is_weekend(current) {
        current -= Duration::days(1);
    }
    current
}

fn prev_month(year: i32, month: u32) -> (i32, u32) {
    if month == 1 {
        (year - 1, 12)
    } else {
        (year, month - 1)
    }
}

fn next_month(year: i32, month: u32) -> (i32, u32) {
    if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    }
}

//anchored month-end style offsets: a positive step lands on the current
//month's anchor unless the date is already on or past it
fn shift_month_anchor(date: NaiveDate, n: i32, anchor: fn(i32, u32) -> NaiveDate) -> NaiveDate {
    let mut current = date;
    for _ in 0..n.abs() {
        let this = anchor(current.year(), current.month());
        current = if n > 0 {
            if current < this {
                this
            } else {
                let (y, m) = next_month(current.year(), current.month());
                anchor(y, m)
            }
        } else if current > this {
            this
        } else {
            let (y, m) = prev_month(current.year(), current.month());
            anchor(y, m)
        };
    }
    current
}

fn shift_month_begin(date: NaiveDate, n: i32) -> NaiveDate {
    let mut current = date;
    for _ in 0..n.abs() {
        let first = NaiveDate::from_ymd_opt(current.year(), current.month(), 1).unwrap();
        current = if n > 0 {
            let (y, m) = next_month(current.year(), current.month());
            NaiveDate::from_ymd_opt(y, m, 1).unwrap()
        } else if current > first {
            first
        } else {
            let (y, m) = prev_month(current.year(), current.month());
            NaiveDate::from_ymd_opt(y, m, 1).unwrap()
        };
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn business_day_shifts() {
        //2016-08-01 is a monday
        assert_eq!(date_shift(d(2016, 8, 1), "+1bd").unwrap(), d(2016, 8, 2));
        assert_eq!(date_shift(d(2016, 8, 1), "-1bd").unwrap(), d(2016, 7, 29));
        //friday plus one business day skips the weekend
        assert_eq!(date_shift(d(2016, 8, 5), "+1bd").unwrap(), d(2016, 8, 8));
        //saturday rolls forward under a zero shift
        assert_eq!(date_shift(d(2016, 8, 6), "+0bd").unwrap(), d(2016, 8, 8));
        assert_eq!(date_shift(d(2016, 8, 6), "-1bd").unwrap(), d(2016, 8, 5));
    }

    #[test]
    fn weekday_anchors() {
        assert_eq!(date_shift(d(2016, 8, 1), "-Mon").unwrap(), d(2016, 7, 25));
        assert_eq!(date_shift(d(2016, 8, 1), "+Mon").unwrap(), d(2016, 8, 8));
        //wednesday to the coming friday
        assert_eq!(date_shift(d(2016, 8, 3), "+Fri").unwrap(), d(2016, 8, 5));
    }

    #[test]
    fn month_anchors() {
        assert_eq!(
            date_shift(d(2016, 8, 1), "+MonthEnd").unwrap(),
            d(2016, 8, 31)
        );
        assert_eq!(
            date_shift(d(2016, 8, 31), "+MonthEnd").unwrap(),
            d(2016, 9, 30)
        );
        assert_eq!(
            date_shift(d(2016, 8, 15), "-MonthEnd").unwrap(),
            d(2016, 7, 31)
        );
        assert_eq!(
            date_shift(d(2016, 8, 1), "+MonthBegin").unwrap(),
            d(2016, 9, 1)
        );
        assert_eq!(
            date_shift(d(2016, 8, 15), "-MonthBegin").unwrap(),
            d(2016, 8, 1)
        );
        //june 1990 ends on a saturday
        assert_eq!(
            date_shift(d(1990, 6, 1), "+BMonthEnd").unwrap(),
            d(1990, 6, 29)
        );
        assert_eq!(
            date_shift(d(1990, 6, 1), "-BMonthEnd").unwrap(),
            d(1990, 5, 31)
        );
    }

    #[test]
    fn concatenated_tokens() {
        assert_eq!(
            date_shift(d(2016, 8, 1), "+MonthEnd-3bd").unwrap(),
            d(2016, 8, 26)
        );
        //the third friday rule used by index futures
        assert_eq!(
            date_shift(d(1997, 12, 1), "-1Fri+1Fri+2Fri").unwrap(),
            d(1997, 12, 19)
        );
    }

    #[test]
    fn roll_rule_examples() {
        assert_eq!(date_shift(d(1997, 12, 19), "-3bd").unwrap(), d(1997, 12, 16));
        assert_eq!(date_shift(d(1990, 6, 20), "-3bd").unwrap(), d(1990, 6, 15));
        assert_eq!(date_shift(d(1990, 5, 31), "-3bd").unwrap(), d(1990, 5, 28));
    }

    #[test]
    fn calendar_units() {
        assert_eq!(date_shift(d(2016, 1, 31), "+1m").unwrap(), d(2016, 2, 29));
        assert_eq!(date_shift(d(2016, 8, 1), "-1m+24d").unwrap(), d(2016, 7, 25));
        assert_eq!(date_shift(d(2016, 8, 1), "-1y").unwrap(), d(2015, 8, 1));
        assert_eq!(date_shift(d(2016, 8, 1), "+1w").unwrap(), d(2016, 8, 8));
    }

    #[test]
    fn bad_expressions() {
        assert!(matches!(
            date_shift(d(2016, 8, 1), "+1fortnight"),
            Err(CalendarError::UnknownUnit(_))
        ));
        assert!(matches!(
            date_shift(d(2016, 8, 1), ""),
            Err(CalendarError::EmptyExpression)
        ));
        assert!(matches!(
            date_shift(d(2016, 8, 1), "+3"),
            Err(CalendarError::MalformedToken(_))
        ));
    }
}
