use chrono::NaiveDate;
use thiserror::Error;

//futures month codes in delivery order, january through december
pub const MONTH_CODES: &str = "FGHJKMNQUVXZ";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TickerError {
    #[error("'{0}' is not a valid contract ticker")]
    InvalidTicker(String),
    #[error("'{0}' is not a futures month code")]
    InvalidMonthCode(char),
    #[error("Month code '{code}' is not part of roll schedule '{schedule}'")]
    MonthNotInSchedule { code: char, schedule: String },
}

//decomposed contract ticker such as CME/ESZ1997
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickerParts {
    pub exchange: String,
    pub root: String,
    pub month_code: char,
    pub year: i32,
}

impl TickerParts {
    pub fn compose(&self) -> String {
        format!(
            "{}/{}{}{}",
            self.exchange, self.root, self.month_code, self.year
        )
    }
}

//splits EXCHANGE/ROOT + month code + four-digit year
pub fn decompose(ticker: &str) -> Result<TickerParts, TickerError> {
    let invalid = || TickerError::InvalidTicker(ticker.to_string());

    let (exchange, contract) = ticker.split_once('/').ok_or_else(invalid)?;
    if exchange.is_empty() || contract.len() < 6 {
        return Err(invalid());
    }

    let (head, year_digits) = contract.split_at(contract.len() - 4);
    if !year_digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    let year: i32 = year_digits.parse().map_err(|_| invalid())?;

    let month_code = head.chars().last().ok_or_else(invalid)?;
    if !MONTH_CODES.contains(month_code) {
        return Err(TickerError::InvalidMonthCode(month_code));
    }
    let root = &head[..head.len() - month_code.len_utf8()];
    if root.is_empty() {
        return Err(invalid());
    }

    Ok(TickerParts {
        exchange: exchange.to_string(),
        root: root.to_string(),
        month_code,
        year,
    })
}

//a bare EXCHANGE/ROOT denotes the generic continuous root
pub fn is_generic(ticker: &str) -> bool {
    ticker.contains('/') && decompose(ticker).is_err()
}

pub fn delivery_month(code: char) -> Result<u32, TickerError> {
    MONTH_CODES
        .find(code)
        .map(|idx| idx as u32 + 1)
        .ok_or(TickerError::InvalidMonthCode(code))
}

//first calendar day of the delivery month
pub fn delivery_month_begin(ticker: &str) -> Result<NaiveDate, TickerError> {
    let parts = decompose(ticker)?;
    let month = delivery_month(parts.month_code)?;
    NaiveDate::from_ymd_opt(parts.year, month, 1)
        .ok_or_else(|| TickerError::InvalidTicker(ticker.to_string()))
}

//delivery month as yyyymm, e.g. CME/ESH2000 -> 200003
pub fn to_yyyymm(ticker: &str) -> Result<u32, TickerError> {
    let parts = decompose(ticker)?;
    let month = delivery_month(parts.month_code)?;
    Ok(parts.year as u32 * 100 + month)
}

//next contract ticker under a roll schedule of month codes; the december
//end of a schedule wraps into the following year
pub fn next_ticker(ticker: &str, schedule: &str) -> Result<String, TickerError> {
    let parts = decompose(ticker)?;

    let idx = schedule
        .find(parts.month_code)
        .ok_or(TickerError::MonthNotInSchedule {
            code: parts.month_code,
            schedule: schedule.to_string(),
        })?;

    let next = if idx == schedule.len() - 1 {
        TickerParts {
            month_code: schedule.chars().next().unwrap(),
            year: parts.year + 1,
            ..parts
        }
    } else {
        TickerParts {
            month_code: schedule.chars().nth(idx + 1).unwrap(),
            ..parts
        }
    };

    Ok(next.compose())
}
