use crate::calendar::date_shift;
use crate::data::{CsvStore, DataError, DataSource, PriceTable};
use crate::instrument::InstrumentError;
use crate::markets::{self, Denominator, MarketSpec, PointFix};
use crate::series::{DuplicateColumn, PositionTable, TimeSeries};
use crate::ticker::delivery_month_begin;
use chrono::NaiveDate;
use tracing::debug;

//one expiring futures contract: its cleaned price history, roll/expiry
//dates, and the stack of position multiplier columns layered on top
#[derive(Debug, Clone)]
pub struct ContractSeries {
    ticker: String,
    market: String,
    tick_size: f64,
    slippage: f64,
    denominator: Option<Denominator>,
    contract_ccy: String,
    backtest_ccy: String,
    fx_rates: Option<TimeSeries>,
    data: PriceTable,
    roll_date: NaiveDate,
    start_date: Option<NaiveDate>,
    end_date: Option<NaiveDate>,
    position: PositionTable,
    is_expired: bool,
}

impl ContractSeries {
    //builds a contract from an already fetched price table; cleaning and
    //roll-date computation happen here
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        spec: &MarketSpec,
        ticker: &str,
        roll_rule: &str,
        slippage: f64,
        backtest_ccy: &str,
        fx_rates: Option<TimeSeries>,
        mut data: PriceTable,
        today: NaiveDate,
    ) -> Result<Self, InstrumentError> {
        clean_data(spec.name, &mut data)?;

        let month_begin = delivery_month_begin(ticker)?;
        let last_trade = date_shift(month_begin, spec.last_trade_rule)?;
        let roll_date = compute_roll_date(spec, ticker, month_begin, roll_rule)?;
        let is_expired = check_expired(&data, last_trade, today)?;

        let base = vec![0.0; data.len()];
        let position = PositionTable::new(data.dates().to_vec(), base);

        Ok(ContractSeries {
            ticker: ticker.to_string(),
            market: spec.name.to_string(),
            tick_size: spec.tick_size,
            slippage,
            denominator: spec.denominator,
            contract_ccy: spec.currency.to_string(),
            backtest_ccy: backtest_ccy.to_string(),
            fx_rates,
            data,
            roll_date,
            start_date: None,
            end_date: None,
            position,
            is_expired,
        })
    }

    //fetches the price table through the cache, then builds the contract;
    //a live contract in the cache is refreshed from the source
    #[allow(clippy::too_many_arguments)]
    pub fn load(
        spec: &MarketSpec,
        ticker: &str,
        roll_rule: &str,
        slippage: f64,
        backtest_ccy: &str,
        fx_rates: Option<TimeSeries>,
        source: &dyn DataSource,
        store: &CsvStore,
        today: NaiveDate,
        force_refresh: bool,
    ) -> Result<Self, InstrumentError> {
        let month_begin = delivery_month_begin(ticker)?;
        let last_trade = date_shift(month_begin, spec.last_trade_rule)?;

        let data = match store.read(ticker)? {
            Some(cached) => {
                let expired = check_expired(&cached, last_trade, today)?;
                if expired && !force_refresh {
                    debug!(ticker, "serving expired contract from cache");
                    cached
                } else {
                    match source.fetch(ticker) {
                        Ok(fresh) => {
                            store.write(ticker, &fresh)?;
                            fresh
                        }
                        //a live contract the source no longer carries:
                        //fall back to what the cache has
                        Err(DataError::NotFound(_)) => cached,
                        Err(err) => return Err(err.into()),
                    }
                }
            }
            None => {
                let fresh = source.fetch(ticker)?;
                store.write(ticker, &fresh)?;
                fresh
            }
        };

        ContractSeries::new(
            spec,
            ticker,
            roll_rule,
            slippage,
            backtest_ccy,
            fx_rates,
            data,
            today,
        )
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn market(&self) -> &str {
        &self.market
    }

    pub fn roll_date(&self) -> NaiveDate {
        self.roll_date
    }

    pub fn start_date(&self) -> Option<NaiveDate> {
        self.start_date
    }

    pub fn end_date(&self) -> Option<NaiveDate> {
        self.end_date
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired
    }

    pub fn position(&self) -> &PositionTable {
        &self.position
    }

    pub fn data(&self) -> &PriceTable {
        &self.data
    }

    //assigns the active window and the base position column: weight one on
    //[start, end] inclusive, zero elsewhere
    pub fn set_active_window(&mut self, start: Option<NaiveDate>, end: NaiveDate) {
        self.start_date = start;
        self.end_date = Some(end);

        let base = self
            .data
            .dates()
            .iter()
            .map(|&d| {
                let after_start = start.map_or(true, |s| d >= s);
                if after_start && d <= end {
                    1.0
                } else {
                    0.0
                }
            })
            .collect();
        self.position = PositionTable::new(self.data.dates().to_vec(), base);
    }

    //restricts data and positions to the backtest window
    pub fn trim(&mut self, start: Option<NaiveDate>, end: Option<NaiveDate>) {
        self.data.trim(start, end);
        self.position.trim(start, end);
    }

    pub fn has_observations(&self) -> bool {
        !self.data.is_empty()
    }

    pub fn price_for_return(&self) -> Result<TimeSeries, DataError> {
        self.data.price_series()
    }

    //per-period raw return in the backtest currency
    pub fn calc_return(&self) -> Result<TimeSeries, InstrumentError> {
        let price = self.price_for_return()?;
        let mut raw = match self.denominator {
            //percent-of-price change
            None => price.pct_change(),
            //absolute change over a market-convention basis
            Some(denominator) => price.diff().scale(1.0 / denominator.basis()),
        }
        .fill_value(0.0);

        for date in markets::return_skip_dates(&self.market) {
            raw.set(parse_fix_date(date), 0.0);
        }

        self.convert_return_ccy(raw)
    }

    //re-expresses returns via the daily fx factor; identity when the
    //contract already trades in the backtest currency
    fn convert_return_ccy(&self, returns: TimeSeries) -> Result<TimeSeries, InstrumentError> {
        if self.contract_ccy == self.backtest_ccy {
            return Ok(returns);
        }
        let spot = self.fx_rates.as_ref().ok_or_else(|| {
            DataError::MissingFxRates(self.contract_ccy.clone(), self.backtest_ccy.clone())
        })?;

        let factor = spot
            .reindex(returns.dates())
            .fill_forward()
            .pct_change()
            .fill_value(0.0)
            .map(|v| v + 1.0);
        Ok(returns.mul(&factor))
    }

    //row-wise product of the base and every layered multiplier; trading
    //lags are already embedded in the layered columns
    pub fn final_positions(&self) -> TimeSeries {
        self.position.product()
    }

    pub fn final_gross_returns(&self) -> Result<TimeSeries, InstrumentError> {
        Ok(self.calc_return()?.mul(&self.final_positions()))
    }

    //gross returns net of the transaction cost estimate:
    //cost = tick size * slippage * traded amount / padded price
    pub fn final_net_returns(&self) -> Result<TimeSeries, InstrumentError> {
        let final_positions = self.final_positions();

        let mut trade_amount = final_positions.diff().shift(-1).fill_value(0.0).abs();
        if let Some(first) = final_positions.first_date() {
            //entering the initial position is a trade as well
            let initial = final_positions.get(first).unwrap_or(0.0).abs();
            trade_amount.set(first, initial);
        }

        let price = self.price_for_return()?;
        let cost = price
            .recip()
            .fill_forward()
            .scale(self.tick_size * self.slippage)
            .mul(&trade_amount);

        Ok(self.final_gross_returns()?.sub(&cost))
    }

    pub fn final_returns(&self, gross: bool) -> Result<TimeSeries, InstrumentError> {
        if gross {
            self.final_gross_returns()
        } else {
            self.final_net_returns()
        }
    }

    pub fn join_position_series(
        &mut self,
        name: &str,
        series: &TimeSeries,
    ) -> Result<(), DuplicateColumn> {
        self.position.join(name, series)
    }

    pub fn join_position_constant(&mut self, name: &str, value: f64) -> Result<(), DuplicateColumn> {
        let constant = TimeSeries::constant(self.position.dates(), value);
        self.position.join(name, &constant)
    }
}

//roll date under the configured rule: shifted last trade date, or the
//shifted first notice date when that is strictly earlier; a first notice
//that is not earlier signals inconsistent market data
fn compute_roll_date(
    spec: &MarketSpec,
    ticker: &str,
    month_begin: NaiveDate,
    roll_rule: &str,
) -> Result<NaiveDate, InstrumentError> {
    let last_trade = date_shift(month_begin, spec.last_trade_rule)?;
    let from_last_trade = date_shift(last_trade, roll_rule)?;

    match spec.first_notice_rule {
        None => Ok(from_last_trade),
        Some(rule) => {
            let first_notice = date_shift(month_begin, rule)?;
            let from_first_notice = date_shift(first_notice, roll_rule)?;
            if from_first_notice < from_last_trade {
                Ok(from_first_notice)
            } else {
                Err(InstrumentError::FirstNoticeOrder {
                    ticker: ticker.to_string(),
                    first_notice: from_first_notice,
                    last_trade: from_last_trade,
                })
            }
        }
    }
}

//a contract is expired once its data reaches the last trade date or has
//not printed for over a year
fn check_expired(
    data: &PriceTable,
    last_trade: NaiveDate,
    today: NaiveDate,
) -> Result<bool, InstrumentError> {
    match data.last_date() {
        None => Ok(true),
        Some(newest) => Ok(newest >= last_trade || newest < date_shift(today, "-1y")?),
    }
}

//known-bad dates are blanked and filled, non-positive prices are treated
//as missing, and documented point fixes run last
fn clean_data(market: &str, data: &mut PriceTable) -> Result<(), InstrumentError> {
    let skip_dates: Vec<NaiveDate> = markets::price_skip_dates(market)
        .iter()
        .map(|d| parse_fix_date(d))
        .collect();
    if !skip_dates.is_empty() {
        data.set_rows_missing(&skip_dates);
        data.fill_forward_backward();
    }

    let price_column = data.price_column()?;
    data.mask_rows_where_nonpositive(price_column);
    data.fill_forward_backward();

    for fix in markets::point_fixes(market) {
        match *fix {
            PointFix::ScaleThrough { date, factor } => {
                data.scale_through(parse_fix_date(date), factor);
            }
        }
    }
    Ok(())
}

fn parse_fix_date(date: &str) -> NaiveDate {
    NaiveDate::parse_from_str(date, "%Y-%m-%d").expect("hygiene tables hold iso dates")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markets::lookup;
    use approx::assert_relative_eq;
    use chrono::Datelike;
    use indexmap::IndexMap;

    fn business_days(from: NaiveDate, n: usize) -> Vec<NaiveDate> {
        let mut dates = Vec::with_capacity(n);
        let mut d = from;
        while dates.len() < n {
            if !matches!(d.weekday(), chrono::Weekday::Sat | chrono::Weekday::Sun) {
                dates.push(d);
            }
            d += chrono::Duration::days(1);
        }
        dates
    }

    fn table(dates: &[NaiveDate], prices: &[f64]) -> PriceTable {
        let mut columns = IndexMap::new();
        columns.insert("Settle".to_string(), prices.to_vec());
        PriceTable::new(dates.to_vec(), columns)
    }

    fn es_contract(prices: &[f64]) -> ContractSeries {
        let spec = lookup("CME_ES").unwrap();
        let dates = business_days(NaiveDate::from_ymd_opt(1997, 11, 3).unwrap(), prices.len());
        ContractSeries::new(
            &spec,
            "CME/ESZ1997",
            "-3bd",
            0.0,
            "USD",
            None,
            table(&dates, prices),
            NaiveDate::from_ymd_opt(1998, 6, 30).unwrap(),
        )
        .unwrap()
    }

    #[test]
    fn roll_date_from_last_trade() {
        let contract = es_contract(&[970.0, 972.0, 969.0, 974.0]);
        assert_eq!(
            contract.roll_date(),
            NaiveDate::from_ymd_opt(1997, 12, 16).unwrap()
        );
    }

    #[test]
    fn roll_date_prefers_earlier_first_notice() {
        let spec = lookup("CME_TY").unwrap();
        let dates = business_days(NaiveDate::from_ymd_opt(1990, 3, 1).unwrap(), 10);
        let prices = vec![93.0; 10];
        let contract = ContractSeries::new(
            &spec,
            "CME/TYM1990",
            "-3bd",
            0.0,
            "USD",
            None,
            table(&dates, &prices),
            NaiveDate::from_ymd_opt(1990, 12, 31).unwrap(),
        )
        .unwrap();
        //min(shift(1990-06-20), shift(1990-05-31)) under -3bd
        assert_eq!(
            contract.roll_date(),
            NaiveDate::from_ymd_opt(1990, 5, 28).unwrap()
        );
    }

    #[test]
    fn percent_returns_and_positions() {
        let mut contract = es_contract(&[100.0, 102.0, 104.04, 104.04]);
        let dates = contract.data().dates().to_vec();
        contract.set_active_window(Some(dates[0]), dates[2]);

        let returns = contract.calc_return().unwrap();
        assert_relative_eq!(returns.values()[0], 0.0);
        assert_relative_eq!(returns.values()[1], 0.02, epsilon = 1e-12);

        let gross = contract.final_gross_returns().unwrap();
        assert_relative_eq!(gross.values()[1], 0.02, epsilon = 1e-12);
        //inactive after the window end
        assert_relative_eq!(gross.values()[3], 0.0);
    }

    #[test]
    fn bond_returns_use_par_basis() {
        let spec = lookup("CME_TY").unwrap();
        let dates = business_days(NaiveDate::from_ymd_opt(1990, 3, 1).unwrap(), 3);
        let contract = ContractSeries::new(
            &spec,
            "CME/TYM1990",
            "-3bd",
            0.0,
            "USD",
            None,
            table(&dates, &[93.0, 94.0, 93.5]),
            NaiveDate::from_ymd_opt(1990, 12, 31).unwrap(),
        )
        .unwrap();

        let returns = contract.calc_return().unwrap();
        assert_relative_eq!(returns.values()[1], 1.0 / 100.0, epsilon = 1e-12);
        assert_relative_eq!(returns.values()[2], -0.5 / 100.0, epsilon = 1e-12);
    }

    #[test]
    fn cost_reduces_net_below_gross_on_trades() {
        let spec = lookup("CME_ES").unwrap();
        let dates = business_days(NaiveDate::from_ymd_opt(1997, 11, 3).unwrap(), 4);
        let mut contract = ContractSeries::new(
            &spec,
            "CME/ESZ1997",
            "-3bd",
            1.0,
            "USD",
            None,
            table(&dates, &[100.0, 101.0, 102.0, 103.0]),
            NaiveDate::from_ymd_opt(1998, 6, 30).unwrap(),
        )
        .unwrap();
        contract.set_active_window(Some(dates[0]), dates[3]);

        let gross = contract.final_gross_returns().unwrap();
        let net = contract.final_net_returns().unwrap();
        //initial entry is charged on the first date
        assert!(net.values()[0] < gross.values()[0]);
        let entry_cost = 0.25 * 1.0 / 100.0;
        assert_relative_eq!(gross.values()[0] - net.values()[0], entry_cost, epsilon = 1e-12);
        //no position change afterwards means no further cost
        assert_relative_eq!(net.values()[2], gross.values()[2]);
    }

    #[test]
    fn currency_conversion_identity_and_factor() {
        let spec = lookup("SGX_NK").unwrap();
        let dates = business_days(NaiveDate::from_ymd_opt(2017, 1, 2).unwrap(), 3);
        let fx = TimeSeries::new(dates.clone(), vec![0.0088, 0.0088, 0.0090]);
        let prices = [19000.0, 19000.0, 19190.0];

        let mut contract = ContractSeries::new(
            &spec,
            "SGX/NKH2017",
            "-3bd",
            0.0,
            "JPY",
            None,
            table(&dates, &prices),
            NaiveDate::from_ymd_opt(2017, 12, 29).unwrap(),
        )
        .unwrap();
        contract.set_active_window(Some(dates[0]), dates[2]);
        let domestic = contract.calc_return().unwrap();

        let mut converted = ContractSeries::new(
            &spec,
            "SGX/NKH2017",
            "-3bd",
            0.0,
            "USD",
            Some(fx),
            table(&dates, &prices),
            NaiveDate::from_ymd_opt(2017, 12, 29).unwrap(),
        )
        .unwrap();
        converted.set_active_window(Some(dates[0]), dates[2]);
        let usd = converted.calc_return().unwrap();

        //identity in the contract currency
        assert_relative_eq!(domestic.values()[2], 0.01, epsilon = 1e-12);
        //the return stream itself is unhedged period over period
        assert_relative_eq!(
            usd.values()[2],
            0.01 * (0.0090 / 0.0088),
            epsilon = 1e-12
        );
    }

    #[test]
    fn first_notice_must_precede_last_trade() {
        //a first notice rule far after the last trade date is inconsistent
        let mut spec = lookup("CME_TY").unwrap();
        spec.first_notice_rule = Some("+3m");
        let dates = business_days(NaiveDate::from_ymd_opt(1990, 3, 1).unwrap(), 3);
        let result = ContractSeries::new(
            &spec,
            "CME/TYM1990",
            "-3bd",
            0.0,
            "USD",
            None,
            table(&dates, &[93.0, 93.5, 94.0]),
            NaiveDate::from_ymd_opt(1990, 12, 31).unwrap(),
        );
        assert!(matches!(
            result,
            Err(InstrumentError::FirstNoticeOrder { .. })
        ));
    }
}
