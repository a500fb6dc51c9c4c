use crate::calendar::date_shift;
use crate::config::{InstrumentConfig, PriceSourceKind};
use crate::data::{load_fx_rates, DataError};
use crate::instrument::{BacktestContext, ContractSeries, InstrumentError};
use crate::markets::{self, MarketSpec, DEFAULT_ROLL_RULE};
use crate::series::{sum_series, TimeSeries};
use crate::ticker::{delivery_month_begin, next_ticker, to_yyyymm};
use chrono::NaiveDate;
use tracing::{debug, info};

//an ordered, gapless chain of expiring contracts presented as one
//continuous instrument
#[derive(Debug, Clone)]
pub struct ContinuousInstrument {
    name: String,
    spec: MarketSpec,
    nth_contract: usize,
    roll_rule: String,
    slippage: f64,
    force_refresh: bool,
    price_source: PriceSourceKind,
    backtest_ccy: String,
    contracts: Vec<ContractSeries>,
}

impl ContinuousInstrument {
    pub fn new(spec: MarketSpec, config: &InstrumentConfig) -> Self {
        let roll_rule = config
            .roll_rule
            .clone()
            .unwrap_or_else(|| DEFAULT_ROLL_RULE.to_string());
        //until an engine pushes its own currency down, returns stay in the
        //contract currency
        let backtest_ccy = spec.currency.to_string();

        ContinuousInstrument {
            name: spec.name.to_string(),
            spec,
            nth_contract: config.nth_contract.max(1),
            roll_rule,
            slippage: config.slippage,
            force_refresh: config.force_refresh,
            price_source: config.price_source,
            backtest_ccy,
            contracts: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn contracts(&self) -> &[ContractSeries] {
        &self.contracts
    }

    pub fn backtest_ccy(&self) -> &str {
        &self.backtest_ccy
    }

    pub fn set_return_currency(&mut self, currency: &str) {
        self.backtest_ccy = currency.to_string();
    }

    //discovers the contract universe, assigns roll windows and trims to the
    //requested backtest window
    pub fn backtest(
        &mut self,
        ctx: &BacktestContext,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<(), InstrumentError> {
        info!(instrument = %self.name, "running instrument layer");

        if self.price_source != PriceSourceKind::FuturesContracts {
            return Err(InstrumentError::Unsupported(format!(
                "price source {:?}",
                self.price_source
            )));
        }

        let contracts = self.enumerate_contracts(ctx)?;
        let chain = self.assemble_chain(contracts)?;
        self.contracts = trim_chain(chain, start, end);
        Ok(())
    }

    //walks tickers from the first listed contract (across splice legs for
    //renamed roots) until probing runs past today's universe
    fn enumerate_contracts(
        &self,
        ctx: &BacktestContext,
    ) -> Result<Vec<ContractSeries>, InstrumentError> {
        let fx_rates = if self.spec.currency != self.backtest_ccy {
            Some(load_fx_rates(
                ctx.store,
                self.spec.currency,
                &self.backtest_ccy,
            )?)
        } else {
            None
        };

        let legs: Vec<(MarketSpec, Option<u32>)> = if self.spec.is_spliced() {
            self.spec
                .splice
                .iter()
                .map(|leg| {
                    markets::lookup(leg.market)
                        .map(|spec| (spec, leg.until_yyyymm))
                        .ok_or_else(|| InstrumentError::UnknownMarket(leg.market.to_string()))
                })
                .collect::<Result<_, _>>()?
        } else {
            vec![(self.spec.clone(), None)]
        };

        let mut contracts = Vec::new();
        'legs: for (leg_spec, until_yyyymm) in legs {
            let mut ticker = leg_spec.first_ticker();
            loop {
                if let Some(until) = until_yyyymm {
                    if to_yyyymm(&ticker)? > until {
                        break;
                    }
                }

                match ContractSeries::load(
                    &leg_spec,
                    &ticker,
                    &self.roll_rule,
                    self.slippage,
                    &self.backtest_ccy,
                    fx_rates.clone(),
                    ctx.source,
                    ctx.store,
                    ctx.today,
                    self.force_refresh,
                ) {
                    Ok(contract) => contracts.push(contract),
                    Err(InstrumentError::Data(DataError::NotFound(_))) => {
                        //an unlisted contract ends the probe only once its
                        //delivery month lies in the future
                        let month_end =
                            date_shift(delivery_month_begin(&ticker)?, "+MonthEnd")?;
                        if month_end > ctx.today {
                            break 'legs;
                        }
                        debug!(ticker = %ticker, "contract not listed, skipping");
                    }
                    Err(err) => return Err(err),
                }

                ticker = next_ticker(&ticker, leg_spec.roll_schedule)?;
            }
        }
        Ok(contracts)
    }

    //entry i rolls on the own-roll date of entry i - nth + 1; the first
    //nth - 1 entries only supply lookahead roll dates and are dropped
    fn assemble_chain(
        &self,
        mut contracts: Vec<ContractSeries>,
    ) -> Result<Vec<ContractSeries>, InstrumentError> {
        let depth = self.nth_contract;
        if contracts.len() < depth {
            return Ok(Vec::new());
        }

        let rolls: Vec<NaiveDate> = contracts.iter().map(|c| c.roll_date()).collect();
        let mut previous_end: Option<NaiveDate> = None;
        for (i, contract) in contracts.iter_mut().enumerate().skip(depth - 1) {
            let end = rolls[i + 1 - depth];
            let start = match previous_end {
                None => None,
                Some(e) => Some(date_shift(e, "+1bd")?),
            };
            contract.set_active_window(start, end);
            previous_end = Some(end);
        }

        Ok(contracts.split_off(depth - 1))
    }

    pub fn final_gross_returns(&self) -> Result<TimeSeries, InstrumentError> {
        self.aggregate_contract_returns(true)
    }

    pub fn final_net_returns(&self) -> Result<TimeSeries, InstrumentError> {
        self.aggregate_contract_returns(false)
    }

    fn aggregate_contract_returns(&self, gross: bool) -> Result<TimeSeries, InstrumentError> {
        let parts = self
            .contracts
            .iter()
            .map(|c| c.final_returns(gross))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sum_series(&parts))
    }

    pub fn final_positions(&self) -> TimeSeries {
        let parts: Vec<TimeSeries> = self.contracts.iter().map(|c| c.final_positions()).collect();
        sum_series(&parts)
    }

    //joins an upper layer's multiplier into every contract of the chain
    pub fn propagate_series(
        &mut self,
        name: &str,
        series: &TimeSeries,
    ) -> Result<(), InstrumentError> {
        for contract in &mut self.contracts {
            contract.join_position_series(name, series)?;
        }
        Ok(())
    }

    pub fn propagate_constant(&mut self, name: &str, value: f64) -> Result<(), InstrumentError> {
        for contract in &mut self.contracts {
            contract.join_position_constant(name, value)?;
        }
        Ok(())
    }
}

//contracts trimmed empty by the backtest window fall out of the chain
fn trim_chain(
    mut chain: Vec<ContractSeries>,
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> Vec<ContractSeries> {
    for contract in &mut chain {
        contract.trim(start, end);
    }
    chain.retain(ContractSeries::has_observations);
    chain
}
