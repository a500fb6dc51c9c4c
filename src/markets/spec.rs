use serde::{Deserialize, Serialize};

//periods per year for annualizing daily statistics
pub const ANNUAL_FACTOR: f64 = 252.0;

//fallback roll rule applied ahead of the last trade or first notice date
pub const DEFAULT_ROLL_RULE: &str = "-3bd";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssetClass {
    EquityIndex,
    VolatilityIndex,
    GovernmentBond,
    MoneyMarket,
    Fx,
    Commodity,
}

//basis used to turn a raw price change into a return; markets without a
//denominator use percent-of-price
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Denominator {
    GovernmentBond,
    MoneyMarket,
}

impl Denominator {
    pub fn basis(&self) -> f64 {
        match self {
            //percent of par
            Denominator::GovernmentBond => 100.0,
            //percent of par on a quarterly deposit
            Denominator::MoneyMarket => 100.0 * 0.25,
        }
    }
}

//one leg of a spliced root: contracts are taken from this market up to and
//including the given delivery yyyymm; the final leg is open-ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpliceLeg {
    pub market: &'static str,
    pub until_yyyymm: Option<u32>,
}

//per-market listing conventions and data hygiene settings
#[derive(Debug, Clone)]
pub struct MarketSpec {
    pub name: &'static str,
    pub full_name: &'static str,
    pub asset_class: AssetClass,
    //first listed contract as month code plus year, e.g. Z1997
    pub start_from: &'static str,
    pub denominator: Option<Denominator>,
    pub tick_size: f64,
    pub currency: &'static str,
    //month codes of listed delivery months
    pub roll_schedule: &'static str,
    pub first_notice_rule: Option<&'static str>,
    pub last_trade_rule: &'static str,
    //historical predecessor roots concatenated into this one
    pub splice: &'static [SpliceLeg],
}

impl MarketSpec {
    //first contract ticker of this market, e.g. CME/ESZ1997
    pub fn first_ticker(&self) -> String {
        let (exchange, root) = self.name.split_once('_').unwrap_or(("", self.name));
        format!("{}/{}{}", exchange, root, self.start_from)
    }

    pub fn is_spliced(&self) -> bool {
        !self.splice.is_empty()
    }
}

const THIRD_FRIDAY: &str = "-1Fri+1Fri+2Fri";
const THIRD_WEDNESDAY_LESS_2: &str = "-1Wed+1Wed+2Wed-2bd";

macro_rules! market {
    ($fn_name:ident, $name:expr, $full:expr, $class:expr, $from:expr, $denom:expr,
     $tick:expr, $ccy:expr, $sched:expr, $notice:expr, $last:expr, $splice:expr) => {
        pub fn $fn_name() -> MarketSpec {
            MarketSpec {
                name: $name,
                full_name: $full,
                asset_class: $class,
                start_from: $from,
                denominator: $denom,
                tick_size: $tick,
                currency: $ccy,
                roll_schedule: $sched,
                first_notice_rule: $notice,
                last_trade_rule: $last,
                splice: $splice,
            }
        }
    };
}

const ALL_MONTHS: &str = "FGHJKMNQUVXZ";
const QUARTERLY: &str = "HMUZ";

const ES_SPLICE: &[SpliceLeg] = &[
    SpliceLeg {
        market: "CME_SP",
        until_yyyymm: Some(199709),
    },
    SpliceLeg {
        market: "CME_ES",
        until_yyyymm: None,
    },
];

const NQ_SPLICE: &[SpliceLeg] = &[
    SpliceLeg {
        market: "CME_ND",
        until_yyyymm: Some(199906),
    },
    SpliceLeg {
        market: "CME_NQ",
        until_yyyymm: None,
    },
];

impl MarketSpec {
    market!(cme_sp, "CME_SP", "Full-size S&P 500 Index", AssetClass::EquityIndex,
        "M1982", None, 0.1, "USD", QUARTERLY, None, THIRD_FRIDAY, &[]);
    market!(cme_es, "CME_ES", "E-mini S&P 500 Index", AssetClass::EquityIndex,
        "Z1997", None, 0.25, "USD", QUARTERLY, None, THIRD_FRIDAY, ES_SPLICE);
    market!(cme_nd, "CME_ND", "Full-size NASDAQ 100 Index", AssetClass::EquityIndex,
        "H1998", None, 0.25, "USD", QUARTERLY, None, THIRD_FRIDAY, &[]);
    market!(cme_nq, "CME_NQ", "E-mini NASDAQ 100 Index", AssetClass::EquityIndex,
        "U1999", None, 0.25, "USD", QUARTERLY, None, THIRD_FRIDAY, NQ_SPLICE);
    market!(ice_rf, "ICE_RF", "Russell 1000", AssetClass::EquityIndex,
        "U2008", None, 0.1, "USD", QUARTERLY, None, THIRD_FRIDAY, &[]);
    market!(sgx_nk, "SGX_NK", "Nikkei 225 Index", AssetClass::EquityIndex,
        "Z2013", None, 5.0, "JPY", QUARTERLY, None, "-Thu+Thu+Thu-2bd", &[]);
    market!(eurex_fesx, "EUREX_FESX", "EURO STOXX 50", AssetClass::EquityIndex,
        "U1998", None, 1.0, "EUR", QUARTERLY, None, THIRD_FRIDAY, &[]);
    market!(cboe_vx, "CBOE_VX", "VIX Futures", AssetClass::VolatilityIndex,
        "K2004", None, 0.05, "USD", ALL_MONTHS, None,
        "+MonthBegin-1Fri+1Fri+2Fri-30d+1bd-1bd", &[]);
    market!(cme_tu, "CME_TU", "2-year Treasury Note", AssetClass::GovernmentBond,
        "U1990", Some(Denominator::GovernmentBond), 1.0 / 128.0, "USD", QUARTERLY,
        Some("-BMonthEnd"), "+BMonthEnd", &[]);
    market!(cme_fv, "CME_FV", "5-year Treasury Note", AssetClass::GovernmentBond,
        "U1988", Some(Denominator::GovernmentBond), 1.0 / 128.0, "USD", QUARTERLY,
        Some("-BMonthEnd"), "+BMonthEnd", &[]);
    market!(cme_ty, "CME_TY", "10-year Treasury Note", AssetClass::GovernmentBond,
        "M1990", Some(Denominator::GovernmentBond), 1.0 / 64.0, "USD", QUARTERLY,
        Some("-BMonthEnd"), "+BMonthEnd-7bd", &[]);
    market!(cme_us, "CME_US", "30-year Treasury Bond", AssetClass::GovernmentBond,
        "Z1977", Some(Denominator::GovernmentBond), 1.0 / 32.0, "USD", QUARTERLY,
        Some("-BMonthEnd"), "+BMonthEnd-7bd", &[]);
    market!(eurex_fgbl, "EUREX_FGBL", "Euro-Bund", AssetClass::GovernmentBond,
        "H1991", Some(Denominator::GovernmentBond), 0.01, "EUR", QUARTERLY,
        None, "+9d-1bd+1bd-2bd", &[]);
    market!(liffe_r, "LIFFE_R", "Long Gilt", AssetClass::GovernmentBond,
        "U1990", Some(Denominator::GovernmentBond), 0.01, "GBP", QUARTERLY,
        Some("-2bd"), "+BMonthEnd-2bd", &[]);
    market!(sgx_jb, "SGX_JB", "10-year Mini Japanese Government Bond",
        AssetClass::GovernmentBond, "Z2013", Some(Denominator::GovernmentBond),
        0.01, "JPY", QUARTERLY, None, "+19d-1bd+1bd-5bd-5bd", &[]);
    market!(cme_ed, "CME_ED", "Eurodollar Futures", AssetClass::MoneyMarket,
        "H1982", Some(Denominator::MoneyMarket), 0.0025, "USD", QUARTERLY,
        None, THIRD_WEDNESDAY_LESS_2, &[]);
    market!(liffe_l, "LIFFE_L", "Short Sterling Futures", AssetClass::MoneyMarket,
        "H1990", Some(Denominator::MoneyMarket), 0.005, "GBP", QUARTERLY,
        None, "-1Wed+1Wed+2Wed", &[]);
    market!(cme_ec, "CME_EC", "Euro FX", AssetClass::Fx,
        "H1999", None, 0.00005, "USD", QUARTERLY, None, THIRD_WEDNESDAY_LESS_2, &[]);
    market!(cme_jy, "CME_JY", "Japanese Yen", AssetClass::Fx,
        "H1977", None, 0.005 * 100.0, "USD", QUARTERLY, None, THIRD_WEDNESDAY_LESS_2, &[]);
    market!(cme_br, "CME_BR", "Brazilian Real", AssetClass::Fx,
        "H1996", None, 0.005 / 100.0, "USD", QUARTERLY, None, THIRD_WEDNESDAY_LESS_2, &[]);
    market!(cme_gc, "CME_GC", "COMEX Gold", AssetClass::Commodity,
        "G1975", None, 0.1, "USD", "GJMQVZ", Some("+0bd"), "+MonthEnd-3bd", &[]);
    market!(cme_cl, "CME_CL", "WTI Crude Oil", AssetClass::Commodity,
        "M1983", None, 0.01, "USD", ALL_MONTHS, None, "-1m+24d+1bd-4bd", &[]);
    market!(cme_c, "CME_C", "Chicago Corn", AssetClass::Commodity,
        "H1960", None, 0.25, "USD", "HKNUZ", None, "+14d-1bd", &[]);
}

//registry of known markets
pub fn lookup(name: &str) -> Option<MarketSpec> {
    let spec = match name {
        "CME_SP" => MarketSpec::cme_sp(),
        "CME_ES" => MarketSpec::cme_es(),
        "CME_ND" => MarketSpec::cme_nd(),
        "CME_NQ" => MarketSpec::cme_nq(),
        "ICE_RF" => MarketSpec::ice_rf(),
        "SGX_NK" => MarketSpec::sgx_nk(),
        "EUREX_FESX" => MarketSpec::eurex_fesx(),
        "CBOE_VX" => MarketSpec::cboe_vx(),
        "CME_TU" => MarketSpec::cme_tu(),
        "CME_FV" => MarketSpec::cme_fv(),
        "CME_TY" => MarketSpec::cme_ty(),
        "CME_US" => MarketSpec::cme_us(),
        "EUREX_FGBL" => MarketSpec::eurex_fgbl(),
        "LIFFE_R" => MarketSpec::liffe_r(),
        "SGX_JB" => MarketSpec::sgx_jb(),
        "CME_ED" => MarketSpec::cme_ed(),
        "LIFFE_L" => MarketSpec::liffe_l(),
        "CME_EC" => MarketSpec::cme_ec(),
        "CME_JY" => MarketSpec::cme_jy(),
        "CME_BR" => MarketSpec::cme_br(),
        "CME_GC" => MarketSpec::cme_gc(),
        "CME_CL" => MarketSpec::cme_cl(),
        "CME_C" => MarketSpec::cme_c(),
        _ => return None,
    };
    Some(spec)
}

pub fn all_markets() -> Vec<MarketSpec> {
    [
        "CME_SP", "CME_ES", "CME_ND", "CME_NQ", "ICE_RF", "SGX_NK", "EUREX_FESX",
        "CBOE_VX", "CME_TU", "CME_FV", "CME_TY", "CME_US", "EUREX_FGBL", "LIFFE_R",
        "SGX_JB", "CME_ED", "LIFFE_L", "CME_EC", "CME_JY", "CME_BR", "CME_GC",
        "CME_CL", "CME_C",
    ]
    .iter()
    .map(|&name| lookup(name).unwrap())
    .collect()
}

//dates with known bad prices; the whole row is dropped and filled
pub fn price_skip_dates(market: &str) -> &'static [&'static str] {
    match market {
        "SGX_NK" => &["2018-01-26", "2018-01-29", "2018-01-30"],
        _ => &[],
    }
}

//dates whose computed returns are known to be spurious and are zeroed
pub fn return_skip_dates(market: &str) -> &'static [&'static str] {
    match market {
        "CME_BR" => &[
            "1999-12-14",
            "2000-01-03",
            "2000-03-28",
            "2000-11-24",
            "2000-12-01",
        ],
        _ => &[],
    }
}

//documented ad hoc corrections applied after the generic cleaning steps
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointFix {
    //rescale every column up to and including a date
    ScaleThrough { date: &'static str, factor: f64 },
}

pub fn point_fixes(market: &str) -> &'static [PointFix] {
    match market {
        //prices changed quotation scale in january 2018
        "SGX_JB" => &[PointFix::ScaleThrough {
            date: "2018-01-18",
            factor: 0.1,
        }],
        _ => &[],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        let es = lookup("CME_ES").unwrap();
        assert_eq!(es.first_ticker(), "CME/ESZ1997");
        assert!(es.is_spliced());
        assert_eq!(es.splice[0].market, "CME_SP");
        assert!(lookup("CME_XX").is_none());
    }

    #[test]
    fn denominator_bases() {
        assert_eq!(Denominator::GovernmentBond.basis(), 100.0);
        assert_eq!(Denominator::MoneyMarket.basis(), 25.0);
        let ty = lookup("CME_TY").unwrap();
        assert_eq!(ty.denominator, Some(Denominator::GovernmentBond));
    }

    #[test]
    fn hygiene_tables() {
        assert_eq!(price_skip_dates("SGX_NK").len(), 3);
        assert!(price_skip_dates("CME_ES").is_empty());
        assert_eq!(return_skip_dates("CME_BR").len(), 5);
    }
}
