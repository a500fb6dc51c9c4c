pub mod spec;

pub use spec::{
    all_markets, lookup, point_fixes, price_skip_dates, return_skip_dates, AssetClass,
    Denominator, MarketSpec, PointFix, SpliceLeg, ANNUAL_FACTOR, DEFAULT_ROLL_RULE,
};
