pub mod resample;
pub mod shift;

pub use resample::resample_on_rule;
pub use shift::{date_shift, CalendarError};
