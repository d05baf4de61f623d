pub mod adx;
pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod macd;
pub mod obv;
pub mod rsi;
pub mod stochastic;

pub use adx::adx_series;
pub use atr::{atr_series, rolling_mean};
pub use bollinger::bollinger_series;
pub use ema::{ema_latest, ema_series};
pub use macd::macd_series;
pub use obv::{log_return_series, obv_series, percent_return_series};
pub use rsi::rsi_series;
pub use stochastic::stochastic_series;
