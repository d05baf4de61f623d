pub mod manager;

pub use manager::{RiskConfig, RiskManager};
