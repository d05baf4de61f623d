pub mod candles;
pub mod config;
pub mod features;
pub mod funnel;
pub mod indicators;
pub mod inference;

pub use candles::{CandleAssembler, TickOutcome};
pub use config::{FunnelConfig, ScoringWeights};
pub use features::{compute_feature_rows, FeatureRow};
pub use funnel::{BackfillSource, Funnel};
pub use inference::{
    standardize, Inferer, MomentumClassifier, RegimeClassifier, RegimeLabel, VolatilityClassifier,
};
