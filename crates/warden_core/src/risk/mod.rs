pub mod fees;
pub mod registry;

pub use fees::{MAX_FEE_BPS, fee_ceiling};
pub use registry::{AssetRiskConfig, RiskRegistry};
