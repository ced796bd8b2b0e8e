pub mod analysis;
pub mod config;
pub mod errors;
pub mod loaders;
pub mod models;
pub mod report;
pub mod series;
pub mod types;

pub use errors::{EngineError, EngineResult};
pub use models::binomial::BinomialTreePricer;
pub use models::greeks::{BumpSizes, GreeksCalculator};
pub use models::monte_carlo::MonteCarloSimulator;
pub use models::OptionPricer;
pub use series::OrderedSeries;
pub use types::{
    Diagnosed, GreeksResult, LatticeConfig, PayoffType, PriceResult, PricingLimits, PricingMethod, PricingParameters,
    RecoverableIssue, RedemptionFormula, RedemptionRule, SimulationConfig,
};
