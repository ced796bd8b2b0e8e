pub mod volatility;
pub mod binomial;
pub mod monte_carlo;
pub mod greeks;

use crate::errors::EngineResult;
use crate::types::{PricingLimits, PricingMethod, PricingParameters};
use binomial::BinomialTreePricer;
use monte_carlo::MonteCarloSimulator;

/// All pricers implement this trait.
/// price() must be a pure function: deterministic output from inputs only
/// (a simulation without a seed is the one documented exception).
/// Send + Sync required for use across rayon workers.
pub trait OptionPricer: Send + Sync {
    type Config;

    fn name(&self) -> &'static str;

    /// Discounted risk-neutral value of the contract. Never returns a non-finite price.
    fn price(&self, params: &PricingParameters, cfg: &Self::Config) -> EngineResult<f64>;
}

/// Price with whichever method is selected, under the given limits.
pub fn price_with(
    params: &PricingParameters,
    method: &PricingMethod,
    limits: PricingLimits,
) -> EngineResult<f64> {
    match method {
        PricingMethod::Binomial(cfg) => run(&BinomialTreePricer::with_limits(limits), params, cfg),
        PricingMethod::MonteCarlo(cfg) => run(&MonteCarloSimulator::with_limits(limits), params, cfg),
    }
}

fn run<P: OptionPricer>(pricer: &P, params: &PricingParameters, cfg: &P::Config) -> EngineResult<f64> {
    pricer
        .price(params, cfg)
        .inspect_err(|e| tracing::debug!(model = pricer.name(), error = %e, "pricing failed"))
}
