use crate::errors::{EngineError, EngineResult};
use crate::models::binomial::BinomialTreePricer;
use crate::models::monte_carlo::MonteCarloSimulator;
use crate::models::OptionPricer;
use crate::types::{
    Diagnosed, Issues, LatticeConfig, PriceResult, PricingLimits, PricingParameters, RecoverableIssue, SimulationConfig,
};
use smallvec::SmallVec;

/// Lattice price checked against a simulated confidence interval.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CrossValidation {
    pub binomial: f64,
    pub monte_carlo: PriceResult,
    /// |B - MC| / MC
    pub relative_gap: f64,
    pub within_interval: bool,
}

/// Both methods under default limits. See [`CrossValidator::validate`].
pub fn cross_validate(
    params: &PricingParameters,
    lattice: &LatticeConfig,
    simulation: &SimulationConfig,
    confidence: f64,
    tolerance: f64,
) -> EngineResult<Diagnosed<CrossValidation>> {
    CrossValidator::default().validate(params, lattice, simulation, confidence, tolerance)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CrossValidator {
    limits: PricingLimits,
}

impl CrossValidator {
    pub fn with_limits(limits: PricingLimits) -> Self {
        Self { limits }
    }

    /// Prices with both methods concurrently. A gap above `tolerance` is a
    /// diagnostic, not an error; pricer errors propagate.
    pub fn validate(
        &self,
        params: &PricingParameters,
        lattice: &LatticeConfig,
        simulation: &SimulationConfig,
        confidence: f64,
        tolerance: f64,
    ) -> EngineResult<Diagnosed<CrossValidation>> {
        if !(tolerance.is_finite() && tolerance >= 0.0) {
            return Err(EngineError::invalid("tolerance", tolerance, "must be finite and >= 0"));
        }

        let (binomial, monte_carlo) = rayon::join(
            || BinomialTreePricer::with_limits(self.limits).price(params, lattice),
            || MonteCarloSimulator::with_limits(self.limits).confidence_interval(params, simulation, confidence),
        );
        let (binomial, monte_carlo) = (binomial?, monte_carlo?);

        let relative_gap = if binomial == monte_carlo.value {
            0.0
        } else {
            (binomial - monte_carlo.value).abs() / monte_carlo.value.abs()
        };

        let result = CrossValidation {
            binomial,
            monte_carlo,
            relative_gap,
            within_interval: monte_carlo.contains(binomial),
        };

        let mut issues: Issues = SmallVec::new();
        if relative_gap > tolerance {
            tracing::warn!(
                binomial,
                monte_carlo = monte_carlo.value,
                relative_gap,
                tolerance,
                "pricing methods disagree"
            );
            issues.push(RecoverableIssue::MethodDisagreement { relative_gap, tolerance });
        } else {
            tracing::info!(binomial, monte_carlo = monte_carlo.value, relative_gap, "pricing methods agree");
        }

        Ok(Diagnosed { value: result, issues })
    }
}
