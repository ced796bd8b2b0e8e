use crate::errors::{EngineError, EngineResult};
use smallvec::SmallVec;
use std::fmt;
use std::sync::Arc;

// ── Payoff ──

/// Redemption formula for the `Redeemable` payoff.
///
/// The product definition for redeemable contracts is not settled, so the
/// crate ships no implementation of its own: callers supply the formula.
/// Must be a pure function of the terminal price and strike.
pub trait RedemptionFormula: Send + Sync + fmt::Debug {
    fn redemption_value(&self, terminal: f64, strike: f64) -> f64;
}

/// Shared handle to a caller-supplied redemption formula. Cheap to clone.
#[derive(Debug, Clone)]
pub struct RedemptionRule(Arc<dyn RedemptionFormula>);

impl RedemptionRule {
    pub fn new(formula: impl RedemptionFormula + 'static) -> Self {
        Self(Arc::new(formula))
    }

    #[inline]
    pub fn value(&self, terminal: f64, strike: f64) -> f64 {
        self.0.redemption_value(terminal, strike)
    }
}

#[derive(Debug, Clone)]
pub enum PayoffType {
    Call,
    Put,
    Redeemable(RedemptionRule),
}

impl PayoffType {
    /// Terminal payoff. Pure function.
    #[inline]
    pub fn payoff(&self, terminal: f64, strike: f64) -> f64 {
        match self {
            Self::Call => (terminal - strike).max(0.0),
            Self::Put => (strike - terminal).max(0.0),
            Self::Redeemable(rule) => rule.value(terminal, strike),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Call => "call",
            Self::Put => "put",
            Self::Redeemable(_) => "redeemable",
        }
    }
}

impl fmt::Display for PayoffType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ── Pricing parameters (immutable, validated at construction) ──

#[derive(Debug, Clone)]
pub struct PricingParameters {
    spot: f64,
    strike: f64,
    maturity: f64,
    rate: f64,
    sigma: f64,
    payoff: PayoffType,
}

impl PricingParameters {
    pub fn builder() -> PricingParametersBuilder {
        PricingParametersBuilder::default()
    }

    /// Builder pre-filled with these parameters, for bumped copies.
    pub fn to_builder(&self) -> PricingParametersBuilder {
        PricingParametersBuilder {
            spot: Some(self.spot),
            strike: Some(self.strike),
            maturity: Some(self.maturity),
            rate: Some(self.rate),
            sigma: Some(self.sigma),
            payoff: Some(self.payoff.clone()),
        }
    }

    #[inline]
    pub fn spot(&self) -> f64 {
        self.spot
    }

    #[inline]
    pub fn strike(&self) -> f64 {
        self.strike
    }

    /// Time to maturity in years.
    #[inline]
    pub fn maturity(&self) -> f64 {
        self.maturity
    }

    #[inline]
    pub fn rate(&self) -> f64 {
        self.rate
    }

    #[inline]
    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    #[inline]
    pub fn payoff_type(&self) -> &PayoffType {
        &self.payoff
    }

    #[inline]
    pub fn payoff(&self, terminal: f64) -> f64 {
        self.payoff.payoff(terminal, self.strike)
    }
}

/// Builder for `PricingParameters`.
/// Required: spot, maturity, rate, sigma. Strike defaults to spot, payoff to call.
#[derive(Debug, Clone, Default)]
pub struct PricingParametersBuilder {
    spot: Option<f64>,
    strike: Option<f64>,
    maturity: Option<f64>,
    rate: Option<f64>,
    sigma: Option<f64>,
    payoff: Option<PayoffType>,
}

impl PricingParametersBuilder {
    pub fn spot(mut self, spot: f64) -> Self {
        self.spot = Some(spot);
        self
    }

    pub fn strike(mut self, strike: f64) -> Self {
        self.strike = Some(strike);
        self
    }

    pub fn maturity(mut self, years: f64) -> Self {
        self.maturity = Some(years);
        self
    }

    pub fn rate(mut self, rate: f64) -> Self {
        self.rate = Some(rate);
        self
    }

    pub fn sigma(mut self, sigma: f64) -> Self {
        self.sigma = Some(sigma);
        self
    }

    pub fn payoff(mut self, payoff: PayoffType) -> Self {
        self.payoff = Some(payoff);
        self
    }

    pub fn redeemable(self, rule: RedemptionRule) -> Self {
        self.payoff(PayoffType::Redeemable(rule))
    }

    pub fn build(self) -> EngineResult<PricingParameters> {
        let spot = required("spot", self.spot)?;
        let maturity = required("maturity", self.maturity)?;
        let rate = required("rate", self.rate)?;
        let sigma = required("sigma", self.sigma)?;
        let strike = self.strike.unwrap_or(spot);

        if !(spot.is_finite() && spot > 0.0) {
            return Err(EngineError::invalid("spot", spot, "must be finite and > 0"));
        }
        if !(strike.is_finite() && strike > 0.0) {
            return Err(EngineError::invalid("strike", strike, "must be finite and > 0"));
        }
        if !(maturity.is_finite() && maturity > 0.0) {
            return Err(EngineError::invalid("maturity", maturity, "must be finite and > 0"));
        }
        if !rate.is_finite() {
            return Err(EngineError::invalid("rate", rate, "must be finite"));
        }
        if !(sigma.is_finite() && sigma >= 0.0) {
            return Err(EngineError::invalid("sigma", sigma, "must be finite and >= 0"));
        }

        Ok(PricingParameters {
            spot,
            strike,
            maturity,
            rate,
            sigma,
            payoff: self.payoff.unwrap_or(PayoffType::Call),
        })
    }
}

fn required(field: &'static str, value: Option<f64>) -> EngineResult<f64> {
    value.ok_or_else(|| EngineError::invalid(field, f64::NAN, "required"))
}

// ── Method configs ──

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct LatticeConfig {
    pub steps: u32,
}

impl LatticeConfig {
    pub fn new(steps: u32) -> Self {
        Self { steps }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct SimulationConfig {
    pub paths: u32,
    /// Fixed seed gives bit-identical draws across calls.
    pub seed: Option<u64>,
    /// Each draw Z also prices -Z; a path's payoff is the pair average.
    pub antithetic: bool,
}

impl SimulationConfig {
    pub fn new(paths: u32) -> Self {
        Self { paths, seed: None, antithetic: false }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_antithetic(mut self, antithetic: bool) -> Self {
        self.antithetic = antithetic;
        self
    }
}

/// Which pricer a Greeks or stress computation re-invokes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PricingMethod {
    Binomial(LatticeConfig),
    MonteCarlo(SimulationConfig),
}

impl PricingMethod {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Binomial(_) => "binomial",
            Self::MonteCarlo(_) => "monte_carlo",
        }
    }
}

/// Upper bounds on work per call. Checked before any computation starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PricingLimits {
    pub max_lattice_steps: u32,
    pub max_simulation_paths: u32,
}

impl Default for PricingLimits {
    fn default() -> Self {
        Self {
            max_lattice_steps: 2_000,
            max_simulation_paths: 1_000_000,
        }
    }
}

impl PricingLimits {
    pub fn check_steps(&self, steps: u32) -> EngineResult<()> {
        if steps == 0 {
            return Err(EngineError::invalid("steps", 0.0, "must be >= 1"));
        }
        if steps > self.max_lattice_steps {
            return Err(EngineError::invalid(
                "steps",
                steps as f64,
                "exceeds configured max_lattice_steps",
            ));
        }
        Ok(())
    }

    pub fn check_paths(&self, paths: u32) -> EngineResult<()> {
        if paths == 0 {
            return Err(EngineError::invalid("paths", 0.0, "must be >= 1"));
        }
        if paths > self.max_simulation_paths {
            return Err(EngineError::invalid(
                "paths",
                paths as f64,
                "exceeds configured max_simulation_paths",
            ));
        }
        Ok(())
    }
}

// ── Results ──

/// Monte Carlo price with its normal-approximation confidence interval.
/// Invariant: ci_low <= value <= ci_high.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct PriceResult {
    pub value: f64,
    pub ci_low: f64,
    pub ci_high: f64,
    pub confidence: f64,
    pub std_error: f64,
    pub paths: u32,
}

impl PriceResult {
    #[inline]
    pub fn contains(&self, price: f64) -> bool {
        price >= self.ci_low && price <= self.ci_high
    }

    #[inline]
    pub fn width(&self) -> f64 {
        self.ci_high - self.ci_low
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default, serde::Serialize)]
pub struct GreeksResult {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
    pub rho: f64,
}

// ── Diagnostics (non-fatal issues returned alongside values) ──

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecoverableIssue {
    /// Fewer than two finite returns; default volatility used.
    InsufficientReturns { valid: usize, fallback: f64 },
    /// Estimated volatility exceeded the cap and was clamped.
    VolatilityCapped { raw: f64, cap: f64 },
    /// Estimated volatility was non-finite or non-positive; default used.
    InvalidVolatility { raw: f64, fallback: f64 },
    /// Lattice and simulation prices disagree beyond tolerance.
    MethodDisagreement { relative_gap: f64, tolerance: f64 },
}

impl fmt::Display for RecoverableIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientReturns { valid, fallback } => {
                write!(f, "only {valid} valid returns; volatility defaulted to {fallback}")
            }
            Self::VolatilityCapped { raw, cap } => {
                write!(f, "volatility {raw:.4} capped at {cap:.4}")
            }
            Self::InvalidVolatility { raw, fallback } => {
                write!(f, "invalid volatility {raw}; defaulted to {fallback}")
            }
            Self::MethodDisagreement { relative_gap, tolerance } => {
                write!(f, "binomial vs monte carlo gap {relative_gap:.4} exceeds {tolerance:.4}")
            }
        }
    }
}

pub type Issues = SmallVec<[RecoverableIssue; 4]>;

/// A value plus the recoverable issues met while producing it.
#[derive(Debug, Clone, serde::Serialize)]
pub struct Diagnosed<T> {
    pub value: T,
    pub issues: Issues,
}

impl<T> Diagnosed<T> {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.issues.is_empty()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Diagnosed<U> {
        Diagnosed {
            value: f(self.value),
            issues: self.issues,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct CappedRedemption;

    impl RedemptionFormula for CappedRedemption {
        fn redemption_value(&self, terminal: f64, strike: f64) -> f64 {
            (terminal - strike).clamp(0.0, strike)
        }
    }

    fn base() -> PricingParametersBuilder {
        PricingParameters::builder()
            .spot(0.035)
            .strike(0.040)
            .maturity(1.0)
            .rate(0.025)
            .sigma(0.42)
    }

    #[test]
    fn test_builder_accepts_valid_params() {
        let p = base().build().expect("valid params");
        assert_eq!(p.spot(), 0.035);
        assert_eq!(p.strike(), 0.040);
        assert_eq!(p.maturity(), 1.0);
        assert_eq!(p.rate(), 0.025);
        assert_eq!(p.sigma(), 0.42);
        assert_eq!(p.payoff_type().name(), "call");
    }

    #[test]
    fn test_strike_defaults_to_spot() {
        let p = PricingParameters::builder()
            .spot(0.05)
            .maturity(1.0)
            .rate(0.0)
            .sigma(0.3)
            .build()
            .expect("valid params");
        assert_eq!(p.strike(), 0.05);
    }

    #[test]
    fn test_rejects_non_positive_fields() {
        for (builder, field) in [
            (base().spot(0.0), "spot"),
            (base().strike(-1.0), "strike"),
            (base().maturity(0.0), "maturity"),
            (base().sigma(-0.1), "sigma"),
            (base().rate(f64::NAN), "rate"),
        ] {
            match builder.build() {
                Err(EngineError::InvalidParameter { field: f, .. }) => {
                    assert_eq!(f, field, "wrong field reported");
                }
                other => panic!("expected InvalidParameter for {field}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_missing_required_field() {
        let err = PricingParameters::builder().spot(1.0).rate(0.0).sigma(0.2).build();
        assert!(matches!(
            err,
            Err(EngineError::InvalidParameter { field: "maturity", .. })
        ));
    }

    #[test]
    fn test_zero_sigma_is_valid() {
        assert!(base().sigma(0.0).build().is_ok());
    }

    #[test]
    fn test_payoffs() {
        assert_eq!(PayoffType::Call.payoff(12.0, 10.0), 2.0);
        assert_eq!(PayoffType::Call.payoff(8.0, 10.0), 0.0);
        assert_eq!(PayoffType::Put.payoff(8.0, 10.0), 2.0);
        assert_eq!(PayoffType::Put.payoff(12.0, 10.0), 0.0);

        let p = base().redeemable(RedemptionRule::new(CappedRedemption)).build().expect("valid");
        assert_eq!(p.payoff_type().payoff(35.0, 10.0), 10.0);
        assert_eq!(p.payoff_type().name(), "redeemable");
    }

    #[test]
    fn test_to_builder_round_trips() {
        let p = base().payoff(PayoffType::Put).build().expect("valid");
        let bumped = p.to_builder().spot(0.036).build().expect("valid");
        assert_eq!(bumped.spot(), 0.036);
        assert_eq!(bumped.strike(), p.strike());
        assert_eq!(bumped.payoff_type().name(), "put");
    }

    #[test]
    fn test_limits() {
        let limits = PricingLimits::default();
        assert!(limits.check_steps(0).is_err());
        assert!(limits.check_steps(100).is_ok());
        assert!(limits.check_steps(2_001).is_err());
        assert!(limits.check_paths(0).is_err());
        assert!(limits.check_paths(1_000_000).is_ok());
        assert!(limits.check_paths(1_000_001).is_err());
    }
}
