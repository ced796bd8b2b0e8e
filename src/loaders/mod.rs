pub mod hydro;
pub mod solar;
pub mod wind;

use crate::errors::{EngineError, EngineResult};
use crate::models::volatility::{self, VolatilityMethod, VolatilitySample};
use crate::series::{OrderedSeries, SeriesSummary};
use crate::types::{Diagnosed, PayoffType, PricingParameters};

/// How a loader turns its price series into pricing inputs.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CalibrationRequest {
    pub periods_per_year: u32,
    pub method: VolatilityMethod,
    pub cap: Option<f64>,
}

impl Default for CalibrationRequest {
    fn default() -> Self {
        Self {
            periods_per_year: 365,
            method: VolatilityMethod::Log,
            cap: None,
        }
    }
}

/// Spot, ATM strike and volatility calibrated from one loader's history.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CalibratedInputs {
    pub source: &'static str,
    pub spot: f64,
    pub strike: f64,
    pub sigma: f64,
    pub summary: SeriesSummary,
    pub volatility: VolatilitySample,
    pub prices: OrderedSeries,
}

impl CalibratedInputs {
    /// Contract on the calibrated underlying. Validated like any other build.
    pub fn pricing_parameters(&self, maturity: f64, rate: f64, payoff: PayoffType) -> EngineResult<PricingParameters> {
        PricingParameters::builder()
            .spot(self.spot)
            .strike(self.strike)
            .maturity(maturity)
            .rate(rate)
            .sigma(self.sigma)
            .payoff(payoff)
            .build()
    }
}

/// A renewable source whose physical output is valued as a price series.
///
/// Implementors supply the raw series and the physics; volatility and the
/// calibration pipeline are shared.
pub trait EnergyDataLoader: Send + Sync {
    fn name(&self) -> &'static str;

    /// Raw physical observations (irradiance, wind speed, precipitation).
    fn fetch(&self) -> EngineResult<OrderedSeries>;

    /// Raw observations to a daily value series.
    fn compute_price(&self, raw: &OrderedSeries) -> EngineResult<OrderedSeries>;

    fn estimate_volatility(
        &self,
        prices: &OrderedSeries,
        request: &CalibrationRequest,
    ) -> EngineResult<Diagnosed<VolatilitySample>> {
        estimate_volatility(prices, request)
    }

    /// fetch -> price -> volatility. Spot is the latest price, strike is ATM.
    fn load_parameters(&self, request: &CalibrationRequest) -> EngineResult<Diagnosed<CalibratedInputs>> {
        let raw = self.fetch()?;
        let prices = self.compute_price(&raw)?;

        let (summary, (_, spot)) = match (prices.summary(), prices.last()) {
            (Some(summary), Some(last)) => (summary, last),
            _ => return Err(EngineError::invalid("prices", 0.0, "series is empty")),
        };
        if !(spot.is_finite() && spot > 0.0) {
            return Err(EngineError::invalid("spot", spot, "latest price must be finite and > 0"));
        }

        let vol = self.estimate_volatility(&prices, request)?;

        tracing::info!(
            source = self.name(),
            spot,
            sigma = vol.value.annualized_sigma,
            observations = summary.count,
            issues = vol.issues.len(),
            "loader calibrated"
        );

        Ok(vol.map(|volatility| CalibratedInputs {
            source: self.name(),
            spot,
            strike: spot,
            sigma: volatility.annualized_sigma,
            summary,
            volatility,
            prices,
        }))
    }
}

/// Shared volatility step for every loader.
pub fn estimate_volatility(
    prices: &OrderedSeries,
    request: &CalibrationRequest,
) -> EngineResult<Diagnosed<VolatilitySample>> {
    volatility::estimate(prices, request.periods_per_year, request.method, request.cap)
}

/// Physical inputs must be finite and non-negative.
pub(crate) fn check_raw(raw: &OrderedSeries, field: &'static str) -> EngineResult<()> {
    match raw.values().find(|v| !(v.is_finite() && *v >= 0.0)) {
        Some(bad) => Err(EngineError::invalid(field, bad, "must be finite and >= 0")),
        None => Ok(()),
    }
}

/// Positive, finite facility constant.
pub(crate) fn check_positive(field: &'static str, value: f64) -> EngineResult<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(EngineError::invalid(field, value, "must be finite and > 0"))
    }
}
