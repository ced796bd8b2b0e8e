use crate::errors::EngineResult;
use crate::models::greeks::{pin_seed, GreeksCalculator};
use crate::models::price_with;
use crate::types::{GreeksResult, PricingLimits, PricingMethod, PricingParameters};
use rayon::prelude::*;

/// Default volatility grid: 10%..100%.
pub const DEFAULT_VOLS: [f64; 10] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 1.0];
/// Default rate grid: 0%..10%.
pub const DEFAULT_RATES: [f64; 11] = [0.0, 0.01, 0.02, 0.03, 0.04, 0.05, 0.06, 0.07, 0.08, 0.09, 0.10];
pub const DEFAULT_COMBINED_VOLS: [f64; 3] = [0.2, 0.4, 0.6];
pub const DEFAULT_COMBINED_RATES: [f64; 3] = [0.0, 0.025, 0.05];

/// 11 spots from 0.8*S0 to 1.2*S0.
pub fn default_spots(params: &PricingParameters) -> Vec<f64> {
    (0..=10)
        .map(|i| params.spot() * (0.8 + 0.04 * i as f64))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SensitivityRow {
    pub spot: f64,
    pub price: f64,
    pub greeks: GreeksResult,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct VolatilityStressRow {
    pub sigma: f64,
    pub price: f64,
    pub delta: f64,
    pub vega: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct RateStressRow {
    pub rate: f64,
    pub price: f64,
    pub rho: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct CombinedStressRow {
    pub sigma: f64,
    pub rate: f64,
    pub price: f64,
}

/// Scenario grids over one contract. Rows are evaluated in parallel and
/// returned in input order; any failing scenario fails the whole grid.
#[derive(Debug, Clone, Copy, Default)]
pub struct StressHarness {
    limits: PricingLimits,
    greeks: GreeksCalculator,
}

impl StressHarness {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: PricingLimits) -> Self {
        Self {
            limits,
            greeks: GreeksCalculator::with_limits(limits),
        }
    }

    /// Price and full Greeks per spot.
    pub fn sensitivity_table(
        &self,
        params: &PricingParameters,
        spots: &[f64],
        method: PricingMethod,
    ) -> EngineResult<Vec<SensitivityRow>> {
        let method = pin_seed(method);
        spots
            .par_iter()
            .map(|&spot| {
                let scenario = params.to_builder().spot(spot).build()?;
                Ok(SensitivityRow {
                    spot,
                    price: price_with(&scenario, &method, self.limits)?,
                    greeks: self.greeks.compute_all(&scenario, method)?,
                })
            })
            .collect()
    }

    /// Price, delta and vega per volatility.
    pub fn volatility_stress(
        &self,
        params: &PricingParameters,
        vols: &[f64],
        method: PricingMethod,
    ) -> EngineResult<Vec<VolatilityStressRow>> {
        let method = pin_seed(method);
        vols.par_iter()
            .map(|&sigma| {
                let scenario = params.to_builder().sigma(sigma).build()?;
                Ok(VolatilityStressRow {
                    sigma,
                    price: price_with(&scenario, &method, self.limits)?,
                    delta: self.greeks.delta(&scenario, method)?,
                    vega: self.greeks.vega(&scenario, method)?,
                })
            })
            .collect()
    }

    /// Price and rho per rate.
    pub fn rate_stress(
        &self,
        params: &PricingParameters,
        rates: &[f64],
        method: PricingMethod,
    ) -> EngineResult<Vec<RateStressRow>> {
        let method = pin_seed(method);
        rates
            .par_iter()
            .map(|&rate| {
                let scenario = params.to_builder().rate(rate).build()?;
                Ok(RateStressRow {
                    rate,
                    price: price_with(&scenario, &method, self.limits)?,
                    rho: self.greeks.rho(&scenario, method)?,
                })
            })
            .collect()
    }

    /// Price over the sigma x rate grid, sigma-major.
    pub fn combined_stress(
        &self,
        params: &PricingParameters,
        vols: &[f64],
        rates: &[f64],
        method: PricingMethod,
    ) -> EngineResult<Vec<CombinedStressRow>> {
        let method = pin_seed(method);
        let grid: Vec<(f64, f64)> = vols
            .iter()
            .flat_map(|&sigma| rates.iter().map(move |&rate| (sigma, rate)))
            .collect();

        let rows = grid
            .into_par_iter()
            .map(|(sigma, rate)| {
                let scenario = params.to_builder().sigma(sigma).rate(rate).build()?;
                Ok(CombinedStressRow {
                    sigma,
                    rate,
                    price: price_with(&scenario, &method, self.limits)?,
                })
            })
            .collect::<EngineResult<Vec<_>>>()?;

        tracing::debug!(rows = rows.len(), method = method.name(), "combined stress complete");
        Ok(rows)
    }
}
