use crate::errors::EngineResult;
use crate::models::monte_carlo::resolve_seed;
use crate::models::price_with;
use crate::types::{GreeksResult, PricingLimits, PricingMethod, PricingParameters, SimulationConfig};
use rayon::prelude::*;

/// Finite-difference step sizes.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct BumpSizes {
    /// Spot bump as a fraction of S0. The lattice widens it to at least
    /// 2*sigma*sqrt(dt) so both bumped spots cross a node, which makes
    /// lattice delta and gamma averages over that wider window (about 8% of
    /// S0 at 100 steps and sigma 0.42).
    pub spot_relative: f64,
    pub sigma: f64,
    pub rate: f64,
    /// Years. Capped at T/2 per call.
    pub maturity: f64,
}

impl Default for BumpSizes {
    fn default() -> Self {
        Self {
            spot_relative: 1e-3,
            sigma: 1e-4,
            rate: 1e-4,
            maturity: 1.0 / 8760.0,
        }
    }
}

/// Sensitivities by bump-and-reprice against either pricer.
///
/// Every bumped evaluation goes through the same method config; in Monte
/// Carlo mode a single seed is fixed up front so all re-pricings share
/// their draws. Nothing is cached between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct GreeksCalculator {
    limits: PricingLimits,
    bumps: BumpSizes,
}

impl GreeksCalculator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: PricingLimits) -> Self {
        Self { limits, bumps: BumpSizes::default() }
    }

    pub fn with_bumps(mut self, bumps: BumpSizes) -> Self {
        self.bumps = bumps;
        self
    }

    /// All five Greeks from one parallel batch of re-pricings.
    pub fn compute_all(&self, params: &PricingParameters, method: PricingMethod) -> EngineResult<GreeksResult> {
        let method = pin_seed(method);
        let h_s = self.spot_bump(params, &method);
        let (sigma_lo, vega_span) = self.sigma_window(params);
        let h_r = self.bumps.rate;
        let h_t = self.maturity_bump(params);

        let scenarios = [
            params.clone(),
            params.to_builder().spot(params.spot() + h_s).build()?,
            params.to_builder().spot(params.spot() - h_s).build()?,
            params.to_builder().sigma(sigma_lo + vega_span).build()?,
            params.to_builder().sigma(sigma_lo).build()?,
            params.to_builder().rate(params.rate() + h_r).build()?,
            params.to_builder().rate(params.rate() - h_r).build()?,
            params.to_builder().maturity(params.maturity() - h_t).build()?,
        ];
        let v = self.reprice(&scenarios, &method)?;

        let greeks = GreeksResult {
            delta: (v[1] - v[2]) / (2.0 * h_s),
            gamma: (v[1] - 2.0 * v[0] + v[2]) / (h_s * h_s),
            vega: (v[3] - v[4]) / vega_span,
            theta: (v[7] - v[0]) / h_t,
            rho: (v[5] - v[6]) / (2.0 * h_r),
        };

        tracing::debug!(
            method = method.name(),
            delta = greeks.delta,
            gamma = greeks.gamma,
            vega = greeks.vega,
            theta = greeks.theta,
            rho = greeks.rho,
            "greeks computed"
        );

        Ok(greeks)
    }

    /// dV/dS0, central difference.
    pub fn delta(&self, params: &PricingParameters, method: PricingMethod) -> EngineResult<f64> {
        let method = pin_seed(method);
        let h = self.spot_bump(params, &method);
        let v = self.reprice(
            &[
                params.to_builder().spot(params.spot() + h).build()?,
                params.to_builder().spot(params.spot() - h).build()?,
            ],
            &method,
        )?;
        Ok((v[0] - v[1]) / (2.0 * h))
    }

    /// d2V/dS0^2, second central difference.
    pub fn gamma(&self, params: &PricingParameters, method: PricingMethod) -> EngineResult<f64> {
        let method = pin_seed(method);
        let h = self.spot_bump(params, &method);
        let v = self.reprice(
            &[
                params.clone(),
                params.to_builder().spot(params.spot() + h).build()?,
                params.to_builder().spot(params.spot() - h).build()?,
            ],
            &method,
        )?;
        Ok((v[1] - 2.0 * v[0] + v[2]) / (h * h))
    }

    /// dV/dsigma. One-sided forward difference when sigma is below the bump.
    pub fn vega(&self, params: &PricingParameters, method: PricingMethod) -> EngineResult<f64> {
        let method = pin_seed(method);
        let (lo, span) = self.sigma_window(params);
        let v = self.reprice(
            &[
                params.to_builder().sigma(lo + span).build()?,
                params.to_builder().sigma(lo).build()?,
            ],
            &method,
        )?;
        Ok((v[0] - v[1]) / span)
    }

    /// Value change per year of calendar decay: (V(T - h) - V(T)) / h.
    pub fn theta(&self, params: &PricingParameters, method: PricingMethod) -> EngineResult<f64> {
        let method = pin_seed(method);
        let h = self.maturity_bump(params);
        let v = self.reprice(
            &[
                params.clone(),
                params.to_builder().maturity(params.maturity() - h).build()?,
            ],
            &method,
        )?;
        Ok((v[1] - v[0]) / h)
    }

    /// dV/dr, central difference.
    pub fn rho(&self, params: &PricingParameters, method: PricingMethod) -> EngineResult<f64> {
        let method = pin_seed(method);
        let h = self.bumps.rate;
        let v = self.reprice(
            &[
                params.to_builder().rate(params.rate() + h).build()?,
                params.to_builder().rate(params.rate() - h).build()?,
            ],
            &method,
        )?;
        Ok((v[0] - v[1]) / (2.0 * h))
    }

    /// Independent re-pricings in parallel. Results keep scenario order;
    /// the first error aborts the batch.
    fn reprice(&self, scenarios: &[PricingParameters], method: &PricingMethod) -> EngineResult<Vec<f64>> {
        scenarios
            .par_iter()
            .map(|p| price_with(p, method, self.limits))
            .collect()
    }

    fn spot_bump(&self, params: &PricingParameters, method: &PricingMethod) -> f64 {
        let relative = match method {
            PricingMethod::Binomial(cfg) => {
                let dt = params.maturity() / cfg.steps.max(1) as f64;
                self.bumps.spot_relative.max(2.0 * params.sigma() * dt.sqrt())
            }
            PricingMethod::MonteCarlo(_) => self.bumps.spot_relative,
        };
        // S0 - h must stay positive
        relative.min(0.5) * params.spot()
    }

    /// Lower sigma and span of the vega difference.
    fn sigma_window(&self, params: &PricingParameters) -> (f64, f64) {
        let h = self.bumps.sigma;
        let sigma = params.sigma();
        if sigma < h {
            (sigma, h)
        } else {
            (sigma - h, 2.0 * h)
        }
    }

    #[inline]
    fn maturity_bump(&self, params: &PricingParameters) -> f64 {
        self.bumps.maturity.min(0.5 * params.maturity())
    }
}

/// Resolve an unseeded simulation to one concrete seed shared by all bumps.
pub(crate) fn pin_seed(method: PricingMethod) -> PricingMethod {
    match method {
        PricingMethod::MonteCarlo(cfg) => PricingMethod::MonteCarlo(SimulationConfig {
            seed: Some(resolve_seed(cfg.seed)),
            ..cfg
        }),
        lattice => lattice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;
    use crate::types::{LatticeConfig, PayoffType};

    fn params(spot: f64, t: f64, payoff: PayoffType) -> PricingParameters {
        PricingParameters::builder()
            .spot(spot)
            .strike(0.040)
            .maturity(t)
            .rate(0.025)
            .sigma(0.42)
            .payoff(payoff)
            .build()
            .expect("valid params")
    }

    fn lattice() -> PricingMethod {
        PricingMethod::Binomial(LatticeConfig::new(100))
    }

    #[test]
    fn test_call_greeks_signs_and_bounds() {
        let g = GreeksCalculator::new()
            .compute_all(&params(0.035, 1.0, PayoffType::Call), lattice())
            .expect("greeks");
        assert!((0.0..=1.0).contains(&g.delta), "call delta={} out of [0,1]", g.delta);
        assert!(g.gamma > 0.0, "gamma={} should be positive", g.gamma);
        assert!(g.vega > 0.0, "vega={} should be positive", g.vega);
        assert!(g.rho > 0.0, "call rho={} should be positive", g.rho);
    }

    #[test]
    fn test_put_delta_bounds() {
        let g = GreeksCalculator::new()
            .compute_all(&params(0.035, 1.0, PayoffType::Put), lattice())
            .expect("greeks");
        assert!((-1.0..=0.0).contains(&g.delta), "put delta={} out of [-1,0]", g.delta);
        assert!(g.gamma > 0.0, "put gamma={} should be positive", g.gamma);
    }

    #[test]
    fn test_call_delta_increases_with_spot() {
        let calc = GreeksCalculator::new();
        let deltas: Vec<f64> = [0.030, 0.035, 0.040, 0.045, 0.050]
            .iter()
            .map(|&s| calc.delta(&params(s, 1.0, PayoffType::Call), lattice()).expect("delta"))
            .collect();
        for pair in deltas.windows(2) {
            assert!(pair[1] > pair[0], "delta should rise with spot: {deltas:?}");
        }
    }

    #[test]
    fn test_theta_negative_near_expiry() {
        let p = PricingParameters::builder()
            .spot(0.040)
            .strike(0.040)
            .maturity(0.01)
            .rate(0.025)
            .sigma(0.42)
            .build()
            .expect("valid params");
        let theta = GreeksCalculator::new().theta(&p, lattice()).expect("theta");
        assert!(theta < 0.0, "long call theta={theta} should be negative near expiry");
    }

    #[test]
    fn test_individual_accessors_match_compute_all() {
        let calc = GreeksCalculator::new();
        let p = params(0.035, 1.0, PayoffType::Call);
        let all = calc.compute_all(&p, lattice()).expect("greeks");
        let close = |a: f64, b: f64| (a - b).abs() <= 1e-12 * a.abs().max(1.0);
        assert!(close(all.delta, calc.delta(&p, lattice()).expect("delta")));
        assert!(close(all.gamma, calc.gamma(&p, lattice()).expect("gamma")));
        assert!(close(all.vega, calc.vega(&p, lattice()).expect("vega")));
        assert!(close(all.theta, calc.theta(&p, lattice()).expect("theta")));
        assert!(close(all.rho, calc.rho(&p, lattice()).expect("rho")));
    }

    #[test]
    fn test_coarser_spot_bump_changes_delta() {
        let p = params(0.035, 1.0, PayoffType::Call);
        let base = GreeksCalculator::new().delta(&p, lattice()).expect("delta");
        let coarse = GreeksCalculator::new()
            .with_bumps(BumpSizes { spot_relative: 0.3, ..BumpSizes::default() })
            .delta(&p, lattice())
            .expect("delta");
        assert!((0.0..=1.0).contains(&coarse), "coarse delta={coarse} out of [0,1]");
        assert!((coarse - base).abs() > 1e-6, "bump size had no effect: {base} vs {coarse}");
    }

    #[test]
    fn test_vega_one_sided_at_zero_sigma() {
        // A lattice step this narrow pushes p above 1, so use the simulation.
        let p = params(0.050, 1.0, PayoffType::Call).to_builder().sigma(0.0).build().expect("valid");
        let method = PricingMethod::MonteCarlo(SimulationConfig::new(5_000).with_seed(3));
        let vega = GreeksCalculator::new().vega(&p, method).expect("vega");
        assert!(vega.is_finite() && vega >= 0.0, "vega at sigma=0 should be finite and >= 0: {vega}");
    }

    #[test]
    fn test_monte_carlo_greeks_with_seed() {
        let method = PricingMethod::MonteCarlo(SimulationConfig::new(20_000).with_seed(42));
        let calc = GreeksCalculator::new();
        let p = params(0.035, 1.0, PayoffType::Call);
        let g = calc.compute_all(&p, method).expect("greeks");
        assert!((0.0..=1.0).contains(&g.delta), "MC delta={} out of [0,1]", g.delta);
        assert!(g.gamma > 0.0, "MC gamma={} should be positive", g.gamma);
        assert!(g.vega > 0.0, "MC vega={} should be positive", g.vega);

        let again = calc.compute_all(&p, method).expect("greeks");
        assert_eq!(g, again, "seeded Greeks must be reproducible");
    }

    #[test]
    fn test_unseeded_monte_carlo_shares_draws() {
        // Without a pinned seed, bumped prices would carry independent noise
        // far larger than the spot bump and delta would be meaningless.
        let method = PricingMethod::MonteCarlo(SimulationConfig::new(20_000));
        let delta = GreeksCalculator::new()
            .delta(&params(0.035, 1.0, PayoffType::Call), method)
            .expect("delta");
        assert!((0.0..=1.0).contains(&delta), "unseeded MC delta={delta} out of [0,1]");
    }

    #[test]
    fn test_pricer_errors_propagate() {
        let err = GreeksCalculator::new().compute_all(
            &params(0.035, 1.0, PayoffType::Call),
            PricingMethod::Binomial(LatticeConfig::new(0)),
        );
        assert!(matches!(err, Err(EngineError::InvalidParameter { field: "steps", .. })));
    }
}
