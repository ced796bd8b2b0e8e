use crate::errors::{EngineError, EngineResult};
use crate::models::OptionPricer;
use crate::types::{LatticeConfig, PricingLimits, PricingParameters};

/// Cox-Ross-Rubinstein binomial lattice.
///
/// dt = T/N, u = e^{sigma*sqrt(dt)}, d = 1/u
/// p  = (e^{r*dt} - d) / (u - d)
/// V  = e^{-r*dt} * (p*V_up + (1-p)*V_down), from layer N back to the root.
///
/// One O(N) buffer reused per layer, O(N^2) time. Nothing is retained after the call.
#[derive(Debug, Clone, Copy, Default)]
pub struct BinomialTreePricer {
    limits: PricingLimits,
}

impl BinomialTreePricer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(limits: PricingLimits) -> Self {
        Self { limits }
    }
}

impl OptionPricer for BinomialTreePricer {
    type Config = LatticeConfig;

    #[inline]
    fn name(&self) -> &'static str {
        "Binomial"
    }

    fn price(&self, params: &PricingParameters, cfg: &LatticeConfig) -> EngineResult<f64> {
        self.limits.check_steps(cfg.steps)?;

        let steps = cfg.steps as usize;
        let t = params.maturity();
        let r = params.rate();
        let sigma = params.sigma();

        // Degenerate lattice: every node collapses onto the forward.
        if sigma == 0.0 {
            let forward = params.spot() * (r * t).exp();
            let value = params.payoff(forward) * (-r * t).exp();
            return finite_or_unstable(value, "zero-volatility forward payoff");
        }

        let dt = t / steps as f64;
        let sigma_sqrt_dt = sigma * dt.sqrt();
        let u = sigma_sqrt_dt.exp();
        let d = 1.0 / u;
        let p = ((r * dt).exp() - d) / (u - d);

        if !p.is_finite() || !(0.0..=1.0).contains(&p) {
            return Err(EngineError::invalid(
                "risk_neutral_probability",
                p,
                "outside [0, 1] for this dt/sigma/rate combination",
            ));
        }

        let disc = (-r * dt).exp();
        let disc_p = disc * p;
        let disc_1mp = disc * (1.0 - p);

        // Terminal layer: S0 * u^i * d^(N-i) = S0 * exp(sigma*sqrt(dt)*(2i - N)).
        // Computed in log space so large N or sigma cannot overflow u^N.
        let spot = params.spot();
        let mut values: Vec<f64> = (0..=steps)
            .map(|i| {
                let node = spot * (sigma_sqrt_dt * (2.0 * i as f64 - steps as f64)).exp();
                params.payoff(node)
            })
            .collect();

        for layer in (0..steps).rev() {
            for j in 0..=layer {
                values[j] = disc_p.mul_add(values[j + 1], disc_1mp * values[j]);
            }
        }

        finite_or_unstable(values[0], "lattice root value")
    }
}

#[inline]
fn finite_or_unstable(value: f64, what: &str) -> EngineResult<f64> {
    if value.is_finite() {
        Ok(value)
    } else {
        Err(EngineError::NumericalInstability(format!("{what} is {value}")))
    }
}
