use crate::errors::{EngineError, EngineResult};
use crate::models::OptionPricer;
use crate::types::{PriceResult, PricingLimits, PricingParameters, SimulationConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;
use statrs::distribution::{ContinuousCDF, Normal};

/// Paths per rayon task. Fixed so chunking (and therefore the draws) never
/// depends on the number of worker threads.
const CHUNK_PATHS: usize = 8_192;

/// Risk-neutral terminal-price simulation under GBM.
///
/// S_T = S0 * exp((r - sigma^2/2)*T + sigma*sqrt(T)*Z)
/// D_i = e^{-rT} * payoff(S_T,i)
/// price = mean(D), stderr = std(D)/sqrt(paths), CI = price +/- z*stderr
pub struct MonteCarloSimulator {
    limits: PricingLimits,
    /// Standard normal for z-scores (created once, reused)
    normal: Normal,
}

impl MonteCarloSimulator {
    pub fn new() -> Self {
        Self::with_limits(PricingLimits::default())
    }

    pub fn with_limits(limits: PricingLimits) -> Self {
        Self {
            limits,
            normal: Normal::standard(),
        }
    }

    /// Price plus a two-sided normal-approximation confidence interval.
    pub fn confidence_interval(
        &self,
        params: &PricingParameters,
        cfg: &SimulationConfig,
        confidence: f64,
    ) -> EngineResult<PriceResult> {
        if !(confidence.is_finite() && confidence > 0.0 && confidence < 1.0) {
            return Err(EngineError::invalid("confidence", confidence, "must be in (0, 1)"));
        }

        let stats = self.simulate(params, cfg)?;
        let std_error = stats.std_error();
        let z = self.normal.inverse_cdf(0.5 + 0.5 * confidence);
        let half_width = z * std_error;

        if !half_width.is_finite() {
            return Err(EngineError::NumericalInstability(format!(
                "confidence half-width is {half_width}"
            )));
        }

        Ok(PriceResult {
            value: stats.mean,
            ci_low: stats.mean - half_width,
            ci_high: stats.mean + half_width,
            confidence,
            std_error,
            paths: cfg.paths,
        })
    }

    fn simulate(&self, params: &PricingParameters, cfg: &SimulationConfig) -> EngineResult<PathStats> {
        self.limits.check_paths(cfg.paths)?;

        let seed = resolve_seed(cfg.seed);
        let t = params.maturity();
        let r = params.rate();
        let sigma = params.sigma();
        let kernel = PathKernel {
            spot: params.spot(),
            drift: (r - 0.5 * sigma * sigma) * t,
            diffusion: sigma * t.sqrt(),
            discount: (-r * t).exp(),
            antithetic: cfg.antithetic,
        };

        let paths = cfg.paths as usize;
        let chunks = paths.div_ceil(CHUNK_PATHS);

        // Chunk results come back in index order, so the merge below is
        // sequential and a seeded run is bit-identical on any thread count.
        let partials: Vec<PathStats> = (0..chunks)
            .into_par_iter()
            .map(|idx| {
                let n = CHUNK_PATHS.min(paths - idx * CHUNK_PATHS);
                kernel.run(params, n, chunk_seed(seed, idx as u64))
            })
            .collect();

        let stats = partials
            .into_iter()
            .fold(PathStats::default(), |acc, chunk| acc.merge(&chunk));

        if !stats.mean.is_finite() || !stats.m2.is_finite() {
            return Err(EngineError::NumericalInstability(format!(
                "simulated mean={} m2={} (sigma={sigma}, T={t})",
                stats.mean, stats.m2
            )));
        }

        tracing::debug!(
            paths = cfg.paths,
            seed,
            mean = stats.mean,
            "monte carlo simulation complete"
        );

        Ok(stats)
    }
}

impl Default for MonteCarloSimulator {
    fn default() -> Self {
        Self::new()
    }
}

impl OptionPricer for MonteCarloSimulator {
    type Config = SimulationConfig;

    #[inline]
    fn name(&self) -> &'static str {
        "Monte Carlo"
    }

    fn price(&self, params: &PricingParameters, cfg: &SimulationConfig) -> EngineResult<f64> {
        Ok(self.simulate(params, cfg)?.mean)
    }
}

/// Use the configured seed, or draw one so the run is still internally consistent.
#[inline]
pub(crate) fn resolve_seed(seed: Option<u64>) -> u64 {
    seed.unwrap_or_else(rand::random)
}

/// SplitMix64 finalizer. Decorrelates per-chunk seeds derived from one base seed.
#[inline]
fn chunk_seed(base: u64, idx: u64) -> u64 {
    let mut z = base.wrapping_add(idx.wrapping_add(1).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

/// Precomputed per-call constants. Stack-allocated, Copy.
#[derive(Debug, Clone, Copy)]
struct PathKernel {
    spot: f64,
    drift: f64,
    diffusion: f64,
    discount: f64,
    antithetic: bool,
}

impl PathKernel {
    fn run(&self, params: &PricingParameters, n: usize, seed: u64) -> PathStats {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut stats = PathStats::default();
        for _ in 0..n {
            let z: f64 = StandardNormal.sample(&mut rng);
            let mut d = self.discounted_payoff(params, z);
            if self.antithetic {
                d = 0.5 * (d + self.discounted_payoff(params, -z));
            }
            stats.push(d);
        }
        stats
    }

    #[inline]
    fn discounted_payoff(&self, params: &PricingParameters, z: f64) -> f64 {
        let terminal = self.spot * self.diffusion.mul_add(z, self.drift).exp();
        self.discount * params.payoff(terminal)
    }
}

/// Running count/mean/M2 (Welford), mergeable across chunks (Chan et al.).
#[derive(Debug, Clone, Copy, Default)]
struct PathStats {
    n: u64,
    mean: f64,
    m2: f64,
}

impl PathStats {
    #[inline]
    fn push(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        self.m2 += delta * (x - self.mean);
    }

    fn merge(self, other: &PathStats) -> PathStats {
        if self.n == 0 {
            return *other;
        }
        if other.n == 0 {
            return self;
        }
        let n = self.n + other.n;
        let delta = other.mean - self.mean;
        let nf = n as f64;
        PathStats {
            n,
            mean: self.mean + delta * other.n as f64 / nf,
            m2: self.m2 + other.m2 + delta * delta * (self.n as f64 * other.n as f64) / nf,
        }
    }

    /// Sample standard error of the mean. Zero for a single path.
    #[inline]
    fn std_error(&self) -> f64 {
        if self.n < 2 {
            return 0.0;
        }
        let nf = self.n as f64;
        (self.m2 / (nf - 1.0)).max(0.0).sqrt() / nf.sqrt()
    }
}
