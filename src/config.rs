use crate::errors::{EngineError, EngineResult};
use crate::loaders::CalibrationRequest;
use crate::models::volatility::VolatilityMethod;
use crate::types::{LatticeConfig, PayoffType, PricingLimits, PricingParameters, SimulationConfig};
use std::fmt::Display;
use std::path::PathBuf;
use std::str::FromStr;

/// Renewable source whose history can calibrate the contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnergySource {
    Solar,
    Wind,
    Hydro,
}

impl FromStr for EnergySource {
    type Err = EngineError;

    fn from_str(s: &str) -> EngineResult<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solar" => Ok(Self::Solar),
            "wind" => Ok(Self::Wind),
            "hydro" => Ok(Self::Hydro),
            other => Err(EngineError::Config(format!("ENERGY_SOURCE: unknown source {other}"))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub limits: PricingLimits,
    pub volatility_cap: Option<f64>,
    pub periods_per_year: u32,
    pub volatility_method: VolatilityMethod,
    pub confidence_level: f64,
    pub cross_check_tolerance: f64,
    pub spot: f64,
    pub strike: Option<f64>,
    pub maturity: f64,
    pub rate: f64,
    pub sigma: f64,
    pub lattice_steps: u32,
    pub simulation_paths: u32,
    pub seed: Option<u64>,
    pub antithetic: bool,
    pub payoff: PayoffType,
    /// Source and `date,value` history file; both set or neither.
    pub energy_series: Option<(EnergySource, PathBuf)>,
}

impl AppConfig {
    pub fn from_env() -> EngineResult<Self> {
        dotenvy::dotenv().ok();

        let limits = PricingLimits {
            max_lattice_steps: parsed("MAX_LATTICE_STEPS", "2000")?,
            max_simulation_paths: parsed("MAX_SIMULATION_PATHS", "1000000")?,
        };

        let volatility_cap = match env_var_or("VOLATILITY_CAP", "2.0").trim() {
            "" | "none" => None,
            cap => Some(
                cap.parse::<f64>()
                    .map_err(|e| EngineError::Config(format!("VOLATILITY_CAP: {e}")))?,
            ),
        };

        let seed = match env_var_or("SEED", "").trim() {
            "" => None,
            s => Some(s.parse::<u64>().map_err(|e| EngineError::Config(format!("SEED: {e}")))?),
        };

        let strike = match env_var_or("STRIKE", "").trim() {
            "" => None,
            s => Some(s.parse::<f64>().map_err(|e| EngineError::Config(format!("STRIKE: {e}")))?),
        };

        let energy_series = match (env_var("ENERGY_SOURCE"), env_var("ENERGY_SERIES_PATH")) {
            (Ok(source), Ok(path)) => Some((source.parse::<EnergySource>()?, PathBuf::from(path))),
            (Err(_), Err(_)) => None,
            _ => {
                return Err(EngineError::Config(
                    "ENERGY_SOURCE and ENERGY_SERIES_PATH must be set together".into(),
                ))
            }
        };

        let cfg = Self {
            limits,
            volatility_cap,
            periods_per_year: parsed("PERIODS_PER_YEAR", "365")?,
            volatility_method: env_var_or("VOLATILITY_METHOD", "log").parse()?,
            confidence_level: parsed("CONFIDENCE_LEVEL", "0.95")?,
            cross_check_tolerance: parsed("CROSS_CHECK_TOLERANCE", "0.02")?,
            spot: parsed("SPOT", "0.035")?,
            strike,
            maturity: parsed("MATURITY", "1.0")?,
            rate: parsed("RATE", "0.025")?,
            sigma: parsed("SIGMA", "0.42")?,
            lattice_steps: parsed("LATTICE_STEPS", "100")?,
            simulation_paths: parsed("SIMULATION_PATHS", "100000")?,
            seed,
            antithetic: parsed("ANTITHETIC", "false")?,
            payoff: parse_payoff(&env_var_or("PAYOFF", "call"))?,
            energy_series,
        };

        // Surface limit violations at startup rather than on the first price.
        cfg.limits.check_steps(cfg.lattice_steps)?;
        cfg.limits.check_paths(cfg.simulation_paths)?;

        Ok(cfg)
    }

    /// The configured contract. Strike defaults to spot.
    pub fn pricing_parameters(&self) -> EngineResult<PricingParameters> {
        let mut builder = PricingParameters::builder()
            .spot(self.spot)
            .maturity(self.maturity)
            .rate(self.rate)
            .sigma(self.sigma)
            .payoff(self.payoff.clone());
        if let Some(strike) = self.strike {
            builder = builder.strike(strike);
        }
        builder.build()
    }

    pub fn lattice(&self) -> LatticeConfig {
        LatticeConfig::new(self.lattice_steps)
    }

    pub fn simulation(&self) -> SimulationConfig {
        let cfg = SimulationConfig::new(self.simulation_paths).with_antithetic(self.antithetic);
        match self.seed {
            Some(seed) => cfg.with_seed(seed),
            None => cfg,
        }
    }

    pub fn calibration_request(&self) -> CalibrationRequest {
        CalibrationRequest {
            periods_per_year: self.periods_per_year,
            method: self.volatility_method,
            cap: self.volatility_cap,
        }
    }
}

/// Redeemable contracts need a redemption formula from the caller, which
/// the environment cannot express.
pub fn parse_payoff(raw: &str) -> EngineResult<PayoffType> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "call" => Ok(PayoffType::Call),
        "put" => Ok(PayoffType::Put),
        "redeemable" => Err(EngineError::Config(
            "PAYOFF: redeemable has no product-defined redemption formula; \
             supply a RedemptionRule through the library API"
                .into(),
        )),
        other => Err(EngineError::Config(format!("PAYOFF: unknown payoff {other}"))),
    }
}

fn parsed<T>(key: &str, default: &str) -> EngineResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    env_var_or(key, default)
        .trim()
        .parse::<T>()
        .map_err(|e| EngineError::Config(format!("{key}: {e}")))
}

fn env_var(key: &str) -> EngineResult<String> {
    std::env::var(key).map_err(|_| EngineError::Config(format!("missing env var: {key}")))
}

fn env_var_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
