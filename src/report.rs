use crate::analysis::cross_check::{CrossValidation, CrossValidator};
use crate::config::{AppConfig, EnergySource};
use crate::errors::EngineResult;
use crate::loaders::hydro::HydroLoader;
use crate::loaders::solar::SolarLoader;
use crate::loaders::wind::WindLoader;
use crate::loaders::{CalibratedInputs, EnergyDataLoader};
use crate::models::greeks::GreeksCalculator;
use crate::models::monte_carlo::resolve_seed;
use crate::series::{OrderedSeries, SeriesSummary};
use crate::types::{
    GreeksResult, PriceResult, PricingMethod, PricingParameters, RecoverableIssue, SimulationConfig,
};

#[derive(Debug, Clone, serde::Serialize)]
pub struct ContractSummary {
    pub payoff: &'static str,
    pub spot: f64,
    pub strike: f64,
    pub maturity: f64,
    pub rate: f64,
    pub sigma: f64,
}

impl From<&PricingParameters> for ContractSummary {
    fn from(p: &PricingParameters) -> Self {
        Self {
            payoff: p.payoff_type().name(),
            spot: p.spot(),
            strike: p.strike(),
            maturity: p.maturity(),
            rate: p.rate(),
            sigma: p.sigma(),
        }
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct CalibrationSummary {
    pub source: &'static str,
    pub returns: usize,
    pub prices: SeriesSummary,
}

#[derive(Debug, Clone, Copy, serde::Serialize)]
pub struct GreeksByMethod {
    pub binomial: GreeksResult,
    pub monte_carlo: GreeksResult,
}

/// Everything the binary prints.
#[derive(Debug, Clone, serde::Serialize)]
pub struct PricingReport {
    pub contract: ContractSummary,
    pub calibration: Option<CalibrationSummary>,
    pub binomial: f64,
    pub monte_carlo: PriceResult,
    pub cross_check: CrossValidation,
    pub greeks: GreeksByMethod,
    /// Recoverable issues from calibration and the cross check, in order.
    pub issues: Vec<RecoverableIssue>,
}

impl PricingReport {
    pub fn to_json(&self) -> EngineResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Price the configured contract with both methods, cross-check them and
/// compute Greeks for each. Calibrates from the energy history first when
/// one is configured.
pub fn build_report(cfg: &AppConfig) -> EngineResult<PricingReport> {
    let mut issues = Vec::new();
    let mut calibration = None;

    let params = match &cfg.energy_series {
        Some((source, path)) => {
            let history = OrderedSeries::from_csv(&std::fs::read_to_string(path)?)?;
            tracing::info!(path = %path.display(), points = history.len(), "energy history loaded");

            let calibrated = loader_for(*source, history).load_parameters(&cfg.calibration_request())?;
            issues.extend(calibrated.issues.iter().copied());
            let inputs = calibrated.value;
            calibration = Some(summarize(&inputs));

            let params = inputs.pricing_parameters(cfg.maturity, cfg.rate, cfg.payoff.clone())?;
            match cfg.strike {
                Some(strike) => params.to_builder().strike(strike).build()?,
                None => params,
            }
        }
        None => cfg.pricing_parameters()?,
    };

    let lattice = cfg.lattice();
    // One seed for the price, the cross check and the Greeks.
    let configured = cfg.simulation();
    let simulation = SimulationConfig {
        seed: Some(resolve_seed(configured.seed)),
        ..configured
    };

    let cross = CrossValidator::with_limits(cfg.limits).validate(
        &params,
        &lattice,
        &simulation,
        cfg.confidence_level,
        cfg.cross_check_tolerance,
    )?;
    issues.extend(cross.issues.iter().copied());

    let calc = GreeksCalculator::with_limits(cfg.limits);
    let (binomial_greeks, mc_greeks) = rayon::join(
        || calc.compute_all(&params, PricingMethod::Binomial(lattice)),
        || calc.compute_all(&params, PricingMethod::MonteCarlo(simulation)),
    );

    Ok(PricingReport {
        contract: ContractSummary::from(&params),
        calibration,
        binomial: cross.value.binomial,
        monte_carlo: cross.value.monte_carlo,
        cross_check: cross.value,
        greeks: GreeksByMethod {
            binomial: binomial_greeks?,
            monte_carlo: mc_greeks?,
        },
        issues,
    })
}

fn loader_for(source: EnergySource, history: OrderedSeries) -> Box<dyn EnergyDataLoader> {
    match source {
        EnergySource::Solar => Box::new(SolarLoader::new(history)),
        EnergySource::Wind => Box::new(WindLoader::new(history)),
        EnergySource::Hydro => Box::new(HydroLoader::new(history)),
    }
}

fn summarize(inputs: &CalibratedInputs) -> CalibrationSummary {
    CalibrationSummary {
        source: inputs.source,
        returns: inputs.volatility.return_series.len(),
        prices: inputs.summary,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::EngineError;
    use crate::models::volatility::VolatilityMethod;
    use crate::types::{PayoffType, PricingLimits};
    use std::path::PathBuf;

    fn config() -> AppConfig {
        AppConfig {
            limits: PricingLimits::default(),
            volatility_cap: Some(2.0),
            periods_per_year: 365,
            volatility_method: VolatilityMethod::Log,
            confidence_level: 0.95,
            cross_check_tolerance: 0.05,
            spot: 0.035,
            strike: Some(0.040),
            maturity: 1.0,
            rate: 0.025,
            sigma: 0.42,
            lattice_steps: 100,
            simulation_paths: 50_000,
            seed: Some(42),
            antithetic: false,
            payoff: PayoffType::Call,
            energy_series: None,
        }
    }

    #[test]
    fn test_report_for_configured_contract() {
        let report = build_report(&config()).expect("report");
        assert_eq!(report.contract.payoff, "call");
        assert_eq!(report.contract.strike, 0.040);
        assert!(report.binomial > 0.0 && report.binomial < 0.010);
        assert_eq!(report.monte_carlo.paths, 50_000);
        assert!(report.calibration.is_none());
        assert!((0.0..=1.0).contains(&report.greeks.binomial.delta));
        assert!((0.0..=1.0).contains(&report.greeks.monte_carlo.delta));

        let json = report.to_json().expect("json");
        assert!(json.contains("\"cross_check\""), "{json}");
    }

    #[test]
    fn test_report_calibrates_from_history() {
        let path = std::env::temp_dir().join(format!("spk_pricer_wind_{}.csv", std::process::id()));
        let rows: String = (1..=28)
            .map(|day| format!("2024-02-{day:02},{}\n", 6.0 + (day % 5) as f64 * 0.5))
            .collect();
        std::fs::write(&path, format!("date,ws50m\n{rows}")).expect("write history");

        let mut cfg = config();
        cfg.strike = None;
        cfg.energy_series = Some((EnergySource::Wind, path.clone()));
        let report = build_report(&cfg);
        std::fs::remove_file(&path).ok();

        let report = report.expect("report");
        let calibration = report.calibration.expect("calibrated");
        assert_eq!(calibration.source, "wind");
        assert_eq!(calibration.prices.count, 28);
        assert_eq!(report.contract.strike, report.contract.spot, "calibrated strike is ATM");
    }

    #[test]
    fn test_missing_history_is_io_error() {
        let mut cfg = config();
        cfg.energy_series = Some((EnergySource::Solar, PathBuf::from("/nonexistent/spk_pricer/history.csv")));
        assert!(matches!(build_report(&cfg), Err(EngineError::Io(_))));
    }
}
