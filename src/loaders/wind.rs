use super::{check_positive, check_raw, EnergyDataLoader};
use crate::errors::{EngineError, EngineResult};
use crate::series::OrderedSeries;
use std::f64::consts::PI;

/// Betz limit on the power coefficient.
const BETZ_LIMIT: f64 = 0.593;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct WindTurbine {
    pub rotor_diameter_m: f64,
    pub power_coefficient: f64,
    /// kg/m^3
    pub air_density: f64,
    pub price_per_kwh: f64,
}

impl Default for WindTurbine {
    fn default() -> Self {
        Self {
            rotor_diameter_m: 80.0,
            power_coefficient: 0.40,
            air_density: 1.225,
            price_per_kwh: 0.08,
        }
    }
}

impl WindTurbine {
    #[inline]
    pub fn swept_area(&self) -> f64 {
        let radius = 0.5 * self.rotor_diameter_m;
        PI * radius * radius
    }

    /// P = 1/2 rho A Cp v^3, in watts.
    #[inline]
    pub fn power_watts(&self, wind_speed: f64) -> f64 {
        0.5 * self.air_density * self.swept_area() * self.power_coefficient * wind_speed.powi(3)
    }
}

/// Wind loader over a daily mean wind-speed series (m/s at hub height).
#[derive(Debug, Clone)]
pub struct WindLoader {
    wind_speed: OrderedSeries,
    turbine: WindTurbine,
}

impl WindLoader {
    pub fn new(wind_speed: OrderedSeries) -> Self {
        Self {
            wind_speed,
            turbine: WindTurbine::default(),
        }
    }

    pub fn with_turbine(mut self, turbine: WindTurbine) -> EngineResult<Self> {
        check_positive("rotor_diameter", turbine.rotor_diameter_m)?;
        check_positive("air_density", turbine.air_density)?;
        check_positive("price_per_kwh", turbine.price_per_kwh)?;
        let cp = check_positive("power_coefficient", turbine.power_coefficient)?;
        if cp > BETZ_LIMIT {
            return Err(EngineError::invalid("power_coefficient", cp, "exceeds the Betz limit"));
        }
        self.turbine = turbine;
        Ok(self)
    }
}

impl EnergyDataLoader for WindLoader {
    fn name(&self) -> &'static str {
        "wind"
    }

    fn fetch(&self) -> EngineResult<OrderedSeries> {
        Ok(self.wind_speed.clone())
    }

    /// Daily energy (P x 24h / 1000) valued at $/kWh.
    fn compute_price(&self, raw: &OrderedSeries) -> EngineResult<OrderedSeries> {
        check_raw(raw, "wind_speed")?;
        let turbine = self.turbine;
        Ok(raw.map_values(|_, v| turbine.power_watts(v) * 24.0 / 1000.0 * turbine.price_per_kwh))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loaders::CalibrationRequest;
    use crate::series::tests::daily;

    #[test]
    fn test_power_formula() {
        let t = WindTurbine::default();
        // 0.5 * 1.225 * pi*40^2 * 0.40 * 10^3
        let expected = 0.5 * 1.225 * PI * 1600.0 * 0.40 * 1000.0;
        assert!((t.power_watts(10.0) - expected).abs() < 1e-6, "P={}", t.power_watts(10.0));
        assert_eq!(t.power_watts(0.0), 0.0);
    }

    #[test]
    fn test_price_scales_with_cube_of_speed() {
        let loader = WindLoader::new(daily(&[5.0, 10.0]));
        let prices: Vec<f64> = loader
            .compute_price(&loader.fetch().expect("fetch"))
            .expect("prices")
            .values()
            .collect();
        assert!((prices[1] / prices[0] - 8.0).abs() < 1e-9, "ratio={}", prices[1] / prices[0]);

        let expected = WindTurbine::default().power_watts(10.0) * 24.0 / 1000.0 * 0.08;
        assert!((prices[1] - expected).abs() < 1e-9);
    }

    #[test]
    fn test_rejects_betz_violation_and_bad_speed() {
        let err = WindLoader::new(daily(&[5.0])).with_turbine(WindTurbine {
            power_coefficient: 0.7,
            ..WindTurbine::default()
        });
        assert!(matches!(err, Err(EngineError::InvalidParameter { field: "power_coefficient", .. })));

        let loader = WindLoader::new(daily(&[5.0, f64::INFINITY]));
        assert!(matches!(
            loader.compute_price(&loader.fetch().expect("fetch")),
            Err(EngineError::InvalidParameter { field: "wind_speed", .. })
        ));
    }

    #[test]
    fn test_calibrates_from_speeds() {
        let loader = WindLoader::new(daily(&[6.0, 7.5, 5.5, 8.0, 6.5, 7.0]));
        let out = loader.load_parameters(&CalibrationRequest::default()).expect("calibrated");
        assert_eq!(out.value.source, "wind");
        let expected_spot = WindTurbine::default().power_watts(7.0) * 24.0 / 1000.0 * 0.08;
        assert!((out.value.spot - expected_spot).abs() < 1e-9);
        assert!(out.value.sigma > 0.0);
    }
}
