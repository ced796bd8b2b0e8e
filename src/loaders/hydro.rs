use super::{check_positive, check_raw, EnergyDataLoader};
use crate::errors::{EngineError, EngineResult};
use crate::series::OrderedSeries;

const WATER_DENSITY: f64 = 1000.0;
const GRAVITY: f64 = 9.81;
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct HydroPlant {
    pub catchment_area_km2: f64,
    /// Head, in metres.
    pub fall_height_m: f64,
    /// Fraction of precipitation reaching the intake.
    pub runoff_coefficient: f64,
    pub turbine_efficiency: f64,
    pub price_per_kwh: f64,
}

impl Default for HydroPlant {
    fn default() -> Self {
        Self {
            catchment_area_km2: 1000.0,
            fall_height_m: 50.0,
            runoff_coefficient: 0.60,
            turbine_efficiency: 0.87,
            price_per_kwh: 0.06,
        }
    }
}

impl HydroPlant {
    /// Q = prec/1000 x catchment_m2 x runoff / 86400, in m^3/s.
    #[inline]
    pub fn flow_rate(&self, precipitation_mm: f64) -> f64 {
        precipitation_mm / 1000.0 * self.catchment_area_km2 * 1e6 * self.runoff_coefficient / SECONDS_PER_DAY
    }

    /// P = rho g Q h eta, in watts.
    #[inline]
    pub fn power_watts(&self, precipitation_mm: f64) -> f64 {
        WATER_DENSITY * GRAVITY * self.flow_rate(precipitation_mm) * self.fall_height_m * self.turbine_efficiency
    }
}

/// Run-of-river plant valued from daily precipitation (mm/day).
#[derive(Debug, Clone)]
pub struct HydroLoader {
    precipitation: OrderedSeries,
    plant: HydroPlant,
}

impl HydroLoader {
    pub fn new(precipitation: OrderedSeries) -> Self {
        Self {
            precipitation,
            plant: HydroPlant::default(),
        }
    }

    pub fn with_plant(mut self, plant: HydroPlant) -> EngineResult<Self> {
        check_positive("catchment_area", plant.catchment_area_km2)?;
        check_positive("fall_height", plant.fall_height_m)?;
        check_positive("price_per_kwh", plant.price_per_kwh)?;
        for (field, fraction) in [
            ("runoff_coefficient", plant.runoff_coefficient),
            ("turbine_efficiency", plant.turbine_efficiency),
        ] {
            if !(fraction > 0.0 && fraction <= 1.0) {
                return Err(EngineError::invalid(field, fraction, "must be in (0, 1]"));
            }
        }
        self.plant = plant;
        Ok(self)
    }
}

impl EnergyDataLoader for HydroLoader {
    fn name(&self) -> &'static str {
        "hydro"
    }

    fn fetch(&self) -> EngineResult<OrderedSeries> {
        Ok(self.precipitation.clone())
    }

    /// P x 86400 / 1000 valued at $/kWh.
    fn compute_price(&self, raw: &OrderedSeries) -> EngineResult<OrderedSeries> {
        check_raw(raw, "precipitation")?;
        let plant = self.plant;
        Ok(raw.map_values(|_, mm| plant.power_watts(mm) * SECONDS_PER_DAY / 1000.0 * plant.price_per_kwh))
    }
}
