use super::{check_positive, check_raw, CalibrationRequest, EnergyDataLoader};
use crate::errors::EngineResult;
use crate::models::volatility::{self, VolatilitySample};
use crate::series::OrderedSeries;
use crate::types::Diagnosed;

/// Photovoltaic panel valued from daily irradiance.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct SolarPanel {
    /// Fraction of incident energy converted.
    pub efficiency: f64,
    pub area_m2: f64,
    pub price_per_kwh: f64,
}

impl Default for SolarPanel {
    fn default() -> Self {
        Self {
            efficiency: 0.20,
            area_m2: 1.0,
            price_per_kwh: 0.10,
        }
    }
}

/// Solar loader over a daily GHI series (kWh/m^2/day).
///
/// Irradiance has a strong annual cycle, so volatility is estimated on the
/// monthly-deseasonalized price series.
#[derive(Debug, Clone)]
pub struct SolarLoader {
    irradiance: OrderedSeries,
    panel: SolarPanel,
}

impl SolarLoader {
    pub fn new(irradiance: OrderedSeries) -> Self {
        Self {
            irradiance,
            panel: SolarPanel::default(),
        }
    }

    pub fn with_panel(mut self, panel: SolarPanel) -> EngineResult<Self> {
        check_positive("panel_efficiency", panel.efficiency)?;
        check_positive("panel_area", panel.area_m2)?;
        check_positive("price_per_kwh", panel.price_per_kwh)?;
        self.panel = panel;
        Ok(self)
    }
}

impl EnergyDataLoader for SolarLoader {
    fn name(&self) -> &'static str {
        "solar"
    }

    fn fetch(&self) -> EngineResult<OrderedSeries> {
        Ok(self.irradiance.clone())
    }

    /// GHI x efficiency x area x $/kWh.
    fn compute_price(&self, raw: &OrderedSeries) -> EngineResult<OrderedSeries> {
        check_raw(raw, "ghi")?;
        let factor = self.panel.efficiency * self.panel.area_m2 * self.panel.price_per_kwh;
        Ok(raw.map_values(|_, ghi| ghi * factor))
    }

    fn estimate_volatility(
        &self,
        prices: &OrderedSeries,
        request: &CalibrationRequest,
    ) -> EngineResult<Diagnosed<VolatilitySample>> {
        let adjusted = volatility::deseasonalize_monthly(prices);
        super::estimate_volatility(&adjusted, request)
    }
}
