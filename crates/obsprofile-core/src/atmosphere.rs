//! 1976 U.S. Standard Atmosphere, restricted to the three lowest layers.
//!
//! Geometric altitude is converted to geopotential altitude before the
//! barometric formula is applied. Results outside the supported range, or
//! for non-finite input, are `None` rather than NaN.

use once_cell::sync::Lazy;

const EARTH_RADIUS_M: f64 = 6_356_766.0;
const STANDARD_GRAVITY: f64 = 9.806_65;
// Specific gas constant for dry air.
const R_AIR: f64 = 287.052_87;
const SEA_LEVEL_PRESSURE_PA: f64 = 101_325.0;
const SEA_LEVEL_TEMPERATURE_K: f64 = 288.15;

pub const MIN_ALTITUDE_M: f64 = 0.0;
pub const MAX_ALTITUDE_M: f64 = 32_000.0;

struct Layer {
    base_geopotential_m: f64,
    base_temperature_k: f64,
    lapse_rate_k_per_m: f64,
    base_pressure_pa: f64,
}

impl Layer {
    fn temperature(&self, geopotential_m: f64) -> f64 {
        self.base_temperature_k + self.lapse_rate_k_per_m * (geopotential_m - self.base_geopotential_m)
    }

    fn pressure(&self, geopotential_m: f64) -> f64 {
        let dh = geopotential_m - self.base_geopotential_m;
        if self.lapse_rate_k_per_m == 0.0 {
            self.base_pressure_pa
                * (-STANDARD_GRAVITY * dh / (R_AIR * self.base_temperature_k)).exp()
        } else {
            let ratio = self.temperature(geopotential_m) / self.base_temperature_k;
            self.base_pressure_pa
                * ratio.powf(-STANDARD_GRAVITY / (R_AIR * self.lapse_rate_k_per_m))
        }
    }
}

// (base geopotential altitude, lapse rate). Base temperatures and pressures
// are chained from the layer below so the profile is continuous.
const LAYER_BASES: [(f64, f64); 3] = [(0.0, -6.5e-3), (11_000.0, 0.0), (20_000.0, 1.0e-3)];

static LAYERS: Lazy<Vec<Layer>> = Lazy::new(|| {
    let mut layers: Vec<Layer> = Vec::with_capacity(LAYER_BASES.len());
    for (base, lapse) in LAYER_BASES {
        let (temperature, pressure) = match layers.last() {
            Some(below) => (below.temperature(base), below.pressure(base)),
            None => (SEA_LEVEL_TEMPERATURE_K, SEA_LEVEL_PRESSURE_PA),
        };
        layers.push(Layer {
            base_geopotential_m: base,
            base_temperature_k: temperature,
            lapse_rate_k_per_m: lapse,
            base_pressure_pa: pressure,
        });
    }
    layers
});

pub fn geopotential_altitude(geometric_m: f64) -> f64 {
    EARTH_RADIUS_M * geometric_m / (EARTH_RADIUS_M + geometric_m)
}

fn layer_for(geometric_m: f64) -> Option<(&'static Layer, f64)> {
    if !geometric_m.is_finite() || !(MIN_ALTITUDE_M..=MAX_ALTITUDE_M).contains(&geometric_m) {
        return None;
    }
    let geopotential = geopotential_altitude(geometric_m);
    LAYERS
        .iter()
        .rev()
        .find(|layer| geopotential >= layer.base_geopotential_m)
        .map(|layer| (layer, geopotential))
}

/// Pressure in pascals at a geometric altitude in meters.
pub fn pressure_of(altitude_m: f64) -> Option<f64> {
    let (layer, geopotential) = layer_for(altitude_m)?;
    let pressure = layer.pressure(geopotential);
    (pressure.is_finite() && pressure > 0.0).then_some(pressure)
}

/// Temperature in kelvin at a geometric altitude in meters.
pub fn temperature_of(altitude_m: f64) -> Option<f64> {
    let (layer, geopotential) = layer_for(altitude_m)?;
    let temperature = layer.temperature(geopotential);
    (temperature.is_finite() && temperature > 0.0).then_some(temperature)
}
