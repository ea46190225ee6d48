//! CO₂ estimate for a driven route.

/// Average tailpipe factor in kg CO₂e per km.
pub const DEFAULT_CO2_KG_PER_KM: f64 = 0.171;

/// Estimated CO₂ in kilograms for `distance_km` at `factor_kg_per_km`.
///
/// Reported to the gram, which also keeps simple products such as
/// `10.0 * 0.171` at their decimal value.
pub fn estimate_co2_kg(distance_km: f64, factor_kg_per_km: f64) -> f64 {
    (distance_km * factor_kg_per_km * 1000.0).round() / 1000.0
}
