//! Reshapes the point profile service's feature list into a [`VerticalSeries`].

use crate::constants::{MAX_ALTITUDE_KM, NEDM_MIN_ALTITUDE_KM, PLASMA_FREQUENCY_COEFFICIENT};
use crate::error::ProfileError;
use crate::models::{PointFeature, VerticalSeries};

/// Plasma frequency in MHz for a density given in units of 10^12/m^3.
pub fn plasma_frequency_mhz(density: f64) -> f64 {
    PLASMA_FREQUENCY_COEFFICIENT * density.sqrt()
}

/// Builds the NEDM2020 series from raw features.
///
/// Altitudes are rounded half-to-even and kept only inside
/// `[100, 1000]` km, in upstream order. Each kept sample appends to all
/// three arrays at once, with the frequency derived from the raw density
/// and the density itself multiplied by `density_scale`. An empty result
/// is a valid series, not an error.
pub fn normalize_point_profile(
    features: &[PointFeature],
    density_scale: f64,
) -> Result<VerticalSeries, ProfileError> {
    let mut theight = Vec::new();
    let mut frequency = Vec::new();
    let mut edensity = Vec::new();

    for (index, feature) in features.iter().enumerate() {
        let altitude = feature.altitude().ok_or_else(|| {
            ProfileError::PointMalformed(format!("feature {} has no altitude coordinate", index))
        })?;
        let height = altitude.round_ties_even() as i32;
        if !(NEDM_MIN_ALTITUDE_KM..=MAX_ALTITUDE_KM).contains(&height) {
            continue;
        }

        let density = feature.properties.electron_density;
        if !density.is_finite() || density < 0.0 {
            tracing::debug!("Dropping sample at {} km with density {}", height, density);
            continue;
        }

        theight.push(height);
        frequency.push(plasma_frequency_mhz(density));
        edensity.push(density * density_scale);
    }

    Ok(VerticalSeries {
        theight,
        frequency: Some(frequency),
        edensity: Some(edensity),
    })
}
