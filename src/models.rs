use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};

use crate::constants::{
    LATITUDE_RANGE, LONGITUDE_RANGE, RECEIVER_ALTITUDE_KM, SATELLITE_ALTITUDE_KM,
};
use crate::error::ValidationError;

// ============================================================================
// Profile Models
// ============================================================================

/// Ionospheric model producing a vertical profile.
///
/// Serialized with the upstream product codes; the short names are
/// accepted on input.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
pub enum Model {
    #[serde(rename = "NEQUICK.ALG", alias = "NEQUICK")]
    NeQuick,
    #[serde(rename = "TADM.ALG", alias = "TADM")]
    Tadm,
    #[serde(rename = "NEDM2020.ALG", alias = "NEDM2020")]
    Nedm2020,
}

impl Model {
    pub fn product_code(self) -> &'static str {
        match self {
            Model::NeQuick => "NEQUICK.ALG",
            Model::Tadm => "TADM.ALG",
            Model::Nedm2020 => "NEDM2020.ALG",
        }
    }

    pub fn from_product_code(code: &str) -> Option<Self> {
        match code {
            "NEQUICK.ALG" => Some(Model::NeQuick),
            "TADM.ALG" => Some(Model::Tadm),
            "NEDM2020.ALG" => Some(Model::Nedm2020),
            _ => None,
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.product_code())
    }
}

/// Kind of sample carried alongside the altitude axis.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Measurement {
    /// Plasma frequency in MHz
    Frequency,
    /// Electron density in el/m^3
    Edensity,
}

impl Measurement {
    pub fn as_str(self) -> &'static str {
        match self {
            Measurement::Frequency => "frequency",
            Measurement::Edensity => "edensity",
        }
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Altitude-indexed samples for one model. `theight` is the alignment key;
/// populated measurement arrays are parallel to it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VerticalSeries {
    pub theight: Vec<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub frequency: Option<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub edensity: Option<Vec<f64>>,
}

impl VerticalSeries {
    pub fn measurement(&self, measurement: Measurement) -> Option<&[f64]> {
        match measurement {
            Measurement::Frequency => self.frequency.as_deref(),
            Measurement::Edensity => self.edensity.as_deref(),
        }
    }

    fn measurement_mut(&mut self, measurement: Measurement) -> &mut Option<Vec<f64>> {
        match measurement {
            Measurement::Frequency => &mut self.frequency,
            Measurement::Edensity => &mut self.edensity,
        }
    }

    /// Keeps altitudes `<= ceiling`, then cuts the requested measurement
    /// arrays to the surviving length. Trailing values are dropped without
    /// being inspected; unrequested arrays are left untouched.
    pub fn truncate_above(&mut self, ceiling: i32, requested: &BTreeSet<Measurement>) {
        self.theight.retain(|&height| height <= ceiling);
        let len = self.theight.len();
        for &measurement in requested {
            if let Some(values) = self.measurement_mut(measurement) {
                values.truncate(len);
            }
        }
    }

    /// Drops every measurement array that was not requested.
    pub fn retain_measurements(&mut self, requested: &BTreeSet<Measurement>) {
        for measurement in [Measurement::Frequency, Measurement::Edensity] {
            if !requested.contains(&measurement) {
                *self.measurement_mut(measurement) = None;
            }
        }
    }
}

/// A validated profile request.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub models: BTreeSet<Model>,
    pub measurements: BTreeSet<Measurement>,
}

impl Query {
    pub fn new(
        timestamp: DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        models: impl IntoIterator<Item = Model>,
        measurements: impl IntoIterator<Item = Measurement>,
    ) -> Result<Self, ValidationError> {
        validate_location(latitude, longitude)?;

        let models: BTreeSet<Model> = models.into_iter().collect();
        if models.is_empty() {
            return Err(ValidationError::NoModels);
        }
        let measurements: BTreeSet<Measurement> = measurements.into_iter().collect();
        if measurements.is_empty() {
            return Err(ValidationError::NoMeasurements);
        }

        Ok(Self {
            timestamp,
            latitude,
            longitude,
            models,
            measurements,
        })
    }
}

/// Checks a location against the European grid coverage.
pub fn validate_location(latitude: f64, longitude: f64) -> Result<(), ValidationError> {
    if !(LATITUDE_RANGE.0..=LATITUDE_RANGE.1).contains(&latitude) {
        return Err(ValidationError::LatitudeOutOfRange(latitude));
    }
    if !(LONGITUDE_RANGE.0..=LONGITUDE_RANGE.1).contains(&longitude) {
        return Err(ValidationError::LongitudeOutOfRange(longitude));
    }
    Ok(())
}

/// Parses an RFC 3339 timestamp, or a naive ISO 8601 date-time taken as UTC.
pub fn parse_timestamp(input: &str) -> Result<DateTime<Utc>, ValidationError> {
    let input = input.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(input) {
        return Ok(parsed.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(input, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| ValidationError::InvalidTimestamp(input.to_string()))
}

/// Sunspot number, solar flux and geomagnetic index reported by the grid
/// service, echoed exactly as sent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolarContext {
    pub ssn: Number,
    pub f10_7: Number,
    pub kp: Number,
}

/// The merged output of one profile request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergedProfile {
    pub timestamp: DateTime<Utc>,
    pub location: [f64; 2],
    #[serde(flatten)]
    pub solar: SolarContext,
    #[serde(rename = "products")]
    pub models: BTreeSet<Model>,
    pub measurements: BTreeSet<Measurement>,
    #[serde(rename = "plot_data")]
    pub profiles: BTreeMap<Model, VerticalSeries>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

/// Structured failure returned in place of a [`MergedProfile`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorPayload {
    pub error: Value,
}

/// Either terminal state of a merge. Serializes untagged, so callers tell
/// the two apart by the presence of an `error` key.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ProfileOutcome {
    Success(MergedProfile),
    Failure(ErrorPayload),
}

// ============================================================================
// Grid Profile Service Models (NOA)
// ============================================================================

/// Query sent to the grid profile service.
#[derive(Debug, Clone, PartialEq)]
pub struct GridRequest {
    pub timestamp: DateTime<Utc>,
    pub latitude: f64,
    pub longitude: f64,
    pub products: Vec<Model>,
    pub measurements: Vec<Measurement>,
}

impl GridRequest {
    /// The grid service is always asked for the given baseline products,
    /// whatever subset the caller keeps.
    pub fn for_query(query: &Query, baseline: &[Model]) -> Self {
        Self {
            timestamp: query.timestamp,
            latitude: query.latitude,
            longitude: query.longitude,
            products: baseline.to_vec(),
            measurements: query.measurements.iter().copied().collect(),
        }
    }

    /// Query string pairs; `products` and `measurements` repeat.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = vec![
            ("date", self.timestamp.format("%Y-%m-%dT%H:%M:%S").to_string()),
            ("lat", self.latitude.to_string()),
            ("lon", self.longitude.to_string()),
        ];
        pairs.extend(
            self.products
                .iter()
                .map(|product| ("products", product.product_code().to_string())),
        );
        pairs.extend(
            self.measurements
                .iter()
                .map(|measurement| ("measurements", measurement.as_str().to_string())),
        );
        pairs
    }
}

#[derive(Debug, Deserialize)]
pub struct GridResponse {
    pub grid_params: GridParams,
    pub model_data: ModelData,
}

#[derive(Debug, Deserialize)]
pub struct GridParams {
    #[serde(rename = "SolCycle")]
    pub sol_cycle: SolarCycle,
    #[serde(rename = "Kp")]
    pub kp: KpIndex,
}

#[derive(Debug, Deserialize)]
pub struct SolarCycle {
    pub ssn: Number,
    pub f10_7: Number,
}

#[derive(Debug, Deserialize)]
pub struct KpIndex {
    pub kp: Number,
}

/// Profiles stay undecoded until the merger knows which ones it keeps.
#[derive(Debug, Deserialize)]
pub struct ModelData {
    pub vprofile: BTreeMap<String, Value>,
}

impl From<&GridParams> for SolarContext {
    fn from(params: &GridParams) -> Self {
        Self {
            ssn: params.sol_cycle.ssn.clone(),
            f10_7: params.sol_cycle.f10_7.clone(),
            kp: params.kp.kp.clone(),
        }
    }
}

// ============================================================================
// Point Profile Service Models (DLR)
// ============================================================================

/// Body posted to the point profile service.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PointRequest {
    pub f10p7_sfu: f64,
    pub receiver: GeoPosition,
    pub satellite: GeoPosition,
    pub time: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeoPosition {
    pub alt_km: f64,
    pub lat_deg: f64,
    pub lon_deg: f64,
}

impl PointRequest {
    /// Vertical ray from a ground receiver to a satellite above the same point.
    pub fn vertical(f10_7: f64, latitude: f64, longitude: f64, timestamp: &DateTime<Utc>) -> Self {
        let position = |alt_km| GeoPosition {
            alt_km,
            lat_deg: latitude,
            lon_deg: longitude,
        };
        Self {
            f10p7_sfu: f10_7,
            receiver: position(RECEIVER_ALTITUDE_KM),
            satellite: position(SATELLITE_ALTITUDE_KM),
            time: timestamp.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PointResponse {
    #[serde(default)]
    pub features: Vec<PointFeature>,
}

#[derive(Debug, Deserialize)]
pub struct PointFeature {
    pub geometry: PointGeometry,
    pub properties: PointProperties,
}

impl PointFeature {
    /// Altitude in km, the third coordinate.
    pub fn altitude(&self) -> Option<f64> {
        self.geometry.coordinates.get(2).copied()
    }
}

#[derive(Debug, Deserialize)]
pub struct PointGeometry {
    pub coordinates: Vec<f64>,
}

#[derive(Debug, Deserialize)]
pub struct PointProperties {
    /// Electron density in units of 10^12/m^3
    #[serde(rename = "electron_density_10^12/m^3")]
    pub electron_density: f64,
}

// ============================================================================
// MCP Tool Request Models
// ============================================================================

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct ProfileRequest {
    /// Timestamp in ISO 8601, e.g. 2025-02-01T10:45:00 (UTC when no offset is given)
    pub date: String,
    /// Latitude, between 34 and 60
    pub latitude: f64,
    /// Longitude, between -5 and 40
    pub longitude: f64,
    /// One or more of NEQUICK.ALG, TADM.ALG, NEDM2020.ALG
    pub models: Vec<Model>,
    /// One or more of frequency, edensity
    pub measurements: Vec<Measurement>,
}

impl TryFrom<ProfileRequest> for Query {
    type Error = ValidationError;

    fn try_from(request: ProfileRequest) -> Result<Self, Self::Error> {
        let timestamp = parse_timestamp(&request.date)?;
        Query::new(
            timestamp,
            request.latitude,
            request.longitude,
            request.models,
            request.measurements,
        )
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
pub struct PointProfileRequest {
    /// Timestamp in ISO 8601, e.g. 2025-02-01T10:45:00 (UTC when no offset is given)
    pub date: String,
    /// Latitude, between 34 and 60
    pub latitude: f64,
    /// Longitude, between -5 and 40
    pub longitude: f64,
    /// F10.7 solar flux in sfu (defaults to 100)
    #[serde(default)]
    pub f10_7: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 2, 1, 10, 45, 0).unwrap()
    }

    #[test]
    fn model_accepts_codes_and_short_names() {
        let models: Vec<Model> =
            serde_json::from_value(json!(["TADM.ALG", "NEQUICK", "NEDM2020"])).unwrap();
        assert_eq!(models, vec![Model::Tadm, Model::NeQuick, Model::Nedm2020]);
        assert_eq!(serde_json::to_value(Model::Tadm).unwrap(), json!("TADM.ALG"));
        assert_eq!(Model::from_product_code("NEQUICK.ALG"), Some(Model::NeQuick));
        assert_eq!(Model::from_product_code("IRI.ALG"), None);
    }

    #[test]
    fn measurement_serializes_lowercase() {
        assert_eq!(
            serde_json::to_value(Measurement::Edensity).unwrap(),
            json!("edensity")
        );
        let parsed: Measurement = serde_json::from_value(json!("frequency")).unwrap();
        assert_eq!(parsed, Measurement::Frequency);
    }

    #[test]
    fn truncate_above_cuts_only_requested_arrays() {
        let mut series = VerticalSeries {
            theight: vec![100, 500, 1200],
            frequency: Some(vec![1.0, 2.0, 3.0]),
            edensity: Some(vec![10.0, 20.0, 30.0]),
        };
        series.truncate_above(1000, &BTreeSet::from([Measurement::Edensity]));

        assert_eq!(series.theight, vec![100, 500]);
        assert_eq!(series.edensity, Some(vec![10.0, 20.0]));
        assert_eq!(series.frequency, Some(vec![1.0, 2.0, 3.0]));
    }

    #[test]
    fn truncate_above_has_no_lower_bound() {
        let mut series = VerticalSeries {
            theight: vec![60, 80, 1000, 1001],
            frequency: Some(vec![0.5, 1.0, 2.0, 2.5]),
            edensity: None,
        };
        series.truncate_above(1000, &BTreeSet::from([Measurement::Frequency]));

        assert_eq!(series.theight, vec![60, 80, 1000]);
        assert_eq!(series.frequency, Some(vec![0.5, 1.0, 2.0]));
    }

    #[test]
    fn retain_measurements_drops_unrequested() {
        let mut series = VerticalSeries {
            theight: vec![300],
            frequency: Some(vec![9.0]),
            edensity: Some(vec![1e12]),
        };
        series.retain_measurements(&BTreeSet::from([Measurement::Frequency]));
        assert_eq!(series.frequency, Some(vec![9.0]));
        assert_eq!(series.edensity, None);
    }

    #[test]
    fn query_rejects_out_of_grid_locations() {
        let result = Query::new(timestamp(), 33.9, 10.0, [Model::Tadm], [Measurement::Edensity]);
        assert_eq!(result, Err(ValidationError::LatitudeOutOfRange(33.9)));

        let result = Query::new(timestamp(), 50.0, 40.5, [Model::Tadm], [Measurement::Edensity]);
        assert_eq!(result, Err(ValidationError::LongitudeOutOfRange(40.5)));
    }

    #[test]
    fn query_rejects_empty_selections() {
        let result = Query::new(timestamp(), 50.0, 15.0, Vec::new(), [Measurement::Edensity]);
        assert_eq!(result, Err(ValidationError::NoModels));

        let result = Query::new(timestamp(), 50.0, 15.0, [Model::NeQuick], Vec::new());
        assert_eq!(result, Err(ValidationError::NoMeasurements));
    }

    #[test]
    fn query_accepts_grid_corners() {
        assert!(Query::new(timestamp(), 34.0, -5.0, [Model::Tadm], [Measurement::Edensity]).is_ok());
        assert!(Query::new(timestamp(), 60.0, 40.0, [Model::Tadm], [Measurement::Edensity]).is_ok());
    }

    #[test]
    fn parse_timestamp_accepts_naive_and_offset_forms() {
        assert_eq!(parse_timestamp("2025-02-01T10:45:00").unwrap(), timestamp());
        assert_eq!(parse_timestamp("2025-02-01 10:45:00").unwrap(), timestamp());
        assert_eq!(parse_timestamp("2025-02-01T10:45").unwrap(), timestamp());
        assert_eq!(parse_timestamp("2025-02-01T10:45:00Z").unwrap(), timestamp());
        assert_eq!(parse_timestamp("2025-02-01T12:45:00+02:00").unwrap(), timestamp());
        assert!(matches!(
            parse_timestamp("yesterday"),
            Err(ValidationError::InvalidTimestamp(_))
        ));
    }

    #[test]
    fn grid_request_repeats_products_and_measurements() {
        let query = Query::new(
            timestamp(),
            50.0,
            15.0,
            [Model::Nedm2020],
            [Measurement::Frequency, Measurement::Edensity],
        )
        .unwrap();
        let request = GridRequest::for_query(&query, &[Model::NeQuick, Model::Tadm]);

        assert_eq!(
            request.query_pairs(),
            vec![
                ("date", "2025-02-01T10:45:00".to_string()),
                ("lat", "50".to_string()),
                ("lon", "15".to_string()),
                ("products", "NEQUICK.ALG".to_string()),
                ("products", "TADM.ALG".to_string()),
                ("measurements", "frequency".to_string()),
                ("measurements", "edensity".to_string()),
            ]
        );
    }

    #[test]
    fn point_request_uses_millisecond_utc_time() {
        let request = PointRequest::vertical(120.5, 50.0, 15.0, &timestamp());
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "f10p7_sfu": 120.5,
                "receiver": {"alt_km": 0.0, "lat_deg": 50.0, "lon_deg": 15.0},
                "satellite": {"alt_km": 20000.0, "lat_deg": 50.0, "lon_deg": 15.0},
                "time": "2025-02-01T10:45:00.000Z"
            })
        );
    }

    #[test]
    fn outcome_failure_is_distinguishable_by_error_key() {
        let outcome = ProfileOutcome::Failure(ErrorPayload {
            error: json!("boom"),
        });
        assert!(matches!(outcome, ProfileOutcome::Failure(_)));
        assert_eq!(serde_json::to_value(&outcome).unwrap(), json!({"error": "boom"}));
    }
}
