//! Aggregation core: calls both upstream services, reconciles their
//! profiles and merges them into one [`MergedProfile`].

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::clients::{GridProfileSource, PointProfileSource};
use crate::config::{NedmFailurePolicy, ServiceConfig};
use crate::constants::{MAX_ALTITUDE_KM, NEDM_DENSITY_SCALE};
use crate::error::ProfileError;
use crate::models::{
    GridRequest, GridResponse, MergedProfile, Measurement, Model, PointRequest, PointResponse,
    ProfileOutcome, Query, SolarContext, VerticalSeries,
};
use crate::normalizer::normalize_point_profile;

/// Where a model's profile comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileSource {
    /// Part of the grid service bundle, fetched on every request.
    Grid,
    /// Fetched from the point service only when requested.
    Point,
}

/// How one model is fetched and post-processed.
#[derive(Debug, Clone, Copy)]
pub struct ModelEntry {
    pub model: Model,
    pub source: ProfileSource,
    /// Altitudes above this are cut, along with the tail of each requested
    /// measurement array.
    pub altitude_ceiling: Option<i32>,
    /// Whether unrequested measurement arrays are removed.
    pub filter_measurements: bool,
}

impl ModelEntry {
    fn reconcile(&self, series: &mut VerticalSeries, measurements: &BTreeSet<Measurement>) {
        if let Some(ceiling) = self.altitude_ceiling {
            series.truncate_above(ceiling, measurements);
        }
        if self.filter_measurements {
            series.retain_measurements(measurements);
        }
    }
}

/// Models in reconciliation order.
///
/// Grid models keep whatever measurement arrays the grid service sent,
/// requested or not; only NEDM2020 is filtered.
pub const MODEL_REGISTRY: [ModelEntry; 3] = [
    ModelEntry {
        model: Model::Tadm,
        source: ProfileSource::Grid,
        altitude_ceiling: Some(MAX_ALTITUDE_KM),
        filter_measurements: false,
    },
    ModelEntry {
        model: Model::NeQuick,
        source: ProfileSource::Grid,
        altitude_ceiling: None,
        filter_measurements: false,
    },
    ModelEntry {
        model: Model::Nedm2020,
        source: ProfileSource::Point,
        altitude_ceiling: None,
        filter_measurements: true,
    },
];

/// Products always requested from the grid service.
pub fn baseline_models() -> Vec<Model> {
    MODEL_REGISTRY
        .iter()
        .filter(|entry| entry.source == ProfileSource::Grid)
        .map(|entry| entry.model)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MergeOptions {
    pub nedm_failure: NedmFailurePolicy,
    pub density_scale: f64,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            nedm_failure: NedmFailurePolicy::default(),
            density_scale: NEDM_DENSITY_SCALE,
        }
    }
}

impl From<&ServiceConfig> for MergeOptions {
    fn from(config: &ServiceConfig) -> Self {
        Self {
            nedm_failure: config.nedm_failure,
            density_scale: config.density_scale,
        }
    }
}

/// Merges one query's upstream profiles. Cheap to build; construct one per
/// request around shared sources.
pub struct ProfileMerger {
    grid: Arc<dyn GridProfileSource>,
    point: Arc<dyn PointProfileSource>,
    options: MergeOptions,
}

impl ProfileMerger {
    pub fn new(
        grid: Arc<dyn GridProfileSource>,
        point: Arc<dyn PointProfileSource>,
        options: MergeOptions,
    ) -> Self {
        Self {
            grid,
            point,
            options,
        }
    }

    /// Runs the merge. Every failure comes back as a
    /// [`ProfileOutcome::Failure`]; nothing is raised to the caller.
    ///
    /// Assumes the query was validated by the caller.
    pub async fn merge(&self, query: &Query) -> ProfileOutcome {
        match self.try_merge(query).await {
            Ok(profile) => ProfileOutcome::Success(profile),
            Err(err) => {
                tracing::warn!("Profile merge failed: {}", err);
                ProfileOutcome::Failure(err.into())
            }
        }
    }

    async fn try_merge(&self, query: &Query) -> Result<MergedProfile, ProfileError> {
        let request = GridRequest::for_query(query, &baseline_models());
        let payload = self
            .grid
            .fetch_grid_profile(&request)
            .await
            .map_err(|e| ProfileError::Upstream(format!("{:#}", e)))?;
        let grid = parse_grid_payload(payload)?;
        let solar = SolarContext::from(&grid.grid_params);
        let f10_7 = solar.f10_7.as_f64().ok_or_else(|| {
            ProfileError::Upstream(format!("F10.7 value {} is not a usable number", solar.f10_7))
        })?;

        let mut vprofile = grid.model_data.vprofile;
        for code in vprofile.keys() {
            if Model::from_product_code(code).is_none() {
                tracing::debug!("Ignoring unknown product {}", code);
            }
        }

        let mut profiles = BTreeMap::new();
        let mut warnings = Vec::new();
        for entry in &MODEL_REGISTRY {
            if !query.models.contains(&entry.model) {
                continue;
            }

            let mut series = match entry.source {
                ProfileSource::Grid => {
                    let Some(raw) = vprofile.remove(entry.model.product_code()) else {
                        tracing::debug!("{} was not returned by the grid service", entry.model);
                        continue;
                    };
                    match VerticalSeries::deserialize(&raw) {
                        Ok(series) => series,
                        Err(e) => {
                            tracing::debug!("Skipping undecodable {} profile: {}", entry.model, e);
                            continue;
                        }
                    }
                }
                ProfileSource::Point => {
                    let fetched = self
                        .point_profile(&query.timestamp, query.latitude, query.longitude, f10_7)
                        .await;
                    match fetched {
                        Ok(series) => series,
                        Err(err) if self.options.nedm_failure == NedmFailurePolicy::OmitModel => {
                            tracing::warn!("Omitting {}: {}", entry.model, err);
                            warnings.push(format!("{} omitted: {}", entry.model, err));
                            continue;
                        }
                        Err(err) => return Err(err),
                    }
                }
            };

            entry.reconcile(&mut series, &query.measurements);
            profiles.insert(entry.model, series);
        }

        Ok(MergedProfile {
            timestamp: query.timestamp,
            location: [query.latitude, query.longitude],
            solar,
            models: query.models.clone(),
            measurements: query.measurements.clone(),
            profiles,
            warnings,
        })
    }

    /// Fetches and normalizes the NEDM2020 profile above one point.
    pub async fn point_profile(
        &self,
        timestamp: &DateTime<Utc>,
        latitude: f64,
        longitude: f64,
        f10_7: f64,
    ) -> Result<VerticalSeries, ProfileError> {
        let request = PointRequest::vertical(f10_7, latitude, longitude, timestamp);
        let payload = self
            .point
            .fetch_point_profile(&request)
            .await
            .map_err(|e| ProfileError::Upstream(format!("{:#}", e)))?;

        let response = PointResponse::deserialize(&payload)
            .map_err(|e| ProfileError::PointMalformed(e.to_string()))?;
        if response.features.is_empty() {
            return Err(ProfileError::NoDataAvailable);
        }

        normalize_point_profile(&response.features, self.options.density_scale)
    }
}

/// Accepts the payload only if grid parameters, solar context and model
/// data are all present; otherwise the raw payload becomes the error.
/// Individual profiles are not decoded here.
fn parse_grid_payload(payload: Value) -> Result<GridResponse, ProfileError> {
    match GridResponse::deserialize(&payload) {
        Ok(response) => Ok(response),
        Err(e) => {
            tracing::warn!("Malformed grid profile payload: {}", e);
            Err(ProfileError::UpstreamMalformed(payload))
        }
    }
}
