//! Service configuration loaded from environment variables.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::constants::{DEFAULT_TIMEOUT_SECS, GRID_API_URL, NEDM_DENSITY_SCALE, POINT_API_URL};

/// What a failed NEDM2020 fetch does to the rest of the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NedmFailurePolicy {
    /// The whole request becomes an error payload.
    #[default]
    FailRequest,
    /// NEDM2020 is left out of the profile map and a warning is recorded.
    OmitModel,
}

impl FromStr for NedmFailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(NedmFailurePolicy::FailRequest),
            "omit" => Ok(NedmFailurePolicy::OmitModel),
            other => anyhow::bail!("unknown NEDM2020 failure policy '{}' (expected fail or omit)", other),
        }
    }
}

/// Runtime configuration for the ionosphere service.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Grid profile service endpoint
    pub grid_api_url: String,
    /// Point profile service endpoint
    pub point_api_url: String,
    pub grid_timeout: Duration,
    pub point_timeout: Duration,
    pub nedm_failure: NedmFailurePolicy,
    /// Multiplier applied to NEDM2020 densities
    pub density_scale: f64,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            grid_api_url: GRID_API_URL.to_string(),
            point_api_url: POINT_API_URL.to_string(),
            grid_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            point_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            nedm_failure: NedmFailurePolicy::default(),
            density_scale: NEDM_DENSITY_SCALE,
        }
    }
}

impl ServiceConfig {
    /// Loads the configuration from the process environment.
    ///
    /// # Environment Variables
    /// - `IONO_GRID_API_URL` (optional): grid profile service endpoint
    /// - `IONO_POINT_API_URL` (optional): point profile service endpoint
    /// - `IONO_GRID_TIMEOUT_SECS` (optional, default: 30)
    /// - `IONO_POINT_TIMEOUT_SECS` (optional, default: 30)
    /// - `IONO_NEDM_FAILURE` (optional, default: `fail`): `fail` | `omit`
    /// - `IONO_NEDM_DENSITY_SCALE` (optional, default: 1e6)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(url) = lookup("IONO_GRID_API_URL") {
            config.grid_api_url = url;
        }
        if let Some(url) = lookup("IONO_POINT_API_URL") {
            config.point_api_url = url;
        }
        if let Some(secs) = lookup("IONO_GRID_TIMEOUT_SECS") {
            config.grid_timeout = parse_secs(&secs).context("invalid IONO_GRID_TIMEOUT_SECS")?;
        }
        if let Some(secs) = lookup("IONO_POINT_TIMEOUT_SECS") {
            config.point_timeout = parse_secs(&secs).context("invalid IONO_POINT_TIMEOUT_SECS")?;
        }
        if let Some(policy) = lookup("IONO_NEDM_FAILURE") {
            config.nedm_failure = policy
                .parse::<NedmFailurePolicy>()
                .context("invalid IONO_NEDM_FAILURE")?;
        }
        if let Some(scale) = lookup("IONO_NEDM_DENSITY_SCALE") {
            let scale: f64 = scale
                .trim()
                .parse::<f64>()
                .context("invalid IONO_NEDM_DENSITY_SCALE")?;
            if !scale.is_finite() || scale <= 0.0 {
                anyhow::bail!("IONO_NEDM_DENSITY_SCALE must be a positive number, got {}", scale);
            }
            config.density_scale = scale;
        }

        Ok(config)
    }
}

fn parse_secs(value: &str) -> Result<Duration> {
    let secs: u64 = value.trim().parse()?;
    if secs == 0 {
        anyhow::bail!("timeout must be at least one second");
    }
    Ok(Duration::from_secs(secs))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<ServiceConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServiceConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_without_environment() {
        let config = load(&[]).unwrap();
        assert_eq!(config.grid_api_url, GRID_API_URL);
        assert_eq!(config.point_api_url, POINT_API_URL);
        assert_eq!(config.grid_timeout, Duration::from_secs(30));
        assert_eq!(config.point_timeout, Duration::from_secs(30));
        assert_eq!(config.nedm_failure, NedmFailurePolicy::FailRequest);
        assert_eq!(config.density_scale, 1e6);
    }

    #[test]
    fn overrides_from_environment() {
        let config = load(&[
            ("IONO_GRID_API_URL", "http://localhost:9000/grid"),
            ("IONO_POINT_TIMEOUT_SECS", "5"),
            ("IONO_NEDM_FAILURE", "Omit"),
            ("IONO_NEDM_DENSITY_SCALE", "1e12"),
        ])
        .unwrap();

        assert_eq!(config.grid_api_url, "http://localhost:9000/grid");
        assert_eq!(config.point_timeout, Duration::from_secs(5));
        assert_eq!(config.nedm_failure, NedmFailurePolicy::OmitModel);
        assert_eq!(config.density_scale, 1e12);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(load(&[("IONO_GRID_TIMEOUT_SECS", "soon")]).is_err());
        assert!(load(&[("IONO_GRID_TIMEOUT_SECS", "0")]).is_err());
        assert!(load(&[("IONO_NEDM_FAILURE", "retry")]).is_err());
        assert!(load(&[("IONO_NEDM_DENSITY_SCALE", "-1")]).is_err());
    }
}
