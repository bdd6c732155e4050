use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, RequestBuilder};
use serde_json::Value;

use crate::models::{GridRequest, PointRequest};

/// Anything that can fetch the baseline vertical profile bundle.
#[async_trait]
pub trait GridProfileSource: Send + Sync {
    /// Returns the raw JSON body; structural checks belong to the caller.
    async fn fetch_grid_profile(&self, request: &GridRequest) -> Result<Value>;
}

/// Anything that can fetch a single-point NEDM2020 profile.
#[async_trait]
pub trait PointProfileSource: Send + Sync {
    async fn fetch_point_profile(&self, request: &PointRequest) -> Result<Value>;
}

/// Sends the request and decodes the body as JSON. Non-success statuses are
/// logged but not rejected: the upstream error document is what the caller
/// reports back.
async fn send_json(builder: RequestBuilder, service: &str) -> Result<Value> {
    let response = builder.header(ACCEPT, "application/json").send().await?;

    if !response.status().is_success() {
        tracing::warn!("{} responded with status: {}", service, response.status());
    }

    let data = response.json::<Value>().await?;
    Ok(data)
}

/// HTTP client for the NOA grid profile service.
#[derive(Clone)]
pub struct GridClient {
    client: Arc<Client>,
    endpoint: String,
    timeout: Duration,
}

impl GridClient {
    pub fn new(client: Arc<Client>, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl GridProfileSource for GridClient {
    async fn fetch_grid_profile(&self, request: &GridRequest) -> Result<Value> {
        tracing::info!(
            "Requesting grid profile for {}, {} at {}",
            request.latitude,
            request.longitude,
            request.timestamp
        );

        let builder = self
            .client
            .get(&self.endpoint)
            .query(&request.query_pairs())
            .timeout(self.timeout);

        send_json(builder, "grid profile service").await
    }
}

/// HTTP client for the DLR point profile service.
#[derive(Clone)]
pub struct PointClient {
    client: Arc<Client>,
    endpoint: String,
    timeout: Duration,
}

impl PointClient {
    pub fn new(client: Arc<Client>, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }
}

#[async_trait]
impl PointProfileSource for PointClient {
    async fn fetch_point_profile(&self, request: &PointRequest) -> Result<Value> {
        tracing::info!(
            "Requesting point profile for {}, {} at {} (F10.7 {})",
            request.receiver.lat_deg,
            request.receiver.lon_deg,
            request.time,
            request.f10p7_sfu
        );

        let builder = self
            .client
            .post(&self.endpoint)
            .json(request)
            .timeout(self.timeout);

        send_json(builder, "point profile service").await
    }
}
