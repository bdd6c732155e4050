use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use reqwest::Client;
use rmcp::{
    handler::server::{wrapper::Parameters, ServerHandler, tool::ToolRouter},
    model::{CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
    ErrorData as McpError,
};
use serde::Serialize;

use crate::chart::build_chart;
use crate::clients::{GridClient, GridProfileSource, PointClient, PointProfileSource};
use crate::config::ServiceConfig;
use crate::constants::{DEFAULT_F10_7_SFU, USER_AGENT};
use crate::error::ValidationError;
use crate::formatters::{format_profile_summary, format_series};
use crate::merger::{MergeOptions, ProfileMerger};
use crate::models::{
    parse_timestamp, validate_location, ErrorPayload, Model, PointProfileRequest, ProfileOutcome,
    ProfileRequest, Query,
};

/// Ionospheric profile service that handles MCP requests
#[derive(Clone)]
pub struct Ionosphere {
    grid: Arc<dyn GridProfileSource>,
    point: Arc<dyn PointProfileSource>,
    options: MergeOptions,
    tool_router: ToolRouter<Self>,
}

impl Ionosphere {
    /// Creates a service talking to the configured upstream endpoints
    pub fn new(config: &ServiceConfig) -> Result<Self> {
        let client = Arc::new(Client::builder().user_agent(USER_AGENT).build()?);

        let grid = GridClient::new(client.clone(), &config.grid_api_url, config.grid_timeout);
        let point = PointClient::new(client, &config.point_api_url, config.point_timeout);

        Ok(Self::with_sources(
            Arc::new(grid),
            Arc::new(point),
            MergeOptions::from(config),
        ))
    }

    /// Creates a service around arbitrary profile sources
    pub fn with_sources(
        grid: Arc<dyn GridProfileSource>,
        point: Arc<dyn PointProfileSource>,
        options: MergeOptions,
    ) -> Self {
        Self {
            grid,
            point,
            options,
            tool_router: Self::tool_router(),
        }
    }

    /// A fresh merger for one request
    fn merger(&self) -> ProfileMerger {
        ProfileMerger::new(self.grid.clone(), self.point.clone(), self.options)
    }

    fn validate(request: ProfileRequest) -> Result<Query, McpError> {
        Query::try_from(request).map_err(invalid_params)
    }
}

fn invalid_params(err: ValidationError) -> McpError {
    McpError::invalid_params(err.to_string(), None)
}

fn to_json<T: Serialize>(value: &T) -> Result<String, McpError> {
    serde_json::to_string_pretty(value).map_err(|e| {
        McpError::internal_error(format!("Failed to serialize response: {}", e), None)
    })
}

/// Error payloads are handed back verbatim in an error-flagged result
fn error_result(payload: &ErrorPayload) -> Result<CallToolResult, McpError> {
    Ok(CallToolResult::error(vec![Content::text(to_json(payload)?)]))
}

#[tool_handler]
impl ServerHandler for Ionosphere {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "mcp-ionosphere".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
                icons: None,
                title: None,
                website_url: None,
            },
            instructions: Some(
                "Electron density and plasma frequency profiles over the European grid \
                (lat 34 to 60, lon -5 to 40) from the TaD-3D, NeQuick and NEDM2020 models."
                    .to_string(),
            ),
        }
    }
}

#[tool_router]
impl Ionosphere {
    /// Gets the merged vertical profile for a point and time
    #[tool(description = "Get electron density and frequency vertical profiles for a location on the European grid (latitude 34 to 60, longitude -5 to 40). Select models from NEQUICK.ALG, TADM.ALG, NEDM2020.ALG and measurements from frequency, edensity. Date is ISO 8601, e.g. 2025-02-01T10:45:00 (UTC).")]
    async fn get_profile(
        &self,
        Parameters(request): Parameters<ProfileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let query = Self::validate(request)?;
        tracing::info!(
            "Getting profile for {}, {} at {}",
            query.latitude,
            query.longitude,
            query.timestamp
        );

        match self.merger().merge(&query).await {
            ProfileOutcome::Success(profile) => Ok(CallToolResult::success(vec![
                Content::text(to_json(&profile)?),
                Content::text(format_profile_summary(&profile)),
            ])),
            ProfileOutcome::Failure(payload) => error_result(&payload),
        }
    }

    /// Gets the chart plan for the merged vertical profile
    #[tool(description = "Get a chart plan (panels, series, axes and labels) plotting the requested measurements against height for each requested model. Takes the same parameters as get_profile.")]
    async fn plot_profile(
        &self,
        Parameters(request): Parameters<ProfileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let query = Self::validate(request)?;
        tracing::info!(
            "Planning chart for {}, {} at {}",
            query.latitude,
            query.longitude,
            query.timestamp
        );

        match self.merger().merge(&query).await {
            ProfileOutcome::Success(profile) => {
                let plan = build_chart(&profile);
                Ok(CallToolResult::success(vec![Content::text(to_json(&plan)?)]))
            }
            ProfileOutcome::Failure(payload) => error_result(&payload),
        }
    }

    /// Gets the NEDM2020 profile alone
    #[tool(description = "Get the NEDM2020 vertical profile for a location on the European grid. Optional f10_7 sets the solar flux in sfu (default 100).")]
    async fn get_point_profile(
        &self,
        Parameters(request): Parameters<PointProfileRequest>,
    ) -> Result<CallToolResult, McpError> {
        let timestamp = parse_timestamp(&request.date).map_err(invalid_params)?;
        validate_location(request.latitude, request.longitude).map_err(invalid_params)?;
        let f10_7 = request.f10_7.unwrap_or(DEFAULT_F10_7_SFU);
        tracing::info!(
            "Getting NEDM2020 profile for {}, {} at {} (F10.7 {})",
            request.latitude,
            request.longitude,
            timestamp,
            f10_7
        );

        match self
            .merger()
            .point_profile(&timestamp, request.latitude, request.longitude, f10_7)
            .await
        {
            Ok(series) => {
                let summary = format_series(Model::Nedm2020, &series);
                let body = BTreeMap::from([(Model::Nedm2020, series)]);
                Ok(CallToolResult::success(vec![
                    Content::text(to_json(&body)?),
                    Content::text(summary),
                ]))
            }
            Err(err) => {
                tracing::warn!("NEDM2020 profile failed: {}", err);
                let payload: ErrorPayload = err.into();
                error_result(&payload)
            }
        }
    }
}
