//! Chart plan for a merged profile: which panels, series, axes and labels
//! to draw. Turning the plan into pixels is left to the renderer.

use serde::Serialize;

use crate::constants::CHART_DENSITY_DIVISOR;
use crate::models::{Measurement, MergedProfile, Model};

/// Width of one panel, in figure units; height is fixed.
const PANEL_WIDTH: f64 = 7.0;
const FIGURE_HEIGHT: f64 = 6.0;

/// Panels are laid out in this order, left to right.
const PANEL_ORDER: [Measurement; 2] = [Measurement::Edensity, Measurement::Frequency];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPlan {
    pub width: f64,
    pub height: f64,
    pub share_y_axis: bool,
    pub panels: Vec<ChartPanel>,
    /// Footer line with time, location and solar context
    pub caption: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartPanel {
    pub measurement: Measurement,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub x_min: f64,
    pub y_min: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x_tick_suffix: Option<String>,
    pub series: Vec<ChartSeries>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub model: Model,
    pub label: String,
    pub line_style: String,
    pub marker: String,
    pub points: Vec<ChartPoint>,
}

/// One sample: measurement value on x, altitude on y.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartPoint {
    pub x: f64,
    pub y: f64,
}

/// Builds the plan for every requested measurement.
pub fn build_chart(profile: &MergedProfile) -> ChartPlan {
    let products = profile
        .models
        .iter()
        .map(|model| model.product_code())
        .collect::<Vec<_>>()
        .join(", ");

    let panels: Vec<ChartPanel> = PANEL_ORDER
        .iter()
        .copied()
        .filter(|measurement| profile.measurements.contains(measurement))
        .map(|measurement| build_panel(profile, measurement, &products))
        .collect();

    ChartPlan {
        width: PANEL_WIDTH * panels.len().max(1) as f64,
        height: FIGURE_HEIGHT,
        share_y_axis: panels.len() > 1,
        panels,
        caption: format!(
            "{}, [Lat: {},Lon: {}], ssn: {}, f10.7: {}, kp: {}",
            profile.timestamp.format("%Y-%m-%d %H:%M:%S"),
            profile.location[0],
            profile.location[1],
            profile.solar.ssn,
            profile.solar.f10_7,
            profile.solar.kp
        ),
    }
}

fn build_panel(profile: &MergedProfile, measurement: Measurement, products: &str) -> ChartPanel {
    let (title, x_label, x_tick_suffix, divisor) = match measurement {
        Measurement::Edensity => (
            "Electron Density vs Height",
            "Electron Density (el/cm^3)",
            Some("\u{d7}10\u{2076}".to_string()),
            CHART_DENSITY_DIVISOR,
        ),
        Measurement::Frequency => ("Frequency vs Height", "Frequency (MHz)", None, 1.0),
    };

    let series = profile
        .profiles
        .iter()
        .filter_map(|(&model, vertical)| {
            let values = vertical.measurement(measurement)?;
            let points = values
                .iter()
                .zip(&vertical.theight)
                .map(|(&value, &height)| ChartPoint {
                    x: value / divisor,
                    y: f64::from(height),
                })
                .collect();
            Some(ChartSeries {
                model,
                label: model.product_code().to_string(),
                line_style: "-".to_string(),
                marker: "o".to_string(),
                points,
            })
        })
        .collect();

    ChartPanel {
        measurement,
        title: format!("{} - {}", title, products),
        x_label: x_label.to_string(),
        y_label: "Height (km)".to_string(),
        x_min: 0.0,
        y_min: 0.0,
        x_tick_suffix,
        series,
    }
}
