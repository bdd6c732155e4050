use crate::models::{MergedProfile, Model, VerticalSeries};

/// Formats a merged profile into a human-readable summary
pub fn format_profile_summary(profile: &MergedProfile) -> String {
    let mut output = format!(
        "Ionospheric Profile\nTime: {}\nLocation: {:.2}, {:.2}\nSolar context: SSN {}, F10.7 {} sfu, Kp {}\n\n",
        profile.timestamp.format("%Y-%m-%d %H:%M:%S UTC"),
        profile.location[0],
        profile.location[1],
        profile.solar.ssn,
        profile.solar.f10_7,
        profile.solar.kp
    );

    if profile.profiles.is_empty() {
        output.push_str("No model profiles available.\n");
    }
    for (model, series) in &profile.profiles {
        output.push_str(&format_series(*model, series));
    }

    for warning in &profile.warnings {
        output.push_str(&format!("Warning: {}\n", warning));
    }
    output
}

/// Formats a single model's vertical series
pub fn format_series(model: Model, series: &VerticalSeries) -> String {
    let mut output = format!("{}:\n", model);

    let (Some(lowest), Some(highest)) = (series.theight.iter().min(), series.theight.iter().max())
    else {
        output.push_str("  No samples in range\n\n");
        return output;
    };
    output.push_str(&format!(
        "  Samples: {}\n  Altitude: {} - {} km\n",
        series.theight.len(),
        lowest,
        highest
    ));

    if let Some((height, density)) = peak(&series.theight, series.edensity.as_deref()) {
        output.push_str(&format!(
            "  Peak density: {:.3e} el/m^3 at {} km\n",
            density, height
        ));
    }
    if let Some((height, frequency)) = peak(&series.theight, series.frequency.as_deref()) {
        output.push_str(&format!(
            "  Peak frequency: {:.2} MHz at {} km\n",
            frequency, height
        ));
    }
    output.push('\n');
    output
}

/// Largest finite value and the altitude it sits at
fn peak(heights: &[i32], values: Option<&[f64]>) -> Option<(i32, f64)> {
    heights
        .iter()
        .zip(values?)
        .filter(|(_, value)| value.is_finite())
        .map(|(&height, &value)| (height, value))
        .max_by(|a, b| a.1.total_cmp(&b.1))
}
