use serde_json::Value;

use crate::models::ErrorPayload;

/// Failures inside the aggregation core. These never cross the core
/// boundary as errors; `ProfileMerger::merge` turns them into an
/// [`ErrorPayload`].
#[derive(Debug, thiserror::Error)]
pub enum ProfileError {
    /// Grid service answered, but without `grid_params`, `model_data` or
    /// the solar context fields. Carries the raw payload.
    #[error("grid profile service returned a malformed payload")]
    UpstreamMalformed(Value),

    /// Network, timeout or decode failure on either upstream service.
    #[error("{0}")]
    Upstream(String),

    #[error("No features found in the response")]
    NoDataAvailable,

    #[error("point profile service returned a malformed payload: {0}")]
    PointMalformed(String),
}

impl From<ProfileError> for ErrorPayload {
    fn from(err: ProfileError) -> Self {
        match err {
            ProfileError::UpstreamMalformed(payload) => ErrorPayload { error: payload },
            other => ErrorPayload {
                error: Value::String(other.to_string()),
            },
        }
    }
}

/// Rejections raised by the tool layer before a query reaches the core.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("latitude {0} is outside the grid coverage (34 to 60)")]
    LatitudeOutOfRange(f64),

    #[error("longitude {0} is outside the grid coverage (-5 to 40)")]
    LongitudeOutOfRange(f64),

    #[error("at least one model must be selected")]
    NoModels,

    #[error("at least one measurement must be selected")]
    NoMeasurements,

    #[error("invalid timestamp '{0}': expected ISO 8601, e.g. 2025-02-01T10:45:00")]
    InvalidTimestamp(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_payload_is_wrapped_verbatim() {
        let raw = json!({"detail": "date out of range"});
        let payload: ErrorPayload = ProfileError::UpstreamMalformed(raw.clone()).into();
        assert_eq!(payload.error, raw);
    }

    #[test]
    fn other_failures_carry_their_message() {
        let payload: ErrorPayload = ProfileError::NoDataAvailable.into();
        assert_eq!(payload.error, json!("No features found in the response"));

        let payload: ErrorPayload = ProfileError::Upstream("operation timed out".into()).into();
        assert_eq!(payload.error, json!("operation timed out"));
    }
}
