use crate::domain::FieldViolation;
use thiserror::Error;

pub const USER_FACING_FAILURE: &str =
    "An error occurred while analyzing your portfolio. Please try again.";

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid analysis request: {}", join(.0))]
    InvalidRequest(Vec<FieldViolation>),

    #[error("invalid market data: {0}")]
    InvalidMarketData(String),

    #[error("model invocation failed: {0:#}")]
    ModelInvocationFailure(anyhow::Error),

    #[error("analysis failed to generate a valid result: {}", join(.violations))]
    InvalidResponse {
        violations: Vec<FieldViolation>,
        raw_output: Option<String>,
    },
}

impl AnalysisError {
    /// Stable identifier for logs and API payloads.
    pub fn kind(&self) -> &'static str {
        match self {
            AnalysisError::InvalidRequest(_) => "invalid_request",
            AnalysisError::InvalidMarketData(_) => "invalid_market_data",
            AnalysisError::ModelInvocationFailure(_) => "model_invocation",
            AnalysisError::InvalidResponse { .. } => "invalid_response",
        }
    }

    /// Every kind surfaces to the user as the same notification.
    pub fn user_message(&self) -> &'static str {
        USER_FACING_FAILURE
    }

    /// Field violations attached to the error, if any.
    pub fn violations(&self) -> &[FieldViolation] {
        match self {
            AnalysisError::InvalidRequest(v) => v,
            AnalysisError::InvalidResponse { violations, .. } => violations,
            _ => &[],
        }
    }

    /// True when the model was called (or was about to be) and the failure is on
    /// the model side rather than in the caller's input.
    pub fn is_model_side(&self) -> bool {
        matches!(
            self,
            AnalysisError::ModelInvocationFailure(_) | AnalysisError::InvalidResponse { .. }
        )
    }
}

fn join(violations: &[FieldViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
