use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

/// Failure at the model boundary that keeps whatever the provider sent back,
/// so the orchestrator can log it when classifying the failure.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: &'static str,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    pub fn http_status(provider: Provider, status: u16, body: String) -> Self {
        let raw_response_json = serde_json::from_str::<Value>(&body).ok();
        Self {
            provider,
            stage: "http",
            detail: format!("status={status}"),
            raw_output: Some(body),
            raw_response_json,
        }
    }

    /// The provider's own error classification, e.g. `rate_limit_error`.
    pub fn provider_error_type(&self) -> Option<&str> {
        self.raw_response_json
            .as_ref()?
            .pointer("/error/type")?
            .as_str()
    }

    /// Provider-side refusals that will not succeed on an identical retry.
    pub fn is_client_error(&self) -> bool {
        self.stage == "http" && self.detail.starts_with("status=4")
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "LLM error (provider={}, stage={}): {}",
            self.provider, self.stage, self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}
