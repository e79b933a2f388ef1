//! One stateless request/response cycle: validate the request, check the
//! market payload, call the model once, validate what came back.

pub mod error;
pub mod policy;

use crate::config::Settings;
use crate::domain::advice::AnalysisResult;
use crate::domain::portfolio::AnalysisInput;
use crate::domain::FieldViolation;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::json::excerpt;
use crate::llm::prompt::PROMPT_VERSION;
use crate::llm::{GenerateInput, LlmClient};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};

pub use error::AnalysisError;

#[derive(Debug, Clone)]
pub struct AnalyzerOptions {
    /// Upper bound on the model call. `None` waits indefinitely.
    pub timeout: Option<Duration>,
    /// Run the post-hoc concentration and weight checks.
    pub policy_checks: bool,
}

impl Default for AnalyzerOptions {
    fn default() -> Self {
        Self {
            timeout: Some(Duration::from_secs(90)),
            policy_checks: true,
        }
    }
}

impl AnalyzerOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            timeout: Some(settings.analysis_timeout),
            policy_checks: settings.policy_checks,
        }
    }
}

#[derive(Clone)]
pub struct Analyzer {
    llm: Arc<dyn LlmClient>,
    options: AnalyzerOptions,
}

impl Analyzer {
    pub fn new(llm: Arc<dyn LlmClient>, options: AnalyzerOptions) -> Self {
        Self { llm, options }
    }

    pub async fn analyze(&self, input: AnalysisInput) -> Result<AnalysisResult, AnalysisError> {
        let request = input.validate().map_err(|violations| {
            tracing::info!(
                violations = violations.len(),
                error_kind = "invalid_request",
                "analysis request rejected"
            );
            AnalysisError::InvalidRequest(violations)
        })?;

        let market_json = serde_json::from_str::<serde_json::Value>(&request.market_data)
            .map_err(|e| {
                tracing::warn!(
                    error = %e,
                    error_kind = "invalid_market_data",
                    "market data is not valid JSON"
                );
                AnalysisError::InvalidMarketData(e.to_string())
            })?;

        let expected_weights = if self.options.policy_checks {
            policy::expected_weights(&request, &market_json)
        } else {
            None
        };

        let holdings = request.portfolio.len();
        let input = GenerateInput::from_request(request);
        let provider = self.llm.provider();
        tracing::info!(%provider, holdings, prompt_version = PROMPT_VERSION, "invoking model");

        let started = Instant::now();
        let call = self.llm.generate_advice(&input);
        let outcome = match self.options.timeout {
            Some(limit) => match tokio::time::timeout(limit, call).await {
                Ok(res) => res,
                Err(_) => Err(anyhow::anyhow!(
                    "model call timed out after {}s",
                    limit.as_secs_f64()
                )),
            },
            None => call.await,
        };
        let elapsed_ms = started.elapsed().as_millis() as u64;

        let output = outcome.map_err(|err| {
            let diag = err.downcast_ref::<LlmDiagnosticsError>();
            let body = diag
                .and_then(|d| d.raw_output.as_deref())
                .map(|s| excerpt(s, 2000))
                .unwrap_or_default();
            tracing::error!(
                %provider,
                elapsed_ms,
                error_kind = "model_invocation",
                stage = diag.map(|d| d.stage),
                client_error = diag.map(LlmDiagnosticsError::is_client_error),
                provider_error = diag.and_then(LlmDiagnosticsError::provider_error_type),
                raw_output = %body,
                error = %format!("{err:#}"),
                "model invocation failed"
            );
            AnalysisError::ModelInvocationFailure(err)
        })?;

        let raw_output = output.raw_text();
        let invalid_response = |violations: Vec<FieldViolation>| {
            tracing::error!(
                %provider,
                elapsed_ms,
                error_kind = "invalid_response",
                violations = %violations
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join("; "),
                raw_output = %excerpt(&raw_output, 2000),
                "model output failed validation"
            );
            AnalysisError::InvalidResponse {
                violations,
                raw_output: Some(raw_output.clone()),
            }
        };

        let response = output
            .into_advice_response()
            .map_err(|e| {
                invalid_response(vec![FieldViolation::new("output", format!("{e:#}"))])
            })?;
        let advice = response
            .validate_and_into_advice(&input.request.portfolio)
            .map_err(invalid_response)?;

        let flags = if self.options.policy_checks {
            policy::check(&advice, expected_weights.as_ref())
        } else {
            Vec::new()
        };
        for flag in &flags {
            tracing::warn!(ticker = flag.ticker(), ?flag, "model output breaks advice policy");
        }

        let result = AnalysisResult {
            advice,
            generated_at: Utc::now(),
            flags,
        };
        tracing::info!(
            %provider,
            elapsed_ms,
            advice = result.advice.len(),
            flags = result.flags.len(),
            "analysis complete"
        );
        Ok(result)
    }
}
