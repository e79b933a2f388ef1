use crate::domain::portfolio::AnalysisRequest;
use serde_json::Value;
use std::fmt;

pub mod anthropic;
pub mod error;
pub mod json;
pub mod prompt;

/// Everything the model boundary receives for one analysis.
#[derive(Debug, Clone)]
pub struct GenerateInput {
    pub request: AnalysisRequest,
    pub instruction: String,
    pub output_schema: Value,
}

impl GenerateInput {
    pub fn from_request(request: AnalysisRequest) -> Self {
        let instruction = prompt::render_instruction(&request);
        Self {
            request,
            instruction,
            output_schema: prompt::output_schema(),
        }
    }
}

/// Raw model output, not yet decoded or validated.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    Structured(Value),
    Text(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Anthropic,
    Custom(&'static str),
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Provider::Anthropic => f.write_str("anthropic"),
            Provider::Custom(name) => f.write_str(name),
        }
    }
}

#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    fn provider(&self) -> Provider;

    /// One model call. Implementations must not retry.
    async fn generate_advice(&self, input: &GenerateInput) -> anyhow::Result<ModelOutput>;
}
