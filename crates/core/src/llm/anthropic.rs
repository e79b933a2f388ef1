use crate::config::Settings;
use crate::llm::error::LlmDiagnosticsError;
use crate::llm::{GenerateInput, LlmClient, ModelOutput, Provider};
use anyhow::Context;
use reqwest::header::{HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const ANTHROPIC_VERSION: &str = "2023-06-01";
const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-sonnet-latest";
const DEFAULT_MAX_TOKENS: u32 = 4096;
const DEFAULT_TIMEOUT_SECS: u64 = 60;

const TOOL_NAME_EMIT_ADVICE: &str = "emit_portfolio_advice";

#[derive(Debug, Clone)]
pub struct AnthropicClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
}

impl AnthropicClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_anthropic_api_key()?.to_string();
        let base_url =
            std::env::var("ANTHROPIC_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = std::env::var("ANTHROPIC_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let max_tokens = std::env::var("ANTHROPIC_MAX_TOKENS")
            .ok()
            .and_then(|s| s.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_TOKENS);

        let timeout_secs = std::env::var("ANTHROPIC_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
            max_tokens,
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn create_message(
        &self,
        req: &CreateMessageRequest,
    ) -> anyhow::Result<CreateMessageResponse> {
        let mut headers = HeaderMap::new();
        headers.insert("x-api-key", HeaderValue::from_str(&self.api_key)?);
        headers.insert(
            "anthropic-version",
            HeaderValue::from_static(ANTHROPIC_VERSION),
        );

        let url = format!("{}/v1/messages", self.base_url.trim_end_matches('/'));
        let res = self
            .http
            .post(url)
            .headers(headers)
            .json(req)
            .send()
            .await
            .context("Anthropic request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read Anthropic response body")?;
        if !status.is_success() {
            return Err(
                LlmDiagnosticsError::http_status(Provider::Anthropic, status.as_u16(), text).into(),
            );
        }

        serde_json::from_str::<CreateMessageResponse>(&text)
            .with_context(|| format!("failed to decode Anthropic response: {text}"))
    }

    fn build_request(&self, input: &GenerateInput) -> CreateMessageRequest {
        CreateMessageRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens,
            system: Some(Self::system_prompt()),
            messages: vec![Message {
                role: "user",
                content: input.instruction.clone(),
            }],
            tools: Some(vec![Tool {
                name: TOOL_NAME_EMIT_ADVICE,
                description: "Emit the portfolio advice as structured JSON, one entry per input stock",
                input_schema: input.output_schema.clone(),
            }]),
            tool_choice: Some(ToolChoice::Tool {
                name: TOOL_NAME_EMIT_ADVICE,
            }),
        }
    }

    fn system_prompt() -> String {
        [
            "You produce portfolio advice for Indian equities.",
            "Always answer by calling the provided tool. Do not include any extra keys.",
            "Use only the tickers from the user's portfolio.",
        ]
        .join("\n")
    }

    fn response_text(res: &CreateMessageResponse) -> String {
        let mut out = String::new();
        for block in &res.content {
            if let ContentBlock::Text { text } = block {
                if !out.is_empty() {
                    out.push('\n');
                }
                out.push_str(text);
            }
        }
        out
    }

    fn response_tool_input(res: &CreateMessageResponse) -> Option<Value> {
        res.content.iter().find_map(|block| match block {
            ContentBlock::ToolUse { name, input, .. } if name == TOOL_NAME_EMIT_ADVICE => {
                Some(input.clone())
            }
            _ => None,
        })
    }

    fn into_model_output(res: &CreateMessageResponse) -> ModelOutput {
        match Self::response_tool_input(res) {
            Some(input) => ModelOutput::Structured(input),
            // Fallback to text (should be rare with a forced tool choice).
            None => ModelOutput::Text(Self::response_text(res)),
        }
    }
}

#[async_trait::async_trait]
impl LlmClient for AnthropicClient {
    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    async fn generate_advice(&self, input: &GenerateInput) -> anyhow::Result<ModelOutput> {
        let req = self.build_request(input);
        let res = self.create_message(&req).await?;

        if matches!(res.stop_reason.as_deref(), Some("max_tokens")) {
            tracing::warn!(
                model = %self.model,
                max_tokens = self.max_tokens,
                holdings = input.request.portfolio.len(),
                "Anthropic stop_reason=max_tokens; output is likely truncated"
            );
        }

        Ok(Self::into_model_output(&res))
    }
}

#[derive(Debug, Clone, Serialize)]
struct CreateMessageRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<Message>,

    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<Tool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ToolChoice>,
}

#[derive(Debug, Clone, Serialize)]
struct Message {
    role: &'static str,
    content: String,
}

#[derive(Debug, Clone, Deserialize)]
struct CreateMessageResponse {
    content: Vec<ContentBlock>,

    #[serde(default)]
    stop_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
struct Tool {
    name: &'static str,
    description: &'static str,
    input_schema: Value,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
enum ToolChoice {
    #[serde(rename = "tool")]
    Tool { name: &'static str },
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },

    #[serde(rename = "tool_use")]
    ToolUse {
        #[serde(default)]
        name: String,
        #[serde(default)]
        input: Value,
    },

    #[serde(other)]
    Unknown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::portfolio::AnalysisInput;
    use serde_json::json;

    fn client() -> AnthropicClient {
        AnthropicClient {
            http: reqwest::Client::new(),
            api_key: "test-key".to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
        }
    }

    fn input() -> GenerateInput {
        let request = AnalysisInput::new([("TCS", 20.0)], "{}", 50_000.0)
            .validate()
            .unwrap();
        GenerateInput::from_request(request)
    }

    #[test]
    fn request_forces_tool_with_output_schema() {
        let req = client().build_request(&input());
        let v = serde_json::to_value(&req).unwrap();
        assert_eq!(v["tool_choice"], json!({"type": "tool", "name": TOOL_NAME_EMIT_ADVICE}));
        assert_eq!(v["tools"][0]["input_schema"]["required"], json!(["advice"]));
        assert_eq!(v["messages"][0]["role"], "user");
        assert!(v["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("- TCS: 20 shares"));
    }

    #[test]
    fn prefers_tool_use_input() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "thinking", "thinking": "hmm", "signature": "x"},
                {"type": "text", "text": "Here you go"},
                {"type": "tool_use", "id": "toolu_1", "name": TOOL_NAME_EMIT_ADVICE,
                 "input": {"advice": []}}
            ],
            "stop_reason": "tool_use"
        }))
        .unwrap();

        assert_eq!(
            AnthropicClient::into_model_output(&res),
            ModelOutput::Structured(json!({"advice": []}))
        );
    }

    #[test]
    fn falls_back_to_text_blocks() {
        let res: CreateMessageResponse = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "{\"advice\":"},
                {"type": "tool_use", "id": "toolu_2", "name": "other_tool", "input": {}},
                {"type": "text", "text": "[]}"}
            ]
        }))
        .unwrap();

        assert_eq!(
            AnthropicClient::into_model_output(&res),
            ModelOutput::Text("{\"advice\":\n[]}".to_string())
        );
    }
}
