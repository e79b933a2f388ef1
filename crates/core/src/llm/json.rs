use crate::domain::contract::LlmAdviceResponse;
use crate::llm::ModelOutput;
use anyhow::Context;

pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // Strip a Markdown fence (```json ... ``` or ``` ... ```).
        let mut inner = trimmed;
        if let Some((_, body)) = inner.split_once('\n') {
            inner = body;
        }
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    (end > start).then(|| trimmed[start..=end].trim().to_string())
}

pub fn parse_advice_response(text: &str) -> anyhow::Result<LlmAdviceResponse> {
    let json_str = extract_json(text).unwrap_or_else(|| text.trim().to_string());
    serde_json::from_str::<LlmAdviceResponse>(&json_str).with_context(|| {
        format!(
            "model output is not valid JSON for the advice schema: {}",
            excerpt(&json_str, 500)
        )
    })
}

impl ModelOutput {
    pub fn into_advice_response(self) -> anyhow::Result<LlmAdviceResponse> {
        match self {
            ModelOutput::Structured(value) => serde_json::from_value(value)
                .context("structured model output does not match the advice schema"),
            ModelOutput::Text(text) => parse_advice_response(&text),
        }
    }

    pub fn raw_text(&self) -> String {
        match self {
            ModelOutput::Structured(value) => value.to_string(),
            ModelOutput::Text(text) => text.clone(),
        }
    }
}

/// At most `max` characters of `s`, for log lines.
pub fn excerpt(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => format!("{}…", &s[..idx]),
        None => s.to_string(),
    }
}
