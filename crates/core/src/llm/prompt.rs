//! Instruction template sent to the model.
//!
//! The template text is versioned: any change to the guidance given to the
//! model must bump [`PROMPT_VERSION`] so results can be traced back to it.

use crate::domain::advice::CONCENTRATION_LIMIT_PERCENT;
use crate::domain::portfolio::AnalysisRequest;
use serde_json::{json, Value};

pub const PROMPT_VERSION: &str = "portfolio-advice/v1";

pub const INSTRUCTION_TEMPLATE: &str = "\
You are a friendly and encouraging financial advisor for beginners. You specialize in the Indian stock market. Your goal is to provide clear, simple, and actionable advice.

Analyze the user's portfolio and provide specific buy/sell/hold/diversify recommendations for each stock.
Explain your reasoning for each recommendation in simple, easy-to-understand language. Avoid jargon.

For EACH stock, you MUST perform the following:
1.  Calculate the percentage that the stock represents of the total portfolio value (including cash). This is a required field.
2.  Assess its risk as 'low', 'medium', or 'high'. If a single stock makes up a large portion of the portfolio (over {{concentration_limit}}%), you MUST classify it as 'high' risk due to concentration and recommend selling a portion to diversify.
3.  For 'buy' or 'sell' recommendations, specify a clear amount in rupees to transact.

Portfolio:
{{portfolio}}

Available Cash: ₹{{cash}}

Market Data:
{{market_data}}

Provide your advice in JSON format. Be encouraging and focus on long-term growth and learning. Ensure every stock in the input portfolio has a corresponding entry in the output advice.";

pub fn render_instruction(request: &AnalysisRequest) -> String {
    let portfolio = request
        .portfolio
        .iter()
        .map(|h| format!("  - {}: {} shares", h.ticker, h.shares))
        .collect::<Vec<_>>()
        .join("\n");
    let cash = request.cash.to_string();
    let limit = CONCENTRATION_LIMIT_PERCENT.to_string();

    render(
        INSTRUCTION_TEMPLATE,
        &[
            ("portfolio", portfolio.as_str()),
            ("cash", cash.as_str()),
            ("market_data", request.market_data.as_str()),
            ("concentration_limit", limit.as_str()),
        ],
    )
}

/// JSON schema the model output must satisfy.
pub fn output_schema() -> Value {
    json!({
        "type": "object",
        "additionalProperties": false,
        "required": ["advice"],
        "properties": {
            "advice": {
                "type": "array",
                "minItems": 1,
                "items": {
                    "type": "object",
                    "additionalProperties": false,
                    "required": ["ticker", "recommendation", "reason", "riskLevel", "percentage"],
                    "properties": {
                        "ticker": {"type": "string", "description": "The ticker symbol of the stock."},
                        "recommendation": {
                            "type": "string",
                            "enum": ["buy", "sell", "hold", "diversify"],
                            "description": "Recommended action for the stock."
                        },
                        "reason": {"type": "string", "description": "Reasoning behind the recommendation."},
                        "riskLevel": {
                            "type": "string",
                            "enum": ["low", "medium", "high"],
                            "description": "The estimated risk level of the stock."
                        },
                        "amount": {"type": "number", "description": "The amount in rupees to buy or sell."},
                        "percentage": {
                            "type": "number",
                            "minimum": 0,
                            "maximum": 100,
                            "description": "The percentage of the total portfolio value (including cash) this stock represents."
                        }
                    }
                }
            }
        }
    })
}

// Single pass over the template so substituted values are never re-scanned
// for placeholders.
fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let extra: usize = vars.iter().map(|(_, v)| v.len()).sum();
    let mut out = String::with_capacity(template.len() + extra);
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            return out;
        };
        let key = after[..end].trim();
        match vars.iter().find(|(k, _)| *k == key) {
            Some((_, value)) => out.push_str(value),
            None => out.push_str(&rest[start..start + 2 + end + 2]),
        }
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    out
}
