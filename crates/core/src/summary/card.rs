use crate::domain::advice::{AdviceItem, Recommendation, RiskLevel};
use crate::summary::format::format_rupees;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Negative,
    Neutral,
    Info,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Badge {
    pub label: &'static str,
    pub tone: Tone,
}

fn badge(label: &'static str, tone: Tone) -> Badge {
    Badge { label, tone }
}

/// Label for a raw recommendation string; unknown values render as hold.
pub fn display_for_recommendation(raw: &str) -> Badge {
    match Recommendation::parse(raw).unwrap_or(Recommendation::Hold) {
        Recommendation::Buy => badge("Buy", Tone::Positive),
        Recommendation::Sell => badge("Sell", Tone::Negative),
        Recommendation::Hold => badge("Hold", Tone::Neutral),
        Recommendation::Diversify => badge("Diversify", Tone::Info),
    }
}

/// Label for a raw risk string; unknown values render as medium.
pub fn display_for_risk(raw: &str) -> Badge {
    match RiskLevel::parse(raw).unwrap_or(RiskLevel::Medium) {
        RiskLevel::Low => badge("Low Risk", Tone::Positive),
        RiskLevel::Medium => badge("Medium Risk", Tone::Neutral),
        RiskLevel::High => badge("High Risk", Tone::Negative),
    }
}

/// One advice entry, ready to render.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceCard {
    pub ticker: String,
    pub recommendation: Badge,
    pub risk: Badge,
    pub reason: String,
    pub weight: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction: Option<String>,
}

impl From<&AdviceItem> for AdviceCard {
    fn from(item: &AdviceItem) -> Self {
        let transaction = match (item.recommendation, item.amount) {
            (Recommendation::Buy, Some(amount)) => {
                Some(format!("Invest: {}", format_rupees(amount)))
            }
            (Recommendation::Sell, Some(amount)) => {
                Some(format!("Sell: {}", format_rupees(amount)))
            }
            _ => None,
        };
        Self {
            ticker: item.ticker.clone(),
            recommendation: display_for_recommendation(item.recommendation.as_str()),
            risk: display_for_risk(item.risk_level.as_str()),
            reason: item.reason.clone(),
            weight: format!("{:.2}% of portfolio", item.percentage),
            transaction,
        }
    }
}
