use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A holding above this share of total portfolio value (cash included) must be rated high risk.
pub const CONCENTRATION_LIMIT_PERCENT: f64 = 30.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Recommendation {
    Buy,
    Sell,
    Hold,
    Diversify,
}

impl Recommendation {
    pub const ALL: [Recommendation; 4] = [
        Recommendation::Buy,
        Recommendation::Sell,
        Recommendation::Hold,
        Recommendation::Diversify,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Recommendation::Buy => "buy",
            Recommendation::Sell => "sell",
            Recommendation::Hold => "hold",
            Recommendation::Diversify => "diversify",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
    }

    /// Buy and sell advice must name a rupee amount to transact.
    pub fn requires_amount(self) -> bool {
        matches!(self, Recommendation::Buy | Recommendation::Sell)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 3] = [RiskLevel::Low, RiskLevel::Medium, RiskLevel::High];

    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(s))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdviceItem {
    pub ticker: String,
    pub recommendation: Recommendation,
    pub reason: String,
    pub risk_level: RiskLevel,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub advice: Vec<AdviceItem>,
    pub generated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub flags: Vec<PolicyFlag>,
}

/// Post-hoc finding about model output that passed schema validation but
/// breaks a policy the model was instructed to follow. Flags are reported,
/// never corrected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyFlag {
    #[serde(rename_all = "camelCase")]
    ConcentrationRisk {
        ticker: String,
        percentage: f64,
        risk_level: RiskLevel,
    },
    #[serde(rename_all = "camelCase")]
    PercentageDrift {
        ticker: String,
        reported: f64,
        expected: f64,
    },
}

impl PolicyFlag {
    pub fn ticker(&self) -> &str {
        match self {
            PolicyFlag::ConcentrationRisk { ticker, .. } => ticker,
            PolicyFlag::PercentageDrift { ticker, .. } => ticker,
        }
    }
}
