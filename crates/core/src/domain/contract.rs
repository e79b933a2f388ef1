use crate::domain::advice::{AdviceItem, Recommendation, RiskLevel};
use crate::domain::portfolio::Holding;
use crate::domain::{normalize_ticker, FieldViolation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Advice exactly as the model emitted it. Enum fields stay as strings so that
/// validation can name the offending value instead of failing at decode time.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmAdviceResponse {
    #[serde(default)]
    pub advice: Option<Vec<LlmAdviceItem>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmAdviceItem {
    #[serde(default)]
    pub ticker: String,
    #[serde(default)]
    pub recommendation: String,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub risk_level: String,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub percentage: Option<f64>,
}

impl LlmAdviceResponse {
    /// All-or-nothing: either every item is valid and every holding is covered
    /// exactly once, or the whole response is rejected with every violation found.
    pub fn validate_and_into_advice(
        self,
        portfolio: &[Holding],
    ) -> Result<Vec<AdviceItem>, Vec<FieldViolation>> {
        let Some(raw_items) = self.advice else {
            return Err(vec![FieldViolation::new("advice", "is missing")]);
        };
        if raw_items.is_empty() {
            return Err(vec![FieldViolation::new("advice", "must not be empty")]);
        }

        let expected: BTreeSet<&str> = portfolio.iter().map(|h| h.ticker.as_str()).collect();
        let mut seen = BTreeSet::<String>::new();
        let mut violations = Vec::new();
        let mut items = Vec::with_capacity(raw_items.len());

        for (idx, item) in raw_items.into_iter().enumerate() {
            let before = violations.len();
            let validated = item.validate_and_into_item(idx, &mut violations);

            if let Some(ticker) = validated.as_ref().map(|i| i.ticker.as_str()) {
                if !expected.contains(ticker) {
                    violations.push(FieldViolation::new(
                        format!("advice[{idx}].ticker"),
                        format!("{ticker} is not in the portfolio"),
                    ));
                } else if !seen.insert(ticker.to_string()) {
                    violations.push(FieldViolation::new(
                        format!("advice[{idx}].ticker"),
                        format!("duplicate advice for {ticker}"),
                    ));
                }
            }

            if let Some(item) = validated.filter(|_| violations.len() == before) {
                items.push(item);
            }
        }

        for holding in portfolio {
            if !seen.contains(&holding.ticker) {
                violations.push(FieldViolation::new(
                    "advice",
                    format!("missing entry for {}", holding.ticker),
                ));
            }
        }

        if violations.is_empty() {
            Ok(items)
        } else {
            Err(violations)
        }
    }
}

impl LlmAdviceItem {
    fn validate_and_into_item(
        self,
        idx: usize,
        violations: &mut Vec<FieldViolation>,
    ) -> Option<AdviceItem> {
        let field = |name: &str| format!("advice[{idx}].{name}");
        let before = violations.len();

        let ticker = normalize_ticker(&self.ticker);
        if ticker.is_empty() {
            violations.push(FieldViolation::new(field("ticker"), "must be non-empty"));
        }

        let recommendation = Recommendation::parse(&self.recommendation);
        if recommendation.is_none() {
            violations.push(FieldViolation::new(
                field("recommendation"),
                format!(
                    "must be one of buy, sell, hold, diversify (got {:?})",
                    self.recommendation
                ),
            ));
        }

        let risk_level = RiskLevel::parse(&self.risk_level);
        if risk_level.is_none() {
            violations.push(FieldViolation::new(
                field("riskLevel"),
                format!("must be one of low, medium, high (got {:?})", self.risk_level),
            ));
        }

        let reason = self.reason.trim().to_string();
        if reason.is_empty() {
            violations.push(FieldViolation::new(field("reason"), "must be non-empty"));
        }

        match self.percentage {
            None => violations.push(FieldViolation::new(field("percentage"), "is required")),
            Some(p) if !(0.0..=100.0).contains(&p) => violations.push(FieldViolation::new(
                field("percentage"),
                format!("must be between 0 and 100 (got {p})"),
            )),
            Some(_) => {}
        }

        match (self.amount, recommendation) {
            (Some(a), _) if !a.is_finite() || a < 0.0 => violations.push(FieldViolation::new(
                field("amount"),
                format!("must be a non-negative number (got {a})"),
            )),
            (None, Some(r)) if r.requires_amount() => violations.push(FieldViolation::new(
                field("amount"),
                format!("is required for {} advice", r.as_str()),
            )),
            _ => {}
        }

        if violations.len() != before {
            return None;
        }

        Some(AdviceItem {
            ticker,
            recommendation: recommendation?,
            reason,
            risk_level: risk_level?,
            amount: self.amount,
            percentage: self.percentage?,
        })
    }
}
