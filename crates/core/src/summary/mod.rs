//! Read-only views over a finished analysis.

pub mod card;
pub mod format;

use crate::domain::advice::{AdviceItem, Recommendation};
use serde::Serialize;

pub use card::{display_for_recommendation, display_for_risk, AdviceCard, Badge, Tone};
pub use format::format_rupees;

/// Sum of amounts on buy and diversify advice. Missing amounts count as zero.
pub fn total_to_invest(advice: &[AdviceItem]) -> f64 {
    sum_amounts(advice, |r| {
        matches!(r, Recommendation::Buy | Recommendation::Diversify)
    })
}

/// Sum of amounts on sell advice. Missing amounts count as zero.
pub fn total_to_divest(advice: &[AdviceItem]) -> f64 {
    sum_amounts(advice, |r| r == Recommendation::Sell)
}

fn sum_amounts(advice: &[AdviceItem], include: impl Fn(Recommendation) -> bool) -> f64 {
    advice
        .iter()
        .filter(|item| include(item.recommendation))
        .filter_map(|item| item.amount)
        .sum()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RebalanceSummary {
    pub total_to_invest: f64,
    pub total_to_divest: f64,
    pub invest_label: String,
    pub divest_label: String,
}

impl RebalanceSummary {
    pub fn from_advice(advice: &[AdviceItem]) -> Self {
        let total_to_invest = total_to_invest(advice);
        let total_to_divest = total_to_divest(advice);
        Self {
            total_to_invest,
            total_to_divest,
            invest_label: format_rupees(total_to_invest),
            divest_label: format_rupees(total_to_divest),
        }
    }
}
