use crate::domain::advice::{AdviceItem, PolicyFlag, RiskLevel, CONCENTRATION_LIMIT_PERCENT};
use crate::domain::market::MarketSnapshot;
use crate::domain::portfolio::AnalysisRequest;
use serde_json::Value;
use std::collections::BTreeMap;

/// Largest tolerated gap, in percentage points, between the model's weight
/// and the weight computed from the quoted prices.
pub const PERCENTAGE_DRIFT_TOLERANCE: f64 = 5.0;

/// Weight of each holding in percent of total value (holdings plus cash),
/// computed from the market payload. `None` when the payload is not a quote
/// snapshot or does not price every holding.
pub fn expected_weights(
    request: &AnalysisRequest,
    market_data: &Value,
) -> Option<BTreeMap<String, f64>> {
    let snapshot = parse_snapshot(market_data)?;

    let mut values = BTreeMap::new();
    for holding in &request.portfolio {
        let price = snapshot.price_of(&holding.ticker)?;
        values.insert(holding.ticker.clone(), holding.shares * price);
    }

    let total: f64 = values.values().sum::<f64>() + request.cash;
    if !total.is_finite() || total <= 0.0 {
        return None;
    }

    Some(
        values
            .into_iter()
            .map(|(ticker, value)| (ticker, value * 100.0 / total))
            .collect(),
    )
}

/// Re-check rules the model was told to follow. Violations are reported only.
pub fn check(advice: &[AdviceItem], expected: Option<&BTreeMap<String, f64>>) -> Vec<PolicyFlag> {
    let mut flags = Vec::new();
    for item in advice {
        let computed = expected.and_then(|weights| weights.get(&item.ticker).copied());

        if let Some(computed) = computed {
            if (item.percentage - computed).abs() > PERCENTAGE_DRIFT_TOLERANCE {
                flags.push(PolicyFlag::PercentageDrift {
                    ticker: item.ticker.clone(),
                    reported: item.percentage,
                    expected: round2(computed),
                });
            }
        }

        let weight = computed.map_or(item.percentage, |c| c.max(item.percentage));
        if weight > CONCENTRATION_LIMIT_PERCENT && item.risk_level != RiskLevel::High {
            flags.push(PolicyFlag::ConcentrationRisk {
                ticker: item.ticker.clone(),
                percentage: round2(weight),
                risk_level: item.risk_level,
            });
        }
    }
    flags
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

fn parse_snapshot(value: &Value) -> Option<MarketSnapshot> {
    match serde_json::from_value::<MarketSnapshot>(value.clone()) {
        Ok(snapshot) => Some(snapshot),
        Err(err) => {
            tracing::debug!(
                error = %err,
                "market data is not a quote snapshot; skipping weight cross-check"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::advice::Recommendation;
    use crate::domain::portfolio::Holding;
    use serde_json::json;

    fn item(ticker: &str, percentage: f64, risk_level: RiskLevel) -> AdviceItem {
        AdviceItem {
            ticker: ticker.to_string(),
            recommendation: Recommendation::Hold,
            reason: "r".to_string(),
            risk_level,
            amount: None,
            percentage,
        }
    }

    fn request(holdings: &[(&str, f64)], cash: f64) -> AnalysisRequest {
        AnalysisRequest {
            portfolio: holdings
                .iter()
                .map(|(t, s)| Holding {
                    ticker: t.to_string(),
                    shares: *s,
                })
                .collect(),
            market_data: String::new(),
            cash,
        }
    }

    fn market(quotes: &[(&str, f64)]) -> Value {
        json!({
            "generatedAt": "2026-01-28T09:15:00Z",
            "stocks": quotes.iter().map(|(t, p)| json!({
                "ticker": t, "price": p, "change": 0.0, "change_percent": 0.0,
                "volume": "1.0M", "market_cap": "1.0T"
            })).collect::<Vec<_>>()
        })
    }

    #[test]
    fn flags_concentrated_holding_not_rated_high() {
        let advice = vec![
            item("RELIANCE", 40.0, RiskLevel::Low),
            item("TCS", 35.0, RiskLevel::High),
            item("INFY", 25.0, RiskLevel::Low),
        ];
        let flags = check(&advice, None);
        assert_eq!(
            flags,
            vec![PolicyFlag::ConcentrationRisk {
                ticker: "RELIANCE".to_string(),
                percentage: 40.0,
                risk_level: RiskLevel::Low,
            }]
        );
    }

    #[test]
    fn exactly_thirty_percent_is_not_concentrated() {
        assert!(check(&[item("TCS", 30.0, RiskLevel::Medium)], None).is_empty());
    }

    #[test]
    fn computes_weights_including_cash() {
        // RELIANCE 10 x 4000 = 40000, TCS 10 x 1000 = 10000, cash 50000 -> 40% / 10%.
        let req = request(&[("RELIANCE", 10.0), ("TCS", 10.0)], 50_000.0);
        let weights =
            expected_weights(&req, &market(&[("RELIANCE", 4000.0), ("TCS", 1000.0)])).unwrap();
        assert_eq!(weights["RELIANCE"], 40.0);
        assert_eq!(weights["TCS"], 10.0);
    }

    #[test]
    fn underreported_weight_is_flagged_twice() {
        let req = request(&[("RELIANCE", 10.0), ("TCS", 10.0)], 50_000.0);
        let weights =
            expected_weights(&req, &market(&[("RELIANCE", 4000.0), ("TCS", 1000.0)])).unwrap();

        let advice = vec![
            item("RELIANCE", 20.0, RiskLevel::Medium),
            item("TCS", 11.0, RiskLevel::Low),
        ];
        let flags = check(&advice, Some(&weights));
        assert_eq!(
            flags,
            vec![
                PolicyFlag::PercentageDrift {
                    ticker: "RELIANCE".to_string(),
                    reported: 20.0,
                    expected: 40.0,
                },
                PolicyFlag::ConcentrationRisk {
                    ticker: "RELIANCE".to_string(),
                    percentage: 40.0,
                    risk_level: RiskLevel::Medium,
                },
            ]
        );
    }

    #[test]
    fn unpriced_or_foreign_payloads_skip_cross_check() {
        let req = request(&[("RELIANCE", 10.0), ("ZOMATO", 10.0)], 0.0);
        assert!(expected_weights(&req, &market(&[("RELIANCE", 4000.0)])).is_none());
        assert!(expected_weights(&req, &json!({"quotes": []})).is_none());

        let zero = request(&[("TCS", 1.0)], 0.0);
        assert!(expected_weights(&zero, &market(&[("TCS", 0.0)])).is_none());
    }
}
