use crate::domain::{normalize_ticker, FieldViolation};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;

pub const TICKER_MAX_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Holding {
    pub ticker: String,
    pub shares: f64,
}

/// Validated analysis request. Only produced by [`AnalysisInput::validate`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    pub portfolio: Vec<Holding>,
    pub market_data: String,
    pub cash: f64,
}

/// Unvalidated input as it arrives at the server boundary.
///
/// Numbers are accepted either as JSON numbers or numeric strings (form fields
/// arrive as strings). Anything that is not a number is kept as NaN, and text
/// fields keep whatever JSON value was sent, so that validation can report
/// type errors alongside every other violation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInput {
    #[serde(default)]
    pub portfolio: Vec<HoldingInput>,
    #[serde(default)]
    pub market_data: Option<Value>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub cash: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HoldingInput {
    #[serde(default)]
    pub ticker: Option<Value>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub shares: Option<f64>,
}

impl AnalysisInput {
    pub fn new<'a>(
        holdings: impl IntoIterator<Item = (&'a str, f64)>,
        market_data: impl Into<String>,
        cash: f64,
    ) -> Self {
        Self {
            portfolio: holdings
                .into_iter()
                .map(|(ticker, shares)| HoldingInput {
                    ticker: Some(Value::String(ticker.to_string())),
                    shares: Some(shares),
                })
                .collect(),
            market_data: Some(Value::String(market_data.into())),
            cash: Some(cash),
        }
    }

    /// Decode an arbitrary JSON body. Shape errors (wrong container types) are
    /// reported as a single `body` violation; field-level problems are left for
    /// [`AnalysisInput::validate`].
    pub fn from_json_value(value: Value) -> Result<Self, Vec<FieldViolation>> {
        if !value.is_object() {
            return Err(vec![FieldViolation::new("body", "must be a JSON object")]);
        }
        serde_json::from_value(value).map_err(|e| vec![FieldViolation::new("body", e.to_string())])
    }

    /// Check every field constraint and collect all violations, not just the first.
    pub fn validate(self) -> Result<AnalysisRequest, Vec<FieldViolation>> {
        let mut violations = Vec::new();

        if self.portfolio.is_empty() {
            violations.push(FieldViolation::new(
                "portfolio",
                "must contain at least one holding",
            ));
        }

        let mut seen = BTreeSet::new();
        let mut portfolio = Vec::with_capacity(self.portfolio.len());
        for (idx, holding) in self.portfolio.into_iter().enumerate() {
            let ticker = validate_ticker(holding.ticker, &mut seen)
                .map_err(|msg| {
                    violations.push(FieldViolation::new(format!("portfolio[{idx}].ticker"), msg))
                })
                .ok();
            let shares = validate_shares(holding.shares)
                .map_err(|msg| {
                    violations.push(FieldViolation::new(format!("portfolio[{idx}].shares"), msg))
                })
                .ok();

            if let (Some(ticker), Some(shares)) = (ticker, shares) {
                portfolio.push(Holding { ticker, shares });
            }
        }

        let market_data = match self.market_data {
            Some(Value::String(s)) => Some(s),
            None | Some(Value::Null) => {
                violations.push(FieldViolation::new("marketData", "is required"));
                None
            }
            Some(_) => {
                violations.push(FieldViolation::new("marketData", "must be a string"));
                None
            }
        };

        let cash = match self.cash {
            None => {
                violations.push(FieldViolation::new("cash", "is required"));
                None
            }
            Some(c) if !c.is_finite() => {
                violations.push(FieldViolation::new("cash", "must be a finite number"));
                None
            }
            Some(c) if c < 0.0 => {
                violations.push(FieldViolation::new("cash", "cannot be negative"));
                None
            }
            Some(c) => Some(c),
        };

        match (market_data, cash) {
            (Some(market_data), Some(cash)) if violations.is_empty() => Ok(AnalysisRequest {
                portfolio,
                market_data,
                cash,
            }),
            _ => Err(violations),
        }
    }
}

fn validate_ticker(raw: Option<Value>, seen: &mut BTreeSet<String>) -> Result<String, String> {
    let raw = match raw {
        None | Some(Value::Null) => return Err("ticker is required".to_string()),
        Some(Value::String(s)) => s,
        Some(_) => return Err("ticker must be a string".to_string()),
    };
    let ticker = normalize_ticker(&raw);
    if ticker.is_empty() {
        return Err("ticker is required".to_string());
    }
    if ticker.chars().count() > TICKER_MAX_LEN {
        return Err(format!(
            "ticker is too long (max {TICKER_MAX_LEN} characters)"
        ));
    }
    if !seen.insert(ticker.clone()) {
        return Err(format!("duplicate ticker {ticker}"));
    }
    Ok(ticker)
}

fn validate_shares(shares: Option<f64>) -> Result<f64, String> {
    match shares {
        None => Err("is required".to_string()),
        Some(s) if !s.is_finite() => Err("must be a finite number".to_string()),
        Some(s) if s <= 0.0 => Err("must be positive".to_string()),
        Some(s) => Ok(s),
    }
}

fn lenient_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::Number(n)) => Some(n.as_f64().unwrap_or(f64::NAN)),
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().parse::<f64>().unwrap_or(f64::NAN)),
        Some(_) => Some(f64::NAN),
    })
}
