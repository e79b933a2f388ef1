use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketSnapshot {
    pub generated_at: DateTime<Utc>,
    pub stocks: Vec<Quote>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub ticker: String,
    pub price: f64,
    pub change: f64,
    pub change_percent: f64,
    pub volume: String,
    pub market_cap: String,
}

impl MarketSnapshot {
    pub fn price_of(&self, ticker: &str) -> Option<f64> {
        self.stocks
            .iter()
            .find(|q| q.ticker.eq_ignore_ascii_case(ticker))
            .map(|q| q.price)
    }
}
