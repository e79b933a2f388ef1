use crate::domain::market::{MarketSnapshot, Quote};
use crate::market::MarketDataProvider;
use anyhow::Context;
use chrono::{DateTime, Utc};
use rand::Rng;

// Prices move by at most this fraction either way on each snapshot.
const MAX_FLUCTUATION: f64 = 0.05;

pub const MOCK_STOCKS: [(&str, f64); 10] = [
    ("TCS", 3850.50),
    ("INFY", 1650.75),
    ("RELIANCE", 2900.00),
    ("HDFCBANK", 1500.25),
    ("ICICIBANK", 1100.80),
    ("BHARTIARTL", 1400.10),
    ("SBIN", 830.55),
    ("WIPRO", 480.90),
    ("ITC", 430.20),
    ("LT", 3600.00),
];

/// Random-walk quotes around fixed base prices. Nothing is cached between calls.
#[derive(Debug, Clone, Default)]
pub struct MockMarketData;

impl MockMarketData {
    pub fn new() -> Self {
        Self
    }

    /// Build a snapshot drawing uniform values in `[0, 1)` from `draw`.
    pub fn generate(
        &self,
        generated_at: DateTime<Utc>,
        mut draw: impl FnMut() -> f64,
    ) -> MarketSnapshot {
        let mut stocks = Vec::with_capacity(MOCK_STOCKS.len());
        for (ticker, base_price) in MOCK_STOCKS {
            let fluctuation = (draw() - 0.5) * 2.0 * MAX_FLUCTUATION;
            let current_price = base_price * (1.0 + fluctuation);
            let change = current_price - base_price;
            let change_percent = change / base_price * 100.0;

            stocks.push(Quote {
                ticker: ticker.to_string(),
                price: round2(current_price),
                change: round2(change),
                change_percent: round2(change_percent),
                volume: format!("{:.1}M", draw() * 10.0),
                market_cap: format!("{:.1}T", base_price / 100.0 * (draw() * 5.0 + 1.0)),
            });
        }

        MarketSnapshot {
            generated_at,
            stocks,
        }
    }
}

#[async_trait::async_trait]
impl MarketDataProvider for MockMarketData {
    fn provider_name(&self) -> &'static str {
        "mock_random_walk"
    }

    async fn fetch_snapshot_json(&self) -> anyhow::Result<String> {
        let snapshot = {
            let mut rng = rand::thread_rng();
            self.generate(Utc::now(), || rng.gen::<f64>())
        };
        tracing::debug!(
            provider = self.provider_name(),
            stocks = snapshot.stocks.len(),
            "generated market snapshot"
        );
        serde_json::to_string_pretty(&snapshot).context("failed to serialize market snapshot")
    }
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
