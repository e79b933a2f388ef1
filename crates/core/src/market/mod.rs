pub mod mock;

#[async_trait::async_trait]
pub trait MarketDataProvider: Send + Sync {
    fn provider_name(&self) -> &'static str;

    /// A fresh quote snapshot serialized as JSON. Every call regenerates it.
    async fn fetch_snapshot_json(&self) -> anyhow::Result<String>;
}
