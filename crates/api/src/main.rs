use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use stocksage_core::analysis::{AnalysisError, Analyzer, AnalyzerOptions};
use stocksage_core::domain::advice::AnalysisResult;
use stocksage_core::domain::portfolio::AnalysisInput;
use stocksage_core::domain::FieldViolation;
use stocksage_core::llm::anthropic::AnthropicClient;
use stocksage_core::market::mock::MockMarketData;
use stocksage_core::market::MarketDataProvider;
use stocksage_core::session::{UsageStats, UsageTracker};
use stocksage_core::summary::{AdviceCard, RebalanceSummary};

const SESSION_HEADER: &str = "x-session-id";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = stocksage_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let analyzer = match AnthropicClient::from_settings(&settings) {
        Ok(client) => {
            tracing::info!(model = client.model(), "anthropic client ready");
            Some(Arc::new(Analyzer::new(
                Arc::new(client),
                AnalyzerOptions::from_settings(&settings),
            )))
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(
                error = %e,
                "model client unavailable; starting API in degraded mode"
            );
            None
        }
    };

    let state = AppState {
        analyzer,
        market: Arc::new(MockMarketData::new()),
        usage: Arc::new(Mutex::new(UsageTracker::new(settings.usage_max_sessions))),
    };

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn app(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/market-data", get(get_market_data))
        .route("/analyze", post(post_analyze))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    analyzer: Option<Arc<Analyzer>>,
    market: Arc<dyn MarketDataProvider>,
    usage: Arc<Mutex<UsageTracker>>,
}

impl AppState {
    fn record_usage(&self, session_id: &str) -> UsageStats {
        let mut usage = match self.usage.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        usage.record(session_id, chrono::Utc::now())
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MarketDataResponse {
    market_data: String,
}

async fn get_market_data(
    State(state): State<AppState>,
) -> Result<Json<MarketDataResponse>, StatusCode> {
    let market_data = state.market.fetch_snapshot_json().await.map_err(|e| {
        sentry_anyhow::capture_anyhow(&e);
        tracing::error!(
            provider = state.market.provider_name(),
            error = %e,
            "market data generation failed"
        );
        StatusCode::INTERNAL_SERVER_ERROR
    })?;
    Ok(Json(MarketDataResponse { market_data }))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AnalyzeResponse {
    #[serde(flatten)]
    result: AnalysisResult,
    cards: Vec<AdviceCard>,
    summary: RebalanceSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    usage: Option<UsageStats>,
}

#[derive(Debug, Serialize)]
struct ApiError {
    error: &'static str,
    message: &'static str,
    kind: &'static str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<String>,
}

impl ApiError {
    fn new(kind: &'static str, violations: &[FieldViolation]) -> Self {
        Self {
            error: "Analysis Failed",
            message: stocksage_core::analysis::error::USER_FACING_FAILURE,
            kind,
            violations: violations.iter().map(ToString::to_string).collect(),
        }
    }
}

fn error_response(status: StatusCode, body: ApiError) -> Response {
    (status, Json(body)).into_response()
}

fn analysis_error_response(err: &AnalysisError) -> Response {
    let status = match err {
        AnalysisError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
        AnalysisError::InvalidMarketData(_) => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::ModelInvocationFailure(_) | AnalysisError::InvalidResponse { .. } => {
            StatusCode::BAD_GATEWAY
        }
    };
    error_response(status, ApiError::new(err.kind(), err.violations()))
}

async fn post_analyze(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<Value>, JsonRejection>,
) -> Response {
    let analysis_id = Uuid::new_v4();
    let Some(analyzer) = state.analyzer.clone() else {
        return error_response(
            StatusCode::SERVICE_UNAVAILABLE,
            ApiError::new("unavailable", &[]),
        );
    };

    let body = match body {
        Ok(Json(body)) => body,
        Err(rejection) => {
            tracing::info!(%analysis_id, error = %rejection, "unreadable analysis request body");
            let violation = FieldViolation::new("body", rejection.body_text());
            return error_response(
                StatusCode::BAD_REQUEST,
                ApiError::new("invalid_request", &[violation]),
            );
        }
    };

    let input = match AnalysisInput::from_json_value(body) {
        Ok(input) => input,
        Err(violations) => {
            return analysis_error_response(&AnalysisError::InvalidRequest(violations));
        }
    };

    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty());

    match analyzer.analyze(input).await {
        Ok(result) => {
            let usage = session_id.map(|id| state.record_usage(id));
            tracing::info!(
                %analysis_id,
                advice = result.advice.len(),
                flags = result.flags.len(),
                "analysis served"
            );
            let summary = RebalanceSummary::from_advice(&result.advice);
            let cards = result.advice.iter().map(AdviceCard::from).collect();
            Json(AnalyzeResponse {
                result,
                cards,
                summary,
                usage,
            })
            .into_response()
        }
        Err(err) => {
            if err.is_model_side() {
                let report = anyhow::anyhow!("analysis {analysis_id} failed: {err}");
                sentry_anyhow::capture_anyhow(&report);
            }
            tracing::warn!(%analysis_id, error_kind = err.kind(), error = %err, "analysis failed");
            analysis_error_response(&err)
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &stocksage_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use stocksage_core::llm::{GenerateInput, LlmClient, ModelOutput, Provider};
    use tower::ServiceExt;

    struct FixedLlm {
        output: Value,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LlmClient for FixedLlm {
        fn provider(&self) -> Provider {
            Provider::Custom("fixed")
        }

        async fn generate_advice(&self, _input: &GenerateInput) -> anyhow::Result<ModelOutput> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(ModelOutput::Structured(self.output.clone()))
        }
    }

    fn state_with(output: Value) -> (AppState, Arc<FixedLlm>) {
        let llm = Arc::new(FixedLlm {
            output,
            calls: AtomicUsize::new(0),
        });
        let state = AppState {
            analyzer: Some(Arc::new(Analyzer::new(
                llm.clone(),
                AnalyzerOptions::default(),
            ))),
            market: Arc::new(MockMarketData::new()),
            usage: Arc::new(Mutex::new(UsageTracker::default())),
        };
        (state, llm)
    }

    fn tcs_advice() -> Value {
        json!({
            "advice": [{
                "ticker": "TCS",
                "recommendation": "sell",
                "reason": "Take some profit.",
                "riskLevel": "high",
                "percentage": 50.0,
                "amount": 12500.0
            }]
        })
    }

    fn analyze_request(body: Value, session: Option<&str>) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("content-type", "application/json");
        if let Some(id) = session {
            builder = builder.header(SESSION_HEADER, id);
        }
        builder.body(Body::from(body.to_string())).unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn analyze_returns_advice_summary_and_usage() {
        let (state, llm) = state_with(tcs_advice());
        let res = app(state.clone())
            .oneshot(analyze_request(
                json!({
                    "portfolio": [{"ticker": "tcs", "shares": 20}],
                    "marketData": "{}",
                    "cash": "50000"
                }),
                Some("session-a"),
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        assert_eq!(body["advice"][0]["ticker"], "TCS");
        assert!(body["generatedAt"].is_string());
        assert!(body.get("flags").is_none());
        assert_eq!(
            body["summary"],
            json!({
                "totalToInvest": 0.0,
                "totalToDivest": 12500.0,
                "investLabel": "₹0",
                "divestLabel": "₹12,500"
            })
        );
        assert_eq!(
            body["cards"][0],
            json!({
                "ticker": "TCS",
                "recommendation": {"label": "Sell", "tone": "negative"},
                "risk": {"label": "High Risk", "tone": "negative"},
                "reason": "Take some profit.",
                "weight": "50.00% of portfolio",
                "transaction": "Sell: ₹12,500"
            })
        );
        assert_eq!(body["usage"], json!({"creditsRemaining": 49, "analysesToday": 1}));
        assert_eq!(llm.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn invalid_request_is_400_with_violations() {
        let (state, llm) = state_with(tcs_advice());
        let res = app(state)
            .oneshot(analyze_request(
                json!({"portfolio": [], "marketData": "{}", "cash": 0}),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["error"], "Analysis Failed");
        assert_eq!(body["kind"], "invalid_request");
        assert_eq!(
            body["violations"],
            json!(["portfolio: must contain at least one holding"])
        );
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn bad_market_data_is_422_and_skips_model() {
        let (state, llm) = state_with(tcs_advice());
        let res = app(state)
            .oneshot(analyze_request(
                json!({
                    "portfolio": [{"ticker": "TCS", "shares": 20}],
                    "marketData": "not json",
                    "cash": 0
                }),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json_body(res).await["kind"], "invalid_market_data");
        assert_eq!(llm.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn incomplete_model_output_is_502() {
        let (state, _) = state_with(tcs_advice());
        let res = app(state)
            .oneshot(analyze_request(
                json!({
                    "portfolio": [{"ticker": "TCS", "shares": 20}, {"ticker": "INFY", "shares": 5}],
                    "marketData": "{}",
                    "cash": 0
                }),
                None,
            ))
            .await
            .unwrap();

        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let body = json_body(res).await;
        assert_eq!(body["kind"], "invalid_response");
        assert_eq!(
            body["message"],
            "An error occurred while analyzing your portfolio. Please try again."
        );
    }

    #[tokio::test]
    async fn degraded_mode_is_503_but_serves_market_data() {
        let (mut state, _) = state_with(tcs_advice());
        state.analyzer = None;

        let res = app(state.clone())
            .oneshot(analyze_request(json!({}), None))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);

        let res = app(state)
            .oneshot(Request::get("/market-data").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let body = json_body(res).await;
        let snapshot: Value =
            serde_json::from_str(body["marketData"].as_str().unwrap()).unwrap();
        assert_eq!(snapshot["stocks"].as_array().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn malformed_body_is_400() {
        let (state, _) = state_with(tcs_advice());
        let req = Request::builder()
            .method("POST")
            .uri("/analyze")
            .header("content-type", "application/json")
            .body(Body::from("{oops"))
            .unwrap();
        let res = app(state).oneshot(req).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn usage_counts_successes_per_session_header() {
        let (state, _) = state_with(tcs_advice());
        let body = json!({
            "portfolio": [{"ticker": "TCS", "shares": 20}],
            "marketData": "{}",
            "cash": 0
        });

        for _ in 0..2 {
            app(state.clone())
                .oneshot(analyze_request(body.clone(), Some("session-a")))
                .await
                .unwrap();
        }
        let res = app(state.clone())
            .oneshot(analyze_request(body.clone(), Some("session-b")))
            .await
            .unwrap();
        assert_eq!(json_body(res).await["usage"]["analysesToday"], 1);

        let res = app(state.clone())
            .oneshot(analyze_request(body, None))
            .await
            .unwrap();
        assert!(json_body(res).await.get("usage").is_none());
        assert_eq!(state.record_usage("session-a").credits_remaining, 47);
    }
}
