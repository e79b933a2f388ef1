pub mod analysis;
pub mod domain;
pub mod llm;
pub mod market;
pub mod session;
pub mod summary;

pub mod config {
    use anyhow::Context;
    use std::time::Duration;

    const DEFAULT_ANALYSIS_TIMEOUT_SECS: u64 = 90;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub anthropic_api_key: Option<String>,
        pub sentry_dsn: Option<String>,
        pub analysis_timeout: Duration,
        pub policy_checks: bool,
        pub usage_max_sessions: usize,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let analysis_timeout_secs = match std::env::var("ANALYSIS_TIMEOUT_SECS") {
                Ok(s) => s
                    .trim()
                    .parse::<u64>()
                    .with_context(|| {
                        format!("ANALYSIS_TIMEOUT_SECS must be an integer (got {s:?})")
                    })?,
                Err(_) => DEFAULT_ANALYSIS_TIMEOUT_SECS,
            };
            anyhow::ensure!(
                analysis_timeout_secs > 0,
                "ANALYSIS_TIMEOUT_SECS must be > 0"
            );

            let policy_checks = std::env::var("POLICY_CHECKS")
                .map(|s| parse_flag(&s))
                .unwrap_or(true);

            let usage_max_sessions = match std::env::var("USAGE_MAX_SESSIONS") {
                Ok(s) => s
                    .trim()
                    .parse::<usize>()
                    .with_context(|| {
                        format!("USAGE_MAX_SESSIONS must be an integer (got {s:?})")
                    })?,
                Err(_) => crate::session::DEFAULT_MAX_SESSIONS,
            };

            Ok(Self {
                anthropic_api_key: std::env::var("ANTHROPIC_API_KEY").ok(),
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
                analysis_timeout: Duration::from_secs(analysis_timeout_secs),
                policy_checks,
                usage_max_sessions,
            })
        }

        pub fn require_anthropic_api_key(&self) -> anyhow::Result<&str> {
            self.anthropic_api_key
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .context("ANTHROPIC_API_KEY is required")
        }
    }

    fn parse_flag(s: &str) -> bool {
        !matches!(
            s.trim().to_ascii_lowercase().as_str(),
            "0" | "false" | "off" | "no"
        )
    }

}
