//! Startup self-check
//!
//! Once the transport is connected and polling, the relay pings an external
//! healthcheck URL (e.g. a dead-man's-switch monitor). The result is only logged.

use std::time::Duration;

/// Timeout for the healthcheck request
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// Result of a single health check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckResult {
    pub status: &'static str,
    pub message: Option<String>,
}

impl CheckResult {
    const fn ok() -> Self {
        Self {
            status: "ok",
            message: None,
        }
    }

    fn fail(message: impl Into<String>) -> Self {
        Self {
            status: "fail",
            message: Some(message.into()),
        }
    }

    /// Whether the check passed
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// GET `url` once and report the outcome
pub async fn ping(url: &str) -> CheckResult {
    let client = match reqwest::Client::builder().timeout(PING_TIMEOUT).build() {
        Ok(client) => client,
        Err(e) => return CheckResult::fail(format!("client setup failed: {e}")),
    };

    match client.get(url).send().await {
        Ok(resp) if resp.status().is_success() => CheckResult::ok(),
        Ok(resp) => CheckResult::fail(format!("status {}", resp.status())),
        Err(e) => CheckResult::fail(e.to_string()),
    }
}

/// Ping `url` in the background, logging the outcome
pub fn spawn_startup_check(url: String) -> tokio::task::JoinHandle<CheckResult> {
    tokio::spawn(async move {
        let result = ping(&url).await;
        if result.is_ok() {
            tracing::info!(url = %url, "healthcheck ping succeeded");
        } else {
            tracing::warn!(
                url = %url,
                reason = result.message.as_deref().unwrap_or_default(),
                "healthcheck ping failed"
            );
        }
        result
    })
}
