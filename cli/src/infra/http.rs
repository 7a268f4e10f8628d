//! HTTP infrastructure — implements `HealthProbe` with `ureq` on `spawn_blocking`.

use std::time::Duration;

use crate::application::ports::HealthProbe;
use crate::domain::HealthStatus;

/// Production health probe: one GET, no redirects followed.
pub struct UreqHealthProbe;

impl HealthProbe for UreqHealthProbe {
    async fn probe(&self, url: &str, host: &str, timeout: Duration) -> HealthStatus {
        let url = url.to_string();
        let host = host.to_string();
        tracing::debug!(%url, %host, "probing server");
        tokio::task::spawn_blocking(move || probe_blocking(&url, &host, timeout))
            .await
            .unwrap_or_else(|e| HealthStatus::Unreachable(format!("probe task failed: {e}")))
    }
}

fn probe_blocking(url: &str, host: &str, timeout: Duration) -> HealthStatus {
    let agent = ureq::AgentBuilder::new()
        .timeout(timeout)
        .redirects(0)
        .build();
    match agent.get(url).set("Host", host).call() {
        Ok(resp) => HealthStatus::from_status(resp.status()),
        Err(ureq::Error::Status(code, _)) => HealthStatus::from_status(code),
        Err(ureq::Error::Transport(t)) => HealthStatus::Unreachable(t.to_string()),
    }
}
