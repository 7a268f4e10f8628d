//! Health-probe policy.

/// Outcome of one HTTP probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    /// The server answered with a 2xx or 3xx status.
    Healthy(u16),
    /// The server answered, but with an error status.
    Unhealthy(u16),
    /// No HTTP response at all (refused, timed out, ...).
    Unreachable(String),
}

impl HealthStatus {
    /// Classify an HTTP status code.
    #[must_use]
    pub fn from_status(code: u16) -> Self {
        if (200..400).contains(&code) {
            HealthStatus::Healthy(code)
        } else {
            HealthStatus::Unhealthy(code)
        }
    }

    #[must_use]
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy(_))
    }

    /// Abort message for an unhealthy probe.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            HealthStatus::Healthy(code) => format!("HTTP {code}"),
            HealthStatus::Unhealthy(code) => format!("server not responding (HTTP {code})"),
            HealthStatus::Unreachable(reason) => format!("server not responding ({reason})"),
        }
    }
}

/// Loopback URL probed after activation.
#[must_use]
pub fn probe_url(port: u16, path: &str) -> String {
    format!("http://127.0.0.1:{port}{path}")
}
