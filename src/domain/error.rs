// Error taxonomy shared by the fetch pipeline, the HTTP surface and the refresh loop
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A required request parameter is missing or malformed
    #[error("{0}")]
    Validation(String),

    /// The login call failed; never retried at its own layer
    #[error("Failed to authenticate with ThingsBoard: {0}")]
    Auth(String),

    /// Non-2xx from the telemetry API, after the auth retry budget where applicable
    #[error("ThingsBoard API error: {status}")]
    Upstream { status: u16 },

    #[error("ThingsBoard request failed: {0}")]
    Transport(String),

    #[error("Invalid ThingsBoard response: {0}")]
    Parse(String),
}

/// Kind of an observed failure, without its payload.
///
/// Handlers publish these to the dashboard worker, which decides whether the
/// failure is worth an immediate chart refresh.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Validation,
    Auth,
    Upstream,
    Transport,
    Parse,
}

impl FailureKind {
    /// Everything that reaches a client as a 500 is worth a refresh.
    pub fn is_retry_worthy(self) -> bool {
        !matches!(self, FailureKind::Validation)
    }
}

impl TelemetryError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::Validation,
            Self::Auth(_) => FailureKind::Auth,
            Self::Upstream { .. } => FailureKind::Upstream,
            Self::Transport(_) => FailureKind::Transport,
            Self::Parse(_) => FailureKind::Parse,
        }
    }
}

/// Failure of a single refresh cycle
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("history fetch for '{key}' failed: {source}")]
    Fetch {
        key: String,
        #[source]
        source: TelemetryError,
    },
}
