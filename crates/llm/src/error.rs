//! Provider error taxonomy. `ProviderErrorKind` is the only thing
//! `gw-router`'s fallback loop inspects — no raw adapter error reaches an
//! SSE `error` event without being mapped through it first.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Worth retrying against the same provider or falling to the next
    /// link in the chain: timeouts, connection resets, 5xx, 429.
    Transient,
    /// This specific attempt cannot succeed (bad request, model not
    /// found) but the provider itself is healthy — falls to the next
    /// provider without penalising this one's circuit breaker.
    PermanentForAttempt,
    /// The provider refused on content-safety grounds; fallback is
    /// suppressed since another provider is unlikely to answer either.
    SafetyRefusal,
    /// A bug in this gateway, not the provider (serialization failure,
    /// invariant violation).
    Internal,
}

#[derive(thiserror::Error, Debug)]
#[error("{message}")]
pub struct ProviderError {
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn transient(message: impl Into<String>) -> Self {
        Self { kind: ProviderErrorKind::Transient, message: message.into() }
    }

    pub fn permanent_for_attempt(message: impl Into<String>) -> Self {
        Self { kind: ProviderErrorKind::PermanentForAttempt, message: message.into() }
    }

    pub fn safety_refusal(message: impl Into<String>) -> Self {
        Self { kind: ProviderErrorKind::SafetyRefusal, message: message.into() }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self { kind: ProviderErrorKind::Internal, message: message.into() }
    }

    pub fn is_fallback_eligible(&self) -> bool {
        matches!(self.kind, ProviderErrorKind::Transient | ProviderErrorKind::PermanentForAttempt)
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() || err.status().map(|s| s.is_server_error()).unwrap_or(false) {
            ProviderError::transient(err.to_string())
        } else {
            ProviderError::permanent_for_attempt(err.to_string())
        }
    }
}
