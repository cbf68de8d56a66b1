#![forbid(unsafe_code)]

use trustgate_contracts::identity::{ClaimedIdentity, IdentificationEvent, RequestId};

/// Failure of the trusted-event lookup. Retries, if any, belong to the
/// transport; by the time a failure reaches the verifier it is final for
/// this decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    Transport {
        kind: &'static str,
        http_status: Option<u16>,
    },
    NotFound,
    MalformedResponse,
}

impl FetchError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Transport { kind, .. } => kind,
            Self::NotFound => "not_found",
            Self::MalformedResponse => "malformed_response",
        }
    }
}

impl std::fmt::Display for FetchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport {
                kind,
                http_status: Some(status),
            } => write!(f, "identification lookup transport error {kind} status={status}"),
            Self::Transport { kind, .. } => {
                write!(f, "identification lookup transport error {kind}")
            }
            Self::NotFound => write!(f, "identification event not found"),
            Self::MalformedResponse => write!(f, "identification event response malformed"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Fetch capability for the trusted identification-event record. The
/// implementation is authenticated out of band; the verifier only sees the
/// typed result.
pub trait EventFetcher {
    fn fetch(&self, request_id: &RequestId) -> Result<IdentificationEvent, FetchError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    /// Event retrieved and the claimed visitor id matches the recorded one.
    Verified(IdentificationEvent),
    /// Event retrieved but the ids differ: the claimed value was tampered
    /// with or belongs to another identification attempt.
    Mismatch(IdentificationEvent),
    /// No trusted event to compare against.
    Unavailable(FetchError),
}

/// Authenticates a claimed (visitorId, requestId) pair against the trusted
/// server-side record. Pure: one fetch, one exact string comparison, no side
/// effects. The claimed value from the inbound request is never a source of
/// truth on its own.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentificationVerifier;

impl IdentificationVerifier {
    pub fn new() -> Self {
        Self
    }

    pub fn verify(&self, claimed: &ClaimedIdentity, fetcher: &dyn EventFetcher) -> VerifyResult {
        let event = match fetcher.fetch(&claimed.request_id) {
            Ok(event) => event,
            Err(err) => return VerifyResult::Unavailable(err),
        };
        // Exact, case-sensitive comparison. No normalization: lenient
        // matching would silently tolerate tampering.
        if event.visitor_id.as_str() == claimed.visitor_id.as_str() {
            VerifyResult::Verified(event)
        } else {
            VerifyResult::Mismatch(event)
        }
    }
}
