#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::common::{validate_identifier_text, ContractViolation, Validate};

const VISITOR_ID_MAX_LEN: usize = 128;
const REQUEST_ID_MAX_LEN: usize = 128;

/// Stable device/browser fingerprint identifier produced by the client-side SDK.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct VisitorId(String);

impl VisitorId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = Self(raw.into());
        id.validate()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for VisitorId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_identifier_text("visitor_id", &self.0, VISITOR_ID_MAX_LEN)
    }
}

/// One-time token correlating a client-side identification attempt with its
/// server-side record.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = Self(raw.into());
        id.validate()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for RequestId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_identifier_text("request_id", &self.0, REQUEST_ID_MAX_LEN)
    }
}

/// The (visitorId, requestId) pair claimed by the inbound request. Untrusted
/// until verified against the server-side identification event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClaimedIdentity {
    pub visitor_id: VisitorId,
    pub request_id: RequestId,
}

impl ClaimedIdentity {
    pub fn v1(visitor_id: VisitorId, request_id: RequestId) -> Self {
        Self {
            visitor_id,
            request_id,
        }
    }

    /// Assembles a claimed identity from raw inbound values. Absence (or a
    /// blank value) of either part means the optional signal was not supplied
    /// at all: `Ok(None)`, never an error. A present but malformed part is a
    /// contract violation.
    pub fn from_raw(
        visitor_id: Option<&str>,
        request_id: Option<&str>,
    ) -> Result<Option<Self>, ContractViolation> {
        let visitor_id = visitor_id.map(str::trim).filter(|v| !v.is_empty());
        let request_id = request_id.map(str::trim).filter(|v| !v.is_empty());
        match (visitor_id, request_id) {
            (Some(visitor_id), Some(request_id)) => Ok(Some(Self::v1(
                VisitorId::new(visitor_id)?,
                RequestId::new(request_id)?,
            ))),
            _ => Ok(None),
        }
    }
}

impl Validate for ClaimedIdentity {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.visitor_id.validate()?;
        self.request_id.validate()
    }
}

/// Bot-detection verdict attached to the identification event. Only the
/// literal `notDetected` wire token maps to `NotDetected`; every other token,
/// including ones this build does not know, maps away from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BotVerdict {
    NotDetected,
    Bad,
    Unknown,
    Unrecognized,
}

impl BotVerdict {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            None | Some("") => Self::Unknown,
            Some("notDetected") => Self::NotDetected,
            Some("bad") => Self::Bad,
            Some("notEnoughData") => Self::Unknown,
            Some(_) => Self::Unrecognized,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotDetected => "notDetected",
            Self::Bad => "bad",
            Self::Unknown => "unknown",
            Self::Unrecognized => "unrecognized",
        }
    }
}

/// Verdict for the optional licensed signals (IP blocklist, VM, Tor). A
/// signal that is absent from the event was not evaluated at all and is
/// represented as `None` at the event level, not as `NotDetected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalVerdict {
    NotDetected,
    Detected,
}

impl SignalVerdict {
    pub const fn from_detected(detected: bool) -> Self {
        if detected {
            Self::Detected
        } else {
            Self::NotDetected
        }
    }
}

/// Trusted server-side record of one identification attempt, keyed by request
/// id. Immutable once fetched; fetched at most once per decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentificationEvent {
    pub request_id: RequestId,
    pub visitor_id: VisitorId,
    pub bot: BotVerdict,
    pub ip_blocklist: Option<SignalVerdict>,
    pub virtual_machine: Option<SignalVerdict>,
    pub tor: Option<SignalVerdict>,
}

impl IdentificationEvent {
    pub fn v1(
        request_id: RequestId,
        visitor_id: VisitorId,
        bot: BotVerdict,
        ip_blocklist: Option<SignalVerdict>,
        virtual_machine: Option<SignalVerdict>,
        tor: Option<SignalVerdict>,
    ) -> Result<Self, ContractViolation> {
        let event = Self {
            request_id,
            visitor_id,
            bot,
            ip_blocklist,
            virtual_machine,
            tor,
        };
        event.validate()?;
        Ok(event)
    }
}

impl Validate for IdentificationEvent {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.request_id.validate()?;
        self.visitor_id.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_identity_01_ids_reject_blank_and_whitespace() {
        assert!(VisitorId::new("").is_err());
        assert!(VisitorId::new("   ").is_err());
        assert!(VisitorId::new("abc def").is_err());
        assert!(RequestId::new("1658822355371.sdPVVg").is_ok());
    }

    #[test]
    fn at_identity_02_claimed_from_raw_treats_missing_parts_as_absent() {
        assert_eq!(ClaimedIdentity::from_raw(None, None).unwrap(), None);
        assert_eq!(
            ClaimedIdentity::from_raw(Some("v1"), None).unwrap(),
            None,
            "request id missing means the signal was not supplied"
        );
        assert_eq!(ClaimedIdentity::from_raw(Some("  "), Some("r1")).unwrap(), None);
        let claimed = ClaimedIdentity::from_raw(Some("v1"), Some("r1"))
            .unwrap()
            .unwrap();
        assert_eq!(claimed.visitor_id.as_str(), "v1");
        assert_eq!(claimed.request_id.as_str(), "r1");
    }

    #[test]
    fn at_identity_03_claimed_from_raw_rejects_malformed_present_parts() {
        assert!(ClaimedIdentity::from_raw(Some("v 1"), Some("r1")).is_err());
        let long = "x".repeat(200);
        assert!(ClaimedIdentity::from_raw(Some(&long), Some("r1")).is_err());
    }

    #[test]
    fn at_identity_04_bot_verdict_parse_is_fail_closed_on_unknown_tokens() {
        assert_eq!(BotVerdict::parse(Some("notDetected")), BotVerdict::NotDetected);
        assert_eq!(BotVerdict::parse(Some("bad")), BotVerdict::Bad);
        assert_eq!(BotVerdict::parse(Some("notEnoughData")), BotVerdict::Unknown);
        assert_eq!(BotVerdict::parse(None), BotVerdict::Unknown);
        assert_eq!(BotVerdict::parse(Some("good")), BotVerdict::Unrecognized);
        assert_eq!(BotVerdict::parse(Some("NOTDETECTED")), BotVerdict::Unrecognized);
    }
}
