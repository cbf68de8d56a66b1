#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use crate::history::AccountId;
use crate::identity::VisitorId;

/// Step-up authentication factor the platform can challenge with or enroll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FactorType {
    Otp,
}

impl FactorType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Otp => "otp",
        }
    }
}

/// Machine-readable denial reason. The wire codes are stable contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DenyReason {
    TamperingDetected,
    BotDetected,
    RiskDetected,
    MaxDeviceLimit,
}

impl DenyReason {
    pub const fn code(self) -> &'static str {
        match self {
            Self::TamperingDetected => "tampering_detected",
            Self::BotDetected => "bot_detected",
            Self::RiskDetected => "risk_detected",
            Self::MaxDeviceLimit => "max_device_limit",
        }
    }
}

/// The engine's sole externally observable access decision. Closed set;
/// exactly one is produced per invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Allow,
    Challenge { factor: FactorType },
    EnrollFactor { factor: FactorType },
    Deny { reason: DenyReason, message: String },
}

/// Store write the engine performed while deciding. Reported so the flow
/// layer can log and audit side effects without re-deriving them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AppliedWrite {
    CurrentVisitorId(VisitorId),
    MfaNeeded,
    AssociatedVisitorId(VisitorId),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DependencyKind {
    IdentificationLookup,
    AccountStore,
}

impl DependencyKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::IdentificationLookup => "identification_lookup",
            Self::AccountStore => "account_store",
        }
    }
}

/// One dependency failure the engine degraded over instead of converting
/// into an authentication outage. Never surfaced to the end user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Degradation {
    pub dependency: DependencyKind,
    pub op: &'static str,
    pub error_kind: String,
}

/// Full decision result: the single outcome plus the writes applied and the
/// failures degraded over on the way to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecisionReport {
    pub outcome: Outcome,
    pub applied_writes: Vec<AppliedWrite>,
    pub degradations: Vec<Degradation>,
}

impl DecisionReport {
    pub fn passthrough() -> Self {
        Self {
            outcome: Outcome::Allow,
            applied_writes: Vec::new(),
            degradations: Vec::new(),
        }
    }
}

/// Login-flow context supplied by the surrounding platform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginContext {
    pub account_id: AccountId,
    pub enrolled_factor_count: u32,
    pub successful_login_count: u64,
}

/// Registration-flow context: the account being created.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationContext {
    pub account_id: AccountId,
}
