#![forbid(unsafe_code)]

use trustgate_contracts::decision::{DecisionReport, Degradation, FactorType, Outcome};
use trustgate_contracts::history::AccountId;
use trustgate_contracts::identity::ClaimedIdentity;

use crate::redact::visitor_digest;

/// Platform-facing command the flow adapter executes. One command per
/// inbound request; the platform maps it to its own session mechanics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowCommand {
    Continue,
    Deny {
        reason_code: &'static str,
        message: String,
    },
    ChallengeWith {
        factor: FactorType,
    },
    EnrollWith {
        factor: FactorType,
    },
}

impl FlowCommand {
    pub fn from_outcome(outcome: &Outcome) -> Self {
        match outcome {
            Outcome::Allow => Self::Continue,
            Outcome::Challenge { factor } => Self::ChallengeWith { factor: *factor },
            Outcome::EnrollFactor { factor } => Self::EnrollWith { factor: *factor },
            Outcome::Deny { reason, message } => Self::Deny {
                reason_code: reason.code(),
                message: message.clone(),
            },
        }
    }
}

/// Full flow result: the command, the engine's report, and the redacted log
/// lines the adapter should emit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowDecision {
    pub command: FlowCommand,
    pub report: DecisionReport,
    pub log_lines: Vec<String>,
}

pub(crate) fn degradation_line(
    flow: &'static str,
    account_id: &AccountId,
    claimed: Option<&ClaimedIdentity>,
    degradation: &Degradation,
) -> String {
    let mut line = format!(
        "{flow} degraded dependency={} op={} error={} account={}",
        degradation.dependency.as_str(),
        degradation.op,
        degradation.error_kind,
        account_id.as_str(),
    );
    if let Some(claimed) = claimed {
        line.push_str(&format!(" visitor={}", visitor_digest(&claimed.visitor_id)));
    }
    line
}
