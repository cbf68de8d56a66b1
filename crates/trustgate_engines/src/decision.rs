#![forbid(unsafe_code)]

use trustgate_contracts::decision::{
    AppliedWrite, DecisionReport, Degradation, DenyReason, DependencyKind, FactorType,
    LoginContext, Outcome, RegistrationContext,
};
use trustgate_contracts::identity::ClaimedIdentity;
use trustgate_storage::{DeviceHistoryRepo, StorageError};

use crate::risk::{RiskConfig, RiskResult, RiskSignal, RiskSignalEvaluator};
use crate::verifier::{EventFetcher, FetchError, IdentificationVerifier, VerifyResult};

// User-visible denial messages, kept flow-specific. Only denials carry a
// message; every other failure stays invisible to the end user.
const LOGIN_TAMPERING_MESSAGE: &str = "Visitor identification error.";
const LOGIN_RISK_MESSAGE: &str = "Login denied.";
const SIGNUP_TAMPERING_MESSAGE: &str = "Sign-ups from this device cannot be accepted.";
const SIGNUP_BOT_MESSAGE: &str = "Bot detected";
const SIGNUP_RISK_MESSAGE: &str = "Sign-up denied.";
const SIGNUP_DEVICE_LIMIT_MESSAGE: &str = "Too many sign-ups from this device.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecisionConfig {
    pub risk: RiskConfig,
    pub enroll_factor: FactorType,
    pub challenge_factor: FactorType,
    /// Registration is denied when the number of existing accounts already
    /// associated with the claimed device exceeds this.
    pub signup_device_reuse_limit: u64,
}

impl DecisionConfig {
    pub fn mvp_v1() -> Self {
        Self {
            risk: RiskConfig::mvp_v1(),
            enroll_factor: FactorType::Otp,
            challenge_factor: FactorType::Otp,
            signup_device_reuse_limit: 0,
        }
    }
}

/// Turns {fingerprint verification, risk signals, visitor history, flow
/// context} into exactly one outcome. Stateless between invocations; all
/// durable state lives behind the history repo. Rules are evaluated in
/// order and the first applicable one wins, so a single access decision is
/// produced by construction.
///
/// Infrastructure failures fail open (an outage in a verification
/// dependency must not become an authentication outage); positively
/// confirmed tampering or risk always denies.
#[derive(Debug, Clone)]
pub struct DecisionEngine {
    config: DecisionConfig,
    verifier: IdentificationVerifier,
    risk: RiskSignalEvaluator,
}

impl DecisionEngine {
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            config,
            verifier: IdentificationVerifier::new(),
            risk: RiskSignalEvaluator::new(config.risk),
        }
    }

    pub fn config(&self) -> &DecisionConfig {
        &self.config
    }

    /// Login-flow policy. The device signal is optional here: incomplete
    /// claimed input passes through untouched.
    pub fn login(
        &self,
        ctx: &LoginContext,
        claimed: Option<&ClaimedIdentity>,
        fetcher: &dyn EventFetcher,
        repo: &mut dyn DeviceHistoryRepo,
    ) -> DecisionReport {
        let Some(claimed) = claimed else {
            return DecisionReport::passthrough();
        };
        let mut writes = Vec::new();
        let mut degradations = Vec::new();

        let event = match self.verifier.verify(claimed, fetcher) {
            VerifyResult::Unavailable(err) => {
                degradations.push(fetch_degradation(err));
                return report(Outcome::Allow, writes, degradations);
            }
            VerifyResult::Mismatch(_) => {
                return report(
                    deny(DenyReason::TamperingDetected, LOGIN_TAMPERING_MESSAGE),
                    writes,
                    degradations,
                );
            }
            VerifyResult::Verified(event) => event,
        };

        // Persist the trusted visitor id unconditionally, independent of how
        // the remaining rules resolve.
        match repo.set_current_visitor_id(&ctx.account_id, &event.visitor_id) {
            Ok(()) => writes.push(AppliedWrite::CurrentVisitorId(event.visitor_id.clone())),
            Err(err) => degradations.push(store_degradation("set_current_visitor_id", &err)),
        }

        if let RiskResult::Flagged { signals } = self.risk.evaluate(&event) {
            return report(
                deny(deny_reason_for_signals(&signals), LOGIN_RISK_MESSAGE),
                writes,
                degradations,
            );
        }

        // Mandatory first-time enrollment dominates the history challenge.
        if ctx.enrolled_factor_count == 0 || ctx.successful_login_count <= 1 {
            return report(
                Outcome::EnrollFactor {
                    factor: self.config.enroll_factor,
                },
                writes,
                degradations,
            );
        }

        match repo.contains(&ctx.account_id, &event.visitor_id) {
            Ok(true) => report(Outcome::Allow, writes, degradations),
            Ok(false) => {
                match repo.set_mfa_needed(&ctx.account_id, true) {
                    Ok(()) => writes.push(AppliedWrite::MfaNeeded),
                    Err(err) => degradations.push(store_degradation("set_mfa_needed", &err)),
                }
                report(
                    Outcome::Challenge {
                        factor: self.config.challenge_factor,
                    },
                    writes,
                    degradations,
                )
            }
            Err(err) => {
                // Store outage: fail open rather than challenging blind.
                degradations.push(store_degradation("contains", &err));
                report(Outcome::Allow, writes, degradations)
            }
        }
    }

    /// Registration-flow policy: the same verification and risk gates, plus
    /// a cross-account device-reuse ceiling. Every infrastructure failure
    /// degrades to Allow — a broken dependency never blocks sign-up.
    pub fn register(
        &self,
        ctx: &RegistrationContext,
        claimed: Option<&ClaimedIdentity>,
        fetcher: &dyn EventFetcher,
        repo: &mut dyn DeviceHistoryRepo,
    ) -> DecisionReport {
        let Some(claimed) = claimed else {
            return DecisionReport::passthrough();
        };
        let mut writes = Vec::new();
        let mut degradations = Vec::new();

        let event = match self.verifier.verify(claimed, fetcher) {
            VerifyResult::Unavailable(err) => {
                degradations.push(fetch_degradation(err));
                return report(Outcome::Allow, writes, degradations);
            }
            VerifyResult::Mismatch(_) => {
                return report(
                    deny(DenyReason::TamperingDetected, SIGNUP_TAMPERING_MESSAGE),
                    writes,
                    degradations,
                );
            }
            VerifyResult::Verified(event) => event,
        };

        if let RiskResult::Flagged { signals } = self.risk.evaluate(&event) {
            let reason = deny_reason_for_signals(&signals);
            let message = if reason == DenyReason::BotDetected {
                SIGNUP_BOT_MESSAGE
            } else {
                SIGNUP_RISK_MESSAGE
            };
            return report(deny(reason, message), writes, degradations);
        }

        let reuse_count = match repo.count_accounts_with_visitor_id(&event.visitor_id) {
            Ok(count) => count,
            Err(err) => {
                degradations.push(store_degradation("count_accounts_with_visitor_id", &err));
                return report(Outcome::Allow, writes, degradations);
            }
        };
        if reuse_count > self.config.signup_device_reuse_limit {
            // Denied sign-up: no association write for the new account.
            return report(
                deny(DenyReason::MaxDeviceLimit, SIGNUP_DEVICE_LIMIT_MESSAGE),
                writes,
                degradations,
            );
        }

        match repo.associate(&ctx.account_id, &event.visitor_id) {
            Ok(()) => writes.push(AppliedWrite::AssociatedVisitorId(event.visitor_id.clone())),
            Err(err) => degradations.push(store_degradation("associate", &err)),
        }
        report(Outcome::Allow, writes, degradations)
    }
}

fn report(
    outcome: Outcome,
    applied_writes: Vec<AppliedWrite>,
    degradations: Vec<Degradation>,
) -> DecisionReport {
    DecisionReport {
        outcome,
        applied_writes,
        degradations,
    }
}

fn deny(reason: DenyReason, message: &str) -> Outcome {
    Outcome::Deny {
        reason,
        message: message.to_string(),
    }
}

fn deny_reason_for_signals(signals: &[RiskSignal]) -> DenyReason {
    if signals.contains(&RiskSignal::Bot) {
        DenyReason::BotDetected
    } else {
        DenyReason::RiskDetected
    }
}

fn fetch_degradation(err: FetchError) -> Degradation {
    Degradation {
        dependency: DependencyKind::IdentificationLookup,
        op: "fetch",
        error_kind: err.error_kind().to_string(),
    }
}

fn store_degradation(op: &'static str, err: &StorageError) -> Degradation {
    Degradation {
        dependency: DependencyKind::AccountStore,
        op,
        error_kind: err.error_kind().to_string(),
    }
}
