#![forbid(unsafe_code)]

use serde::Deserialize;

use trustgate_contracts::decision::LoginContext;
use trustgate_contracts::history::AccountId;
use trustgate_contracts::identity::ClaimedIdentity;
use trustgate_contracts::ContractViolation;
use trustgate_engines::decision::{DecisionConfig, DecisionEngine};
use trustgate_engines::verifier::EventFetcher;
use trustgate_storage::DeviceHistoryRepo;

use crate::flow::{degradation_line, FlowCommand, FlowDecision};

/// Inbound post-login flow event as the platform hands it over: raw query
/// parameters plus the account snapshot the platform already holds.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginFlowEvent {
    pub account_id: String,
    pub visitor_id: Option<String>,
    pub request_id: Option<String>,
    pub enrolled_factor_count: u32,
    pub successful_login_count: u64,
}

/// Login-flow entry point: extracts the claimed identifiers, runs the
/// decision engine, and translates the outcome into one platform command.
#[derive(Debug, Clone)]
pub struct LoginFlowWiring {
    engine: DecisionEngine,
}

impl LoginFlowWiring {
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            engine: DecisionEngine::new(config),
        }
    }

    pub fn run(
        &self,
        event: &LoginFlowEvent,
        fetcher: &dyn EventFetcher,
        repo: &mut dyn DeviceHistoryRepo,
    ) -> Result<FlowDecision, ContractViolation> {
        let account_id = AccountId::new(event.account_id.as_str())?;
        let mut log_lines = Vec::new();

        // The device signal is optional on login: malformed claimed input is
        // logged and handled exactly like an absent signal.
        let claimed = match ClaimedIdentity::from_raw(
            event.visitor_id.as_deref(),
            event.request_id.as_deref(),
        ) {
            Ok(claimed) => claimed,
            Err(violation) => {
                log_lines.push(format!(
                    "trustgate_login invalid claimed identity account={} reason={violation}",
                    account_id.as_str()
                ));
                None
            }
        };

        let ctx = LoginContext {
            account_id: account_id.clone(),
            enrolled_factor_count: event.enrolled_factor_count,
            successful_login_count: event.successful_login_count,
        };
        let report = self.engine.login(&ctx, claimed.as_ref(), fetcher, repo);
        for degradation in &report.degradations {
            log_lines.push(degradation_line(
                "trustgate_login",
                &account_id,
                claimed.as_ref(),
                degradation,
            ));
        }

        let command = FlowCommand::from_outcome(&report.outcome);
        if matches!(command, FlowCommand::ChallengeWith { .. }) {
            // Flag threaded to the downstream stage that completes the
            // challenge; best-effort, the challenge command stands alone.
            if let Err(err) = repo.set_pending_mfa_challenge_issued(&account_id, true) {
                log_lines.push(format!(
                    "trustgate_login degraded dependency=account_store op=set_pending_mfa_challenge_issued error={} account={}",
                    err.error_kind(),
                    account_id.as_str()
                ));
            }
        }

        Ok(FlowDecision {
            command,
            report,
            log_lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustgate_contracts::decision::{FactorType, Outcome};
    use trustgate_contracts::identity::{
        BotVerdict, IdentificationEvent, RequestId, VisitorId,
    };
    use trustgate_engines::verifier::FetchError;
    use trustgate_storage::{AttributeBagHistoryStore, InMemoryAccountStore};

    struct FakeFetcher {
        event: Option<IdentificationEvent>,
        error: Option<FetchError>,
    }

    impl EventFetcher for FakeFetcher {
        fn fetch(&self, _request_id: &RequestId) -> Result<IdentificationEvent, FetchError> {
            if let Some(err) = &self.error {
                return Err(err.clone());
            }
            Ok(self.event.clone().expect("fake fetcher needs an event"))
        }
    }

    fn clean_fetcher(visitor: &str) -> FakeFetcher {
        FakeFetcher {
            event: Some(
                IdentificationEvent::v1(
                    RequestId::new("R1").unwrap(),
                    VisitorId::new(visitor).unwrap(),
                    BotVerdict::NotDetected,
                    None,
                    None,
                    None,
                )
                .unwrap(),
            ),
            error: None,
        }
    }

    fn wiring() -> LoginFlowWiring {
        LoginFlowWiring::new(DecisionConfig::mvp_v1())
    }

    fn event(visitor: Option<&str>, request: Option<&str>) -> LoginFlowEvent {
        LoginFlowEvent {
            account_id: "auth0|u1".to_string(),
            visitor_id: visitor.map(str::to_string),
            request_id: request.map(str::to_string),
            enrolled_factor_count: 2,
            successful_login_count: 9,
        }
    }

    #[test]
    fn at_login_flow_01_absent_signal_continues_without_logs() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let out = wiring()
            .run(&event(None, None), &clean_fetcher("V1"), &mut repo)
            .unwrap();
        assert_eq!(out.command, FlowCommand::Continue);
        assert!(out.log_lines.is_empty());
        assert!(out.report.applied_writes.is_empty());
    }

    #[test]
    fn at_login_flow_02_unknown_device_challenge_sets_pending_flag() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let out = wiring()
            .run(&event(Some("V1"), Some("R1")), &clean_fetcher("V1"), &mut repo)
            .unwrap();
        assert_eq!(
            out.command,
            FlowCommand::ChallengeWith {
                factor: FactorType::Otp
            }
        );
        let record = repo
            .record(&AccountId::new("auth0|u1").unwrap())
            .unwrap();
        assert!(record.mfa_needed);
        assert!(record.pending_mfa_challenge_issued);
    }

    #[test]
    fn at_login_flow_03_degradation_logs_are_redacted() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let fetcher = FakeFetcher {
            event: None,
            error: Some(FetchError::Transport {
                kind: "timeout",
                http_status: None,
            }),
        };
        let out = wiring()
            .run(
                &event(Some("VisitorSecret123"), Some("R1")),
                &fetcher,
                &mut repo,
            )
            .unwrap();
        assert_eq!(out.command, FlowCommand::Continue);
        assert_eq!(out.log_lines.len(), 1);
        let line = &out.log_lines[0];
        assert!(line.contains("dependency=identification_lookup"));
        assert!(line.contains("error=timeout"));
        assert!(line.contains("visitor=v_"));
        assert!(!line.contains("VisitorSecret123"));
    }

    #[test]
    fn at_login_flow_04_malformed_claimed_input_is_logged_passthrough() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let out = wiring()
            .run(
                &event(Some("bad visitor"), Some("R1")),
                &clean_fetcher("V1"),
                &mut repo,
            )
            .unwrap();
        assert_eq!(out.command, FlowCommand::Continue);
        assert_eq!(out.log_lines.len(), 1);
        assert!(out.log_lines[0].contains("invalid claimed identity"));
        assert!(out.report.applied_writes.is_empty());
    }

    #[test]
    fn at_login_flow_05_deny_outcome_maps_to_deny_command() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let out = wiring()
            .run(&event(Some("V1"), Some("R1")), &clean_fetcher("V2"), &mut repo)
            .unwrap();
        let FlowCommand::Deny {
            reason_code,
            message,
        } = out.command
        else {
            panic!("expected deny command");
        };
        assert_eq!(reason_code, "tampering_detected");
        assert_eq!(message, "Visitor identification error.");
        assert!(matches!(out.report.outcome, Outcome::Deny { .. }));
    }

    #[test]
    fn at_login_flow_06_invalid_account_id_is_a_contract_violation() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let mut bad = event(None, None);
        bad.account_id = "  ".to_string();
        let out = wiring().run(&bad, &clean_fetcher("V1"), &mut repo);
        assert!(out.is_err());
    }
}
