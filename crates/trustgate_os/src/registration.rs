#![forbid(unsafe_code)]

use serde::Deserialize;

use trustgate_contracts::decision::RegistrationContext;
use trustgate_contracts::history::AccountId;
use trustgate_contracts::identity::ClaimedIdentity;
use trustgate_contracts::ContractViolation;
use trustgate_engines::decision::{DecisionConfig, DecisionEngine};
use trustgate_engines::verifier::EventFetcher;
use trustgate_storage::DeviceHistoryRepo;

use crate::flow::{degradation_line, FlowCommand, FlowDecision};

/// Inbound pre-registration flow event: the account being created plus the
/// claimed identifiers the sign-up page stashed in the pending metadata.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationFlowEvent {
    pub account_id: String,
    pub visitor_id: Option<String>,
    pub request_id: Option<String>,
}

/// Registration-flow entry point. Same shape as the login wiring; the only
/// extra concern here is that every degradation stays non-fatal so a broken
/// dependency never blocks account creation.
#[derive(Debug, Clone)]
pub struct RegistrationFlowWiring {
    engine: DecisionEngine,
}

impl RegistrationFlowWiring {
    pub fn new(config: DecisionConfig) -> Self {
        Self {
            engine: DecisionEngine::new(config),
        }
    }

    pub fn run(
        &self,
        event: &RegistrationFlowEvent,
        fetcher: &dyn EventFetcher,
        repo: &mut dyn DeviceHistoryRepo,
    ) -> Result<FlowDecision, ContractViolation> {
        let account_id = AccountId::new(event.account_id.as_str())?;
        let mut log_lines = Vec::new();

        let claimed = match ClaimedIdentity::from_raw(
            event.visitor_id.as_deref(),
            event.request_id.as_deref(),
        ) {
            Ok(claimed) => claimed,
            Err(violation) => {
                log_lines.push(format!(
                    "trustgate_registration invalid claimed identity account={} reason={violation}",
                    account_id.as_str()
                ));
                None
            }
        };

        let ctx = RegistrationContext {
            account_id: account_id.clone(),
        };
        let report = self.engine.register(&ctx, claimed.as_ref(), fetcher, repo);
        for degradation in &report.degradations {
            log_lines.push(degradation_line(
                "trustgate_registration",
                &account_id,
                claimed.as_ref(),
                degradation,
            ));
        }

        Ok(FlowDecision {
            command: FlowCommand::from_outcome(&report.outcome),
            report,
            log_lines,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trustgate_contracts::decision::AppliedWrite;
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

    fn fetcher_with(visitor: &str, bot: BotVerdict) -> FakeFetcher {
        FakeFetcher {
            event: Some(
                IdentificationEvent::v1(
                    RequestId::new("R4").unwrap(),
                    VisitorId::new(visitor).unwrap(),
                    bot,
                    None,
                    None,
                    None,
                )
                .unwrap(),
            ),
            error: None,
        }
    }

    fn wiring() -> RegistrationFlowWiring {
        RegistrationFlowWiring::new(DecisionConfig::mvp_v1())
    }

    fn event(visitor: Option<&str>, request: Option<&str>) -> RegistrationFlowEvent {
        RegistrationFlowEvent {
            account_id: "auth0|new1".to_string(),
            visitor_id: visitor.map(str::to_string),
            request_id: request.map(str::to_string),
        }
    }

    #[test]
    fn at_reg_flow_01_missing_fingerprint_data_continues_silently() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let out = wiring()
            .run(
                &event(None, None),
                &fetcher_with("V4", BotVerdict::NotDetected),
                &mut repo,
            )
            .unwrap();
        assert_eq!(out.command, FlowCommand::Continue);
        assert_eq!(repo.inner_ref().account_count(), 0);
    }

    #[test]
    fn at_reg_flow_02_clean_signup_seeds_the_device_set() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let out = wiring()
            .run(
                &event(Some("V4"), Some("R4")),
                &fetcher_with("V4", BotVerdict::NotDetected),
                &mut repo,
            )
            .unwrap();
        assert_eq!(out.command, FlowCommand::Continue);
        assert_eq!(
            out.report.applied_writes,
            vec![AppliedWrite::AssociatedVisitorId(
                VisitorId::new("V4").unwrap()
            )]
        );
        assert!(repo
            .contains(
                &AccountId::new("auth0|new1").unwrap(),
                &VisitorId::new("V4").unwrap()
            )
            .unwrap());
    }

    #[test]
    fn at_reg_flow_03_bot_denies_with_platform_reason_code() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let out = wiring()
            .run(
                &event(Some("V3"), Some("R4")),
                &fetcher_with("V3", BotVerdict::Bad),
                &mut repo,
            )
            .unwrap();
        let FlowCommand::Deny {
            reason_code,
            message,
        } = out.command
        else {
            panic!("expected deny command");
        };
        assert_eq!(reason_code, "bot_detected");
        assert_eq!(message, "Bot detected");
    }

    #[test]
    fn at_reg_flow_04_lookup_outage_logs_and_continues() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        let fetcher = FakeFetcher {
            event: None,
            error: Some(FetchError::Transport {
                kind: "connection",
                http_status: None,
            }),
        };
        let out = wiring()
            .run(&event(Some("V4"), Some("R4")), &fetcher, &mut repo)
            .unwrap();
        assert_eq!(out.command, FlowCommand::Continue);
        assert_eq!(out.log_lines.len(), 1);
        assert!(out.log_lines[0].contains("trustgate_registration degraded"));
        assert!(out.log_lines[0].contains("error=connection"));
    }

    #[test]
    fn at_reg_flow_05_reused_device_is_rejected() {
        let mut repo = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
        repo.associate(
            &AccountId::new("auth0|old1").unwrap(),
            &VisitorId::new("V4").unwrap(),
        )
        .unwrap();
        let out = wiring()
            .run(
                &event(Some("V4"), Some("R4")),
                &fetcher_with("V4", BotVerdict::NotDetected),
                &mut repo,
            )
            .unwrap();
        let FlowCommand::Deny { reason_code, .. } = out.command else {
            panic!("expected deny command");
        };
        assert_eq!(reason_code, "max_device_limit");
        assert!(!repo
            .contains(
                &AccountId::new("auth0|new1").unwrap(),
                &VisitorId::new("V4").unwrap()
            )
            .unwrap());
    }
}
