#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};

use trustgate_engines::decision::DecisionConfig;
use trustgate_engines::fingerprint_api::FingerprintApiClient;
use trustgate_os::{
    FlowCommand, LoginFlowEvent, LoginFlowWiring, RegistrationFlowEvent, RegistrationFlowWiring,
};
use trustgate_storage::{AttributeBagHistoryStore, InMemoryAccountStore};

#[derive(Debug, Clone, Deserialize)]
pub struct LoginHookRequest {
    pub account_id: String,
    pub visitor_id: Option<String>,
    pub request_id: Option<String>,
    pub enrolled_factor_count: u32,
    pub successful_login_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationHookRequest {
    pub account_id: String,
    pub visitor_id: Option<String>,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct HookResponse {
    pub status: String,
    pub command: String,
    pub reason_code: Option<String>,
    pub message: Option<String>,
    pub factor: Option<String>,
}

impl HookResponse {
    fn from_command(command: &FlowCommand) -> Self {
        match command {
            FlowCommand::Continue => Self {
                status: "ok".to_string(),
                command: "continue".to_string(),
                reason_code: None,
                message: None,
                factor: None,
            },
            FlowCommand::Deny {
                reason_code,
                message,
            } => Self {
                status: "ok".to_string(),
                command: "deny".to_string(),
                reason_code: Some((*reason_code).to_string()),
                message: Some(message.clone()),
                factor: None,
            },
            FlowCommand::ChallengeWith { factor } => Self {
                status: "ok".to_string(),
                command: "challenge".to_string(),
                reason_code: None,
                message: None,
                factor: Some(factor.as_str().to_string()),
            },
            FlowCommand::EnrollWith { factor } => Self {
                status: "ok".to_string(),
                command: "enroll".to_string(),
                reason_code: None,
                message: None,
                factor: Some(factor.as_str().to_string()),
            },
        }
    }

    pub fn invalid_input(reason: String) -> Self {
        Self {
            status: "error".to_string(),
            command: "none".to_string(),
            reason_code: Some("invalid_input".to_string()),
            message: Some(reason),
            factor: None,
        }
    }
}

/// Hook result plus the redacted log lines the caller should emit.
#[derive(Debug, Clone)]
pub struct HookOutcome {
    pub response: HookResponse,
    pub log_lines: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdapterHealthResponse {
    pub status: String,
    pub accounts: u64,
}

/// Hook-serving runtime: the two flow wirings over one shared fetcher and
/// one account store. The in-memory store stands in for the platform's
/// metadata service; swap the repo to integrate a real one.
pub struct AdapterRuntime {
    login: LoginFlowWiring,
    registration: RegistrationFlowWiring,
    fetcher: FingerprintApiClient,
    store: AttributeBagHistoryStore<InMemoryAccountStore>,
}

impl AdapterRuntime {
    pub fn default_from_env() -> Self {
        Self::with_parts(DecisionConfig::mvp_v1(), FingerprintApiClient::from_env())
    }

    pub fn with_parts(config: DecisionConfig, fetcher: FingerprintApiClient) -> Self {
        Self {
            login: LoginFlowWiring::new(config),
            registration: RegistrationFlowWiring::new(config),
            fetcher,
            store: AttributeBagHistoryStore::new(InMemoryAccountStore::new()),
        }
    }

    pub fn health_report(&self) -> AdapterHealthResponse {
        AdapterHealthResponse {
            status: "ok".to_string(),
            accounts: self.store.inner_ref().account_count(),
        }
    }

    pub fn run_login_hook(&mut self, request: &LoginHookRequest) -> HookOutcome {
        let event = LoginFlowEvent {
            account_id: request.account_id.clone(),
            visitor_id: request.visitor_id.clone(),
            request_id: request.request_id.clone(),
            enrolled_factor_count: request.enrolled_factor_count,
            successful_login_count: request.successful_login_count,
        };
        match self.login.run(&event, &self.fetcher, &mut self.store) {
            Ok(decision) => HookOutcome {
                response: HookResponse::from_command(&decision.command),
                log_lines: decision.log_lines,
            },
            Err(violation) => HookOutcome {
                response: HookResponse::invalid_input(violation.to_string()),
                log_lines: Vec::new(),
            },
        }
    }

    pub fn run_registration_hook(&mut self, request: &RegistrationHookRequest) -> HookOutcome {
        let event = RegistrationFlowEvent {
            account_id: request.account_id.clone(),
            visitor_id: request.visitor_id.clone(),
            request_id: request.request_id.clone(),
        };
        match self.registration.run(&event, &self.fetcher, &mut self.store) {
            Ok(decision) => HookOutcome {
                response: HookResponse::from_command(&decision.command),
                log_lines: decision.log_lines,
            },
            Err(violation) => HookOutcome {
                response: HookResponse::invalid_input(violation.to_string()),
                log_lines: Vec::new(),
            },
        }
    }
}
