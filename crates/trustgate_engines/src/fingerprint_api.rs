#![forbid(unsafe_code)]

use std::env;
use std::time::Duration;

use serde_json::Value;

use trustgate_contracts::identity::{
    BotVerdict, IdentificationEvent, RequestId, SignalVerdict, VisitorId,
};
use trustgate_contracts::secrets::SecretId;

use crate::secret_vault::SecretVault;
use crate::verifier::{EventFetcher, FetchError};

/// Fingerprint Server API region. The key is region-scoped, so the region
/// must match the application the client SDK identified against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FingerprintRegion {
    Global,
    Eu,
    Ap,
}

impl FingerprintRegion {
    pub const fn events_base_url(self) -> &'static str {
        match self {
            Self::Global => "https://api.fpjs.io",
            Self::Eu => "https://eu.api.fpjs.io",
            Self::Ap => "https://ap.api.fpjs.io",
        }
    }

    fn from_env_value(raw: Option<String>) -> Self {
        match raw
            .as_deref()
            .map(str::trim)
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("eu") => Self::Eu,
            Some("ap") => Self::Ap,
            _ => Self::Global,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FingerprintApiConfig {
    pub region: FingerprintRegion,
    /// Full override of the events endpoint base, for self-hosted proxies.
    pub events_url_override: Option<String>,
    /// Explicit key; when absent the key resolves from the local secret
    /// vault (or TRUSTGATE_FINGERPRINT_API_KEY) at call time.
    pub api_key: Option<String>,
    pub timeout_ms: u32,
    pub user_agent: String,
    /// Canned response body for tests; bypasses the network and the key
    /// lookup entirely.
    pub fixture_json: Option<String>,
}

impl FingerprintApiConfig {
    pub fn from_env() -> Self {
        Self {
            region: FingerprintRegion::from_env_value(
                env::var("TRUSTGATE_FINGERPRINT_REGION").ok(),
            ),
            events_url_override: env::var("TRUSTGATE_FINGERPRINT_EVENTS_URL").ok(),
            api_key: None,
            timeout_ms: env::var("TRUSTGATE_FINGERPRINT_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .filter(|v| (100..=30_000).contains(v))
                .unwrap_or(3_000),
            user_agent: env::var("TRUSTGATE_HTTP_USER_AGENT")
                .unwrap_or_else(|_| "trustgate/1.0".to_string()),
            fixture_json: None,
        }
    }

    fn events_url(&self, request_id: &RequestId) -> String {
        let base = self
            .events_url_override
            .as_deref()
            .unwrap_or_else(|| self.region.events_base_url());
        format!("{}/events/{}", base.trim_end_matches('/'), request_id.as_str())
    }
}

/// Trusted-lookup client for identification events. One GET per decision,
/// no retries; the caller's policy decides what an outage means.
#[derive(Debug, Clone)]
pub struct FingerprintApiClient {
    config: FingerprintApiConfig,
}

impl FingerprintApiClient {
    pub fn new(config: FingerprintApiConfig) -> Self {
        Self { config }
    }

    pub fn from_env() -> Self {
        Self::new(FingerprintApiConfig::from_env())
    }

    fn resolve_api_key(&self) -> Result<String, FetchError> {
        if let Some(key) = self.config.api_key.as_deref() {
            return Ok(key.to_string());
        }
        if let Ok(key) = env::var("TRUSTGATE_FINGERPRINT_API_KEY") {
            let key = key.trim().to_string();
            if !key.is_empty() {
                return Ok(key);
            }
        }
        match SecretVault::default_local().resolve_secret(SecretId::FingerprintApiKey) {
            Ok(Some(key)) => Ok(key),
            _ => Err(FetchError::Transport {
                kind: "missing_api_key",
                http_status: None,
            }),
        }
    }

    fn fetch_body(&self, request_id: &RequestId) -> Result<Value, FetchError> {
        if let Some(fixture) = self.config.fixture_json.as_deref() {
            return serde_json::from_str(fixture).map_err(|_| FetchError::MalformedResponse);
        }

        let api_key = self.resolve_api_key()?;
        let timeout = Duration::from_millis(u64::from(self.config.timeout_ms).max(100));
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(timeout)
            .timeout_read(timeout)
            .timeout_write(timeout)
            .user_agent(&self.config.user_agent)
            .build();
        let response = agent
            .get(&self.config.events_url(request_id))
            .set("Accept", "application/json")
            .set("Auth-API-Key", &api_key)
            .call()
            .map_err(fetch_error_from_ureq)?;
        serde_json::from_reader(response.into_reader()).map_err(|_| FetchError::MalformedResponse)
    }
}

impl EventFetcher for FingerprintApiClient {
    fn fetch(&self, request_id: &RequestId) -> Result<IdentificationEvent, FetchError> {
        let body = self.fetch_body(request_id)?;
        parse_identification_event(request_id, &body)
    }
}

/// Decodes the Server API event body. The identification product is
/// mandatory; the licensed smart signals are optional and absent ones stay
/// absent rather than defaulting to a clear verdict.
pub fn parse_identification_event(
    request_id: &RequestId,
    body: &Value,
) -> Result<IdentificationEvent, FetchError> {
    let products = &body["products"];
    let visitor_id = products["identification"]["data"]["visitorId"]
        .as_str()
        .ok_or(FetchError::MalformedResponse)?;
    let visitor_id = VisitorId::new(visitor_id).map_err(|_| FetchError::MalformedResponse)?;

    let bot = BotVerdict::parse(products["botd"]["data"]["bot"]["result"].as_str());

    IdentificationEvent::v1(
        request_id.clone(),
        visitor_id,
        bot,
        signal_verdict(&products["ipBlocklist"]["data"]["result"]),
        signal_verdict(&products["virtualMachine"]["data"]["result"]),
        signal_verdict(&products["tor"]["data"]["result"]),
    )
    .map_err(|_| FetchError::MalformedResponse)
}

fn signal_verdict(raw: &Value) -> Option<SignalVerdict> {
    raw.as_bool().map(SignalVerdict::from_detected)
}

fn fetch_error_from_ureq(err: ureq::Error) -> FetchError {
    match err {
        ureq::Error::Status(404, _) => FetchError::NotFound,
        ureq::Error::Status(status, _) => FetchError::Transport {
            kind: "http_non_200",
            http_status: Some(status),
        },
        ureq::Error::Transport(transport) => {
            let combined = format!("{:?} {}", transport.kind(), transport);
            FetchError::Transport {
                kind: classify_transport_error_kind(&combined),
                http_status: None,
            }
        }
    }
}

fn classify_transport_error_kind(raw: &str) -> &'static str {
    let lower = raw.to_ascii_lowercase();
    if lower.contains("timeout") {
        "timeout"
    } else if lower.contains("tls") || lower.contains("ssl") {
        "tls"
    } else if lower.contains("dns") {
        "dns"
    } else if lower.contains("connection") || lower.contains("connect") {
        "connection"
    } else {
        "transport"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_EVENT_FIXTURE: &str = r#"{
        "products": {
            "identification": {
                "data": {
                    "visitorId": "V1abcDEF",
                    "requestId": "1658822355371.sdPVVg"
                }
            },
            "botd": {
                "data": { "bot": { "result": "bad" } }
            },
            "ipBlocklist": {
                "data": { "result": true }
            },
            "virtualMachine": {
                "data": { "result": false }
            }
        }
    }"#;

    fn fixture_client(fixture: &str) -> FingerprintApiClient {
        let mut config = FingerprintApiConfig {
            region: FingerprintRegion::Global,
            events_url_override: None,
            api_key: None,
            timeout_ms: 3_000,
            user_agent: "trustgate/1.0".to_string(),
            fixture_json: None,
        };
        config.fixture_json = Some(fixture.to_string());
        FingerprintApiClient::new(config)
    }

    fn request() -> RequestId {
        RequestId::new("1658822355371.sdPVVg").unwrap()
    }

    #[test]
    fn at_fp_01_full_fixture_parses_all_products() {
        let event = fixture_client(FULL_EVENT_FIXTURE).fetch(&request()).unwrap();
        assert_eq!(event.visitor_id.as_str(), "V1abcDEF");
        assert_eq!(event.bot, BotVerdict::Bad);
        assert_eq!(event.ip_blocklist, Some(SignalVerdict::Detected));
        assert_eq!(event.virtual_machine, Some(SignalVerdict::NotDetected));
        assert_eq!(event.tor, None, "unlicensed signal stays absent");
    }

    #[test]
    fn at_fp_02_missing_identification_product_is_malformed() {
        let out = fixture_client(r#"{"products": {"botd": {}}}"#).fetch(&request());
        assert_eq!(out, Err(FetchError::MalformedResponse));
    }

    #[test]
    fn at_fp_03_missing_botd_product_parses_as_unknown_verdict() {
        let fixture = r#"{
            "products": {
                "identification": { "data": { "visitorId": "V1" } }
            }
        }"#;
        let event = fixture_client(fixture).fetch(&request()).unwrap();
        assert_eq!(event.bot, BotVerdict::Unknown);
    }

    #[test]
    fn at_fp_04_invalid_fixture_json_is_malformed() {
        let out = fixture_client("{not json").fetch(&request());
        assert_eq!(out, Err(FetchError::MalformedResponse));
    }

    #[test]
    fn at_fp_05_events_url_follows_region_and_override() {
        let mut config = FingerprintApiConfig {
            region: FingerprintRegion::Eu,
            events_url_override: None,
            api_key: None,
            timeout_ms: 3_000,
            user_agent: "trustgate/1.0".to_string(),
            fixture_json: None,
        };
        assert_eq!(
            config.events_url(&request()),
            "https://eu.api.fpjs.io/events/1658822355371.sdPVVg"
        );
        config.events_url_override = Some("https://metrics.example.com/fp/".to_string());
        assert_eq!(
            config.events_url(&request()),
            "https://metrics.example.com/fp/events/1658822355371.sdPVVg"
        );
    }

    #[test]
    fn at_fp_06_region_parse_defaults_to_global() {
        assert_eq!(
            FingerprintRegion::from_env_value(Some("eu".to_string())),
            FingerprintRegion::Eu
        );
        assert_eq!(
            FingerprintRegion::from_env_value(Some("AP".to_string())),
            FingerprintRegion::Ap
        );
        assert_eq!(
            FingerprintRegion::from_env_value(Some("us".to_string())),
            FingerprintRegion::Global
        );
        assert_eq!(
            FingerprintRegion::from_env_value(None),
            FingerprintRegion::Global
        );
    }
}
