#![forbid(unsafe_code)]

/// Closed registry of secrets the local vault may hold. Anything outside
/// this list is rejected at the vault boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecretId {
    FingerprintApiKey,
}

impl SecretId {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FingerprintApiKey => "fingerprint_api_key",
        }
    }

    pub const fn all() -> &'static [Self] {
        &[Self::FingerprintApiKey]
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "fingerprint_api_key" => Some(Self::FingerprintApiKey),
            _ => None,
        }
    }

    pub fn allowed_key_names() -> Vec<&'static str> {
        Self::all().iter().map(|id| id.as_str()).collect()
    }
}
