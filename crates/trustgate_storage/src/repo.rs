#![forbid(unsafe_code)]

use serde_json::Value;

use trustgate_contracts::history::AccountId;
use trustgate_contracts::identity::VisitorId;
use trustgate_contracts::ContractViolation;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// The underlying store could not serve the operation (outage, timeout).
    /// Surfaced explicitly: an empty result and "store down" are different
    /// answers and the decision policy treats them differently.
    Unavailable { op: &'static str },
    /// A stored attribute did not round-trip to the expected shape.
    CorruptAttribute { key: &'static str },
    ContractViolation(ContractViolation),
}

impl std::fmt::Display for StorageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { op } => write!(f, "account store unavailable during {op}"),
            Self::CorruptAttribute { key } => write!(f, "corrupt account attribute {key}"),
            Self::ContractViolation(v) => write!(f, "storage contract violation: {v}"),
        }
    }
}

impl std::error::Error for StorageError {}

impl From<ContractViolation> for StorageError {
    fn from(v: ContractViolation) -> Self {
        Self::ContractViolation(v)
    }
}

impl StorageError {
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::Unavailable { .. } => "unavailable",
            Self::CorruptAttribute { .. } => "corrupt_attribute",
            Self::ContractViolation(_) => "contract_violation",
        }
    }
}

/// Generic account-metadata accessor the surrounding platform provides. The
/// bag is trusted and scoped to one account per key; values are JSON.
pub trait AccountAttributeRepo {
    fn read_account_attribute(
        &self,
        account_id: &AccountId,
        key: &str,
    ) -> Result<Option<Value>, StorageError>;

    fn write_account_attribute(
        &mut self,
        account_id: &AccountId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError>;

    /// Cross-account search: accounts whose attribute `key` equals `value`
    /// or whose attribute is an array containing `value`.
    fn search_accounts_by_attribute(
        &self,
        key: &str,
        value: &Value,
    ) -> Result<Vec<AccountId>, StorageError>;
}

/// The device-history surface the decision engine consumes. Every operation
/// may fail with `Unavailable`; none of them silently substitutes an empty
/// answer for a failed one.
pub trait DeviceHistoryRepo {
    fn contains(
        &self,
        account_id: &AccountId,
        visitor_id: &VisitorId,
    ) -> Result<bool, StorageError>;

    /// Idempotent set union; appending an already-present id is a no-op.
    fn associate(
        &mut self,
        account_id: &AccountId,
        visitor_id: &VisitorId,
    ) -> Result<(), StorageError>;

    fn count_accounts_with_visitor_id(
        &self,
        visitor_id: &VisitorId,
    ) -> Result<u64, StorageError>;

    fn set_current_visitor_id(
        &mut self,
        account_id: &AccountId,
        visitor_id: &VisitorId,
    ) -> Result<(), StorageError>;

    fn set_mfa_needed(
        &mut self,
        account_id: &AccountId,
        needed: bool,
    ) -> Result<(), StorageError>;

    fn set_pending_mfa_challenge_issued(
        &mut self,
        account_id: &AccountId,
        issued: bool,
    ) -> Result<(), StorageError>;
}
