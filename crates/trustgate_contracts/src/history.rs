#![forbid(unsafe_code)]

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::common::{validate_identifier_text, ContractViolation, Validate};
use crate::identity::VisitorId;

const ACCOUNT_ID_MAX_LEN: usize = 256;

/// Identity-platform account identifier (e.g. `auth0|5f7c8ec7c33c6c004bbafe82`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(raw: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = Self(raw.into());
        id.validate()?;
        Ok(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for AccountId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_identifier_text("account_id", &self.0, ACCOUNT_ID_MAX_LEN)
    }
}

/// Per-account device-trust state, read and written through the platform's
/// account-attribute bag. The associated id set only ever grows at this
/// layer; expiry, if any, is a platform policy applied elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountDeviceRecord {
    pub associated_visitor_ids: BTreeSet<VisitorId>,
    pub current_visitor_id: Option<VisitorId>,
    pub mfa_needed: bool,
    pub pending_mfa_challenge_issued: bool,
}

impl AccountDeviceRecord {
    pub fn contains(&self, visitor_id: &VisitorId) -> bool {
        self.associated_visitor_ids.contains(visitor_id)
    }

    /// Idempotent set union. Returns true only when the id was newly added.
    pub fn associate(&mut self, visitor_id: VisitorId) -> bool {
        self.associated_visitor_ids.insert(visitor_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn visitor(raw: &str) -> VisitorId {
        VisitorId::new(raw).unwrap()
    }

    #[test]
    fn at_history_01_associate_is_idempotent() {
        let mut record = AccountDeviceRecord::default();
        assert!(record.associate(visitor("V1")));
        assert!(!record.associate(visitor("V1")));
        assert_eq!(record.associated_visitor_ids.len(), 1);
        assert!(record.contains(&visitor("V1")));
    }

    #[test]
    fn at_history_02_record_set_only_grows() {
        let mut record = AccountDeviceRecord::default();
        record.associate(visitor("V1"));
        record.associate(visitor("V2"));
        record.associate(visitor("V1"));
        assert_eq!(record.associated_visitor_ids.len(), 2);
    }
}
