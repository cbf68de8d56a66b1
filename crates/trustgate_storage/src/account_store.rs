#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use serde_json::{json, Value};

use trustgate_contracts::history::{AccountDeviceRecord, AccountId};
use trustgate_contracts::identity::VisitorId;

use crate::repo::{AccountAttributeRepo, DeviceHistoryRepo, StorageError};

// Attribute keys keep the platform's camelCase metadata names so records
// written here stay readable by the surrounding identity platform.
pub const ATTR_VISITOR_IDS: &str = "visitorIds";
pub const ATTR_CURRENT_VISITOR_ID: &str = "currentVisitorId";
pub const ATTR_MFA_NEEDED: &str = "mfaNeeded";
pub const ATTR_PENDING_MFA_CHALLENGE_ISSUED: &str = "pendingMfaChallengeIssued";

/// Deterministic in-memory account-attribute bag. Reference implementation
/// for flows and tests, with per-operation failure injection so store
/// outages can be exercised without a live platform.
#[derive(Debug, Clone, Default)]
pub struct InMemoryAccountStore {
    accounts: BTreeMap<AccountId, BTreeMap<String, Value>>,
    failing_ops: BTreeSet<&'static str>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent `op` ("read" | "write" | "search") fail with
    /// `StorageError::Unavailable` until cleared.
    pub fn inject_failure(&mut self, op: &'static str) {
        self.failing_ops.insert(op);
    }

    pub fn clear_failure(&mut self, op: &'static str) {
        self.failing_ops.remove(op);
    }

    pub fn account_count(&self) -> u64 {
        self.accounts.len() as u64
    }

    fn check_available(&self, op: &'static str) -> Result<(), StorageError> {
        if self.failing_ops.contains(op) {
            return Err(StorageError::Unavailable { op });
        }
        Ok(())
    }
}

impl AccountAttributeRepo for InMemoryAccountStore {
    fn read_account_attribute(
        &self,
        account_id: &AccountId,
        key: &str,
    ) -> Result<Option<Value>, StorageError> {
        self.check_available("read")?;
        Ok(self
            .accounts
            .get(account_id)
            .and_then(|attrs| attrs.get(key))
            .cloned())
    }

    fn write_account_attribute(
        &mut self,
        account_id: &AccountId,
        key: &str,
        value: Value,
    ) -> Result<(), StorageError> {
        self.check_available("write")?;
        self.accounts
            .entry(account_id.clone())
            .or_default()
            .insert(key.to_string(), value);
        Ok(())
    }

    fn search_accounts_by_attribute(
        &self,
        key: &str,
        value: &Value,
    ) -> Result<Vec<AccountId>, StorageError> {
        self.check_available("search")?;
        let mut matches = Vec::new();
        for (account_id, attrs) in &self.accounts {
            let Some(attr) = attrs.get(key) else {
                continue;
            };
            let hit = match attr {
                Value::Array(items) => items.iter().any(|item| item == value),
                other => other == value,
            };
            if hit {
                matches.push(account_id.clone());
            }
        }
        Ok(matches)
    }
}

/// Device-history store backed by the platform's attribute bag. The
/// associated-id set round-trips through a JSON string array under
/// `visitorIds`; membership and union are computed over the decoded set so
/// the representation stays exact and duplicate-free.
#[derive(Debug, Clone)]
pub struct AttributeBagHistoryStore<R: AccountAttributeRepo> {
    inner: R,
}

impl<R: AccountAttributeRepo> AttributeBagHistoryStore<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn inner_ref(&self) -> &R {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    /// Assembles the full device record for one account from its attributes.
    pub fn record(&self, account_id: &AccountId) -> Result<AccountDeviceRecord, StorageError> {
        let associated_visitor_ids = self.read_visitor_id_set(account_id)?;
        let current_visitor_id = match self
            .inner
            .read_account_attribute(account_id, ATTR_CURRENT_VISITOR_ID)?
        {
            Some(Value::String(raw)) => Some(VisitorId::new(raw)?),
            Some(_) => {
                return Err(StorageError::CorruptAttribute {
                    key: ATTR_CURRENT_VISITOR_ID,
                })
            }
            None => None,
        };
        Ok(AccountDeviceRecord {
            associated_visitor_ids,
            current_visitor_id,
            mfa_needed: self.read_bool_attribute(account_id, ATTR_MFA_NEEDED)?,
            pending_mfa_challenge_issued: self
                .read_bool_attribute(account_id, ATTR_PENDING_MFA_CHALLENGE_ISSUED)?,
        })
    }

    fn read_visitor_id_set(
        &self,
        account_id: &AccountId,
    ) -> Result<BTreeSet<VisitorId>, StorageError> {
        match self
            .inner
            .read_account_attribute(account_id, ATTR_VISITOR_IDS)?
        {
            None => Ok(BTreeSet::new()),
            Some(Value::Array(items)) => {
                let mut set = BTreeSet::new();
                for item in items {
                    let Value::String(raw) = item else {
                        return Err(StorageError::CorruptAttribute {
                            key: ATTR_VISITOR_IDS,
                        });
                    };
                    set.insert(VisitorId::new(raw)?);
                }
                Ok(set)
            }
            Some(_) => Err(StorageError::CorruptAttribute {
                key: ATTR_VISITOR_IDS,
            }),
        }
    }

    fn write_visitor_id_set(
        &mut self,
        account_id: &AccountId,
        set: &BTreeSet<VisitorId>,
    ) -> Result<(), StorageError> {
        let items: Vec<Value> = set
            .iter()
            .map(|id| Value::String(id.as_str().to_string()))
            .collect();
        self.inner
            .write_account_attribute(account_id, ATTR_VISITOR_IDS, Value::Array(items))
    }

    fn read_bool_attribute(
        &self,
        account_id: &AccountId,
        key: &'static str,
    ) -> Result<bool, StorageError> {
        match self.inner.read_account_attribute(account_id, key)? {
            None => Ok(false),
            Some(Value::Bool(flag)) => Ok(flag),
            Some(_) => Err(StorageError::CorruptAttribute { key }),
        }
    }
}

impl<R: AccountAttributeRepo> DeviceHistoryRepo for AttributeBagHistoryStore<R> {
    fn contains(
        &self,
        account_id: &AccountId,
        visitor_id: &VisitorId,
    ) -> Result<bool, StorageError> {
        Ok(self.read_visitor_id_set(account_id)?.contains(visitor_id))
    }

    fn associate(
        &mut self,
        account_id: &AccountId,
        visitor_id: &VisitorId,
    ) -> Result<(), StorageError> {
        let mut set = self.read_visitor_id_set(account_id)?;
        if !set.insert(visitor_id.clone()) {
            // Already present: no write, so concurrent duplicate application
            // converges without churn.
            return Ok(());
        }
        self.write_visitor_id_set(account_id, &set)
    }

    fn count_accounts_with_visitor_id(
        &self,
        visitor_id: &VisitorId,
    ) -> Result<u64, StorageError> {
        let matches = self.inner.search_accounts_by_attribute(
            ATTR_VISITOR_IDS,
            &json!(visitor_id.as_str()),
        )?;
        Ok(matches.len() as u64)
    }

    fn set_current_visitor_id(
        &mut self,
        account_id: &AccountId,
        visitor_id: &VisitorId,
    ) -> Result<(), StorageError> {
        self.inner.write_account_attribute(
            account_id,
            ATTR_CURRENT_VISITOR_ID,
            json!(visitor_id.as_str()),
        )
    }

    fn set_mfa_needed(&mut self, account_id: &AccountId, needed: bool) -> Result<(), StorageError> {
        self.inner
            .write_account_attribute(account_id, ATTR_MFA_NEEDED, json!(needed))
    }

    fn set_pending_mfa_challenge_issued(
        &mut self,
        account_id: &AccountId,
        issued: bool,
    ) -> Result<(), StorageError> {
        self.inner.write_account_attribute(
            account_id,
            ATTR_PENDING_MFA_CHALLENGE_ISSUED,
            json!(issued),
        )
    }
}
