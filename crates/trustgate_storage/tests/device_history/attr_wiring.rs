#![forbid(unsafe_code)]

use serde_json::{json, Value};

use trustgate_contracts::history::AccountId;
use trustgate_contracts::identity::VisitorId;
use trustgate_storage::account_store::{
    ATTR_CURRENT_VISITOR_ID, ATTR_MFA_NEEDED, ATTR_VISITOR_IDS,
};
use trustgate_storage::{
    AccountAttributeRepo, AttributeBagHistoryStore, DeviceHistoryRepo, InMemoryAccountStore,
    StorageError,
};

fn account(raw: &str) -> AccountId {
    AccountId::new(raw).unwrap()
}

fn visitor(raw: &str) -> VisitorId {
    VisitorId::new(raw).unwrap()
}

#[test]
fn history_writes_land_under_platform_attribute_keys() {
    let mut store = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
    let acct = account("auth0|wiring1");

    store.associate(&acct, &visitor("V1")).unwrap();
    store.set_current_visitor_id(&acct, &visitor("V1")).unwrap();
    store.set_mfa_needed(&acct, true).unwrap();

    let bag = store.inner_ref();
    assert_eq!(
        bag.read_account_attribute(&acct, ATTR_VISITOR_IDS).unwrap(),
        Some(json!(["V1"]))
    );
    assert_eq!(
        bag.read_account_attribute(&acct, ATTR_CURRENT_VISITOR_ID)
            .unwrap(),
        Some(json!("V1"))
    );
    assert_eq!(
        bag.read_account_attribute(&acct, ATTR_MFA_NEEDED).unwrap(),
        Some(json!(true))
    );
}

#[test]
fn associate_twice_writes_a_single_element_array() {
    let mut store = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
    let acct = account("auth0|wiring2");

    store.associate(&acct, &visitor("V1")).unwrap();
    store.associate(&acct, &visitor("V1")).unwrap();

    let stored = store
        .inner_ref()
        .read_account_attribute(&acct, ATTR_VISITOR_IDS)
        .unwrap();
    assert_eq!(stored, Some(json!(["V1"])));
}

#[test]
fn preexisting_platform_array_is_read_as_a_set() {
    let mut bag = InMemoryAccountStore::new();
    let acct = account("auth0|wiring3");
    // Metadata written by an earlier platform action, duplicates included.
    bag.write_account_attribute(&acct, ATTR_VISITOR_IDS, json!(["V2", "V1", "V2"]))
        .unwrap();

    let store = AttributeBagHistoryStore::new(bag);
    assert!(store.contains(&acct, &visitor("V1")).unwrap());
    assert!(store.contains(&acct, &visitor("V2")).unwrap());
    let record = store.record(&acct).unwrap();
    assert_eq!(record.associated_visitor_ids.len(), 2);
}

#[test]
fn write_outage_surfaces_from_associate() {
    let mut store = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
    let acct = account("auth0|wiring4");
    store.inner_mut().inject_failure("write");

    let err = store.associate(&acct, &visitor("V1")).unwrap_err();
    assert_eq!(err, StorageError::Unavailable { op: "write" });

    store.inner_mut().clear_failure("write");
    store.associate(&acct, &visitor("V1")).unwrap();
    assert!(store.contains(&acct, &visitor("V1")).unwrap());
}

#[test]
fn search_outage_surfaces_from_reuse_count() {
    let mut store = AttributeBagHistoryStore::new(InMemoryAccountStore::new());
    store
        .associate(&account("auth0|wiring5"), &visitor("V1"))
        .unwrap();
    store.inner_mut().inject_failure("search");

    let err = store
        .count_accounts_with_visitor_id(&visitor("V1"))
        .unwrap_err();
    assert_eq!(err, StorageError::Unavailable { op: "search" });
}

#[test]
fn scalar_attribute_equality_search_still_matches() {
    let mut bag = InMemoryAccountStore::new();
    let acct = account("auth0|wiring6");
    bag.write_account_attribute(&acct, ATTR_CURRENT_VISITOR_ID, json!("V7"))
        .unwrap();

    let matches = bag
        .search_accounts_by_attribute(ATTR_CURRENT_VISITOR_ID, &Value::String("V7".into()))
        .unwrap();
    assert_eq!(matches, vec![acct]);
}
