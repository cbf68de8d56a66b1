#![forbid(unsafe_code)]

pub mod account_store;
pub mod repo;

pub use account_store::{AttributeBagHistoryStore, InMemoryAccountStore};
pub use repo::{AccountAttributeRepo, DeviceHistoryRepo, StorageError};
