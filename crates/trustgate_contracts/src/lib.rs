#![forbid(unsafe_code)]

pub mod common;
pub mod decision;
pub mod history;
pub mod identity;
pub mod secrets;

pub use common::{ContractViolation, Validate};
