#![forbid(unsafe_code)]

pub mod decision;
pub mod fingerprint_api;
pub mod risk;
pub mod secret_vault;
pub mod verifier;
