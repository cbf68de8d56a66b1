#![forbid(unsafe_code)]

pub mod flow;
pub mod login;
pub mod redact;
pub mod registration;

pub use flow::{FlowCommand, FlowDecision};
pub use login::{LoginFlowEvent, LoginFlowWiring};
pub use registration::{RegistrationFlowEvent, RegistrationFlowWiring};
