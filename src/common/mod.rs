//! Shared data model, error type and component contracts

pub mod channels;
pub mod errors;
pub mod precision;
pub mod traits;
pub mod types;
