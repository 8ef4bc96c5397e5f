//! Trust-decision core.
//!
//! The admin pipeline (identity verification, risk scoring, escalation
//! blocking) and the registration pipeline (uniqueness, per-IP quota,
//! fraud scoring, CAPTCHA gating), plus the rate limiter and the audit sink
//! both pipelines share.

pub mod access;
pub mod admin;
pub mod audit;
pub mod dashboard;
pub mod identity;
pub mod oracle;
pub mod rate_limit;
pub mod register;
pub mod registration;
pub mod state;
pub mod token;
pub mod types;
pub(crate) mod utils;

#[cfg(test)]
pub(crate) mod test_support;

pub use state::{TrustConfig, TrustState};
