//! # Sentinela (Trust Decisions & Fraud Prevention)
//!
//! `sentinela` is the trust-decision authority sitting in front of sensitive
//! actions. For every admin dashboard entry and account registration it
//! decides whether to allow, challenge, or block the requester.
//!
//! ## Admin access pipeline
//!
//! Bearer credentials are resolved against the external identity store, then
//! combined with two oracle signals: an authoritative admin-eligibility check
//! and a privilege-escalation risk report. Confirmed admins are never blocked
//! on risk score alone; suspicious non-admins are. Every decision point
//! appends exactly one terminal audit record.
//!
//! ## Registration pipeline
//!
//! Candidate registrations run through field validation, a case-insensitive
//! uniqueness check, a per-IP quota oracle, and a fraud-pattern oracle, in
//! that order. Repeat or medium-risk IPs are funneled through a CAPTCHA
//! challenge; blocked and high-risk IPs are denied with a specific message.
//!
//! ## Degraded dependencies
//!
//! Non-critical oracles (risk scoring, fraud scoring) fall back to
//! conservative defaults when unavailable, so a single degraded dependency
//! can neither over-grant nor over-deny. Critical oracles (identity
//! resolution, admin eligibility) fail the request instead.

pub mod api;
pub mod cli;
pub mod continuity;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
