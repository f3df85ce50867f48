//! Trust & safety decision engine: content evaluation against scoped
//! AutoMod rules and an external classifier, a per-user trust ledger
//! recomputed from an append-only incident log, and a human-review queue
//! with bounded escalation.

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{Result, SafetyError};
