//! # ideology_ledger
//!
//! Turns roll-call votes and per-bill political classifications into
//! per-legislator ideology profiles, ranks legislators within each policy
//! category, and summarizes the distributions for charting.
//!
//! ## Pipeline
//!
//! ```text
//! registry ──► identity ──┐
//! member_votes ──► ingest ┼──► ideology ──► ranking ──► legislator_profiles
//! bill_analyses ─► ingest ┘                                   │
//!                                                             ▼
//!                                         stats ──► aggregated_stats
//! ```
//!
//! Every run is keyed by a `spec_hash` built from the classification model,
//! schema version and filters, so results from different runs never mix.

pub mod api_types;
pub mod config;
pub mod error;
pub mod identity;
pub mod ideology;
pub mod ingest;
pub mod models;
pub mod orchestrator;
pub mod ranking;
pub mod spec;
pub mod stakeholders;
pub mod stats;
pub mod store;

pub use config::Config;
pub use error::{IdeologyError, Result};
pub use identity::IdentityMap;
pub use models::{BillClassification, CategoryField, CategoryScore, LegislatorProfile, LegislatorVoteLedger};
pub use orchestrator::{run_all_combinations, run_profiles, run_stakeholders, run_stats, RunOutcome, RunSummary};
pub use spec::{spec_hash, Chamber, Filters, Partition, SCHEMA_VERSION};
pub use store::{JsonDirStore, MemoryStore, RecordKey, RecordStore};
