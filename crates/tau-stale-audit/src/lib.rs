//! Issue activity reconstruction for the Tau stale-issue auditor.
//! This crate decodes issue snapshots, rebuilds ordered activity timelines,
//! replays them into a current activity state and derives the fact sheet
//! consumed by the decision agent. Nothing here performs I/O.

pub mod audit_messages;
pub mod audit_policy;
pub mod github_transport_helpers;
pub mod issue_fact_sheet;
pub mod issue_history;
pub mod issue_replay;
pub mod issue_snapshot;
