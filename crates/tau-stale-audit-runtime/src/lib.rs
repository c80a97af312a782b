//! Async runtime for the Tau stale-issue auditor.
//!
//! Wires the GitHub transport, the maintainer cache, per-issue analysis, the
//! audit tools exposed to the decision agent and the chunked batch
//! orchestration that drives a full repository audit.

mod audit_error;

pub mod api_call_counter;
pub mod audit_context;
pub mod audit_tools;
pub mod batch_orchestrator;
pub mod decision_agent;
pub mod github_api_client;
pub mod http_retry;
pub mod instruction_template;
pub mod issue_analyzer;
pub mod llm_decision_agent;
pub mod maintainer_directory;
pub mod stale_audit_runtime;

pub use audit_error::StaleAuditError;
