use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
/// Enumerates supported `StaleAuditError` values.
pub enum StaleAuditError {
    #[error("invalid configuration: {0}")]
    Config(String),
    #[error("github api {operation} request failed: {message}")]
    Network { operation: String, message: String },
    #[error("github api {operation} failed with status {status}: {body}")]
    HttpStatus {
        operation: String,
        status: u16,
        body: String,
    },
    #[error("failed to decode {operation} response: {message}")]
    Format { operation: String, message: String },
    #[error("GraphQL Error: {0}")]
    GraphQl(String),
    #[error("Issue #{0} not found.")]
    NotFound(u64),
    #[error("maintainer verification failed: {0}")]
    Authority(String),
    #[error("decision agent error: {0}")]
    Agent(String),
}
