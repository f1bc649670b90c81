use thiserror::Error;

use crate::orchestrator::RunPhase;

/// Failures surfaced by deployments, ABI lookups and contract calls
#[derive(Debug, Error)]
pub enum OrchestrationError {
    #[error("Deployment of {contract} failed: {reason}")]
    Deployment { contract: String, reason: String },

    #[error("Could not resolve {contract}: {reason}")]
    Resolution { contract: String, reason: String },

    #[error("Query {method} failed: {reason}")]
    Query { method: String, reason: String },

    #[error("Transaction {method} failed: {reason}")]
    Transaction { method: String, reason: String },

    #[error("Could not encode or decode {method}: {reason}")]
    Encoding { method: String, reason: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Run cannot move from {from} to {to}")]
    InvalidPhase { from: RunPhase, to: RunPhase },
}

pub type Result<T> = std::result::Result<T, OrchestrationError>;
