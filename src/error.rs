//! Error types for monkeybench
//!
//! One unified error for the harness and the reference engine, plus the
//! planner's own error enum which converts into it.

use thiserror::Error;

use crate::planner::PlanError;

/// Result type alias using BenchError
pub type Result<T> = std::result::Result<T, BenchError>;

/// Unified error type for harness and engine operations
#[derive(Debug, Error)]
pub enum BenchError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corruption: {0}")]
    Corruption(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Planner error: {0}")]
    Planner(#[from] PlanError),

    // -------------------------------------------------------------------------
    // Driver Errors
    // -------------------------------------------------------------------------
    /// An engine call failed; `op` names the call ("open", "put", ...)
    #[error("{op} error: {message}")]
    Engine { op: &'static str, message: String },

    #[error("Invalid phase transition: {from} -> {to}")]
    Phase {
        from: &'static str,
        to: &'static str,
    },
}

impl BenchError {
    /// Wrap an engine-side failure with the name of the call that produced it.
    pub fn engine(op: &'static str, err: impl std::fmt::Display) -> Self {
        BenchError::Engine {
            op,
            message: err.to_string(),
        }
    }

    /// True for errors caused by bad input rather than by the engine.
    pub fn is_config(&self) -> bool {
        matches!(
            self,
            BenchError::Config(_) | BenchError::Planner(_) | BenchError::Phase { .. }
        )
    }
}
