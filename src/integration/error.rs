//! Error types for integration construction and execution.

use std::path::PathBuf;
use thiserror::Error;

/// Errors from building or running an integration.
#[derive(Error, Debug)]
pub enum IntegrationError {
    #[error("The integration '{kind}' does not exist")]
    UnknownIntegrationType { kind: String },

    #[error("The parameter {flag} ({name}) was not given for '{kind}'")]
    MissingParameter {
        kind: String,
        name: String,
        flag: String,
    },

    #[error("Flag {flag} has no value")]
    MissingValue { flag: String },

    #[error("Invalid value for {name}: {reason}")]
    InvalidParameter { name: String, reason: String },

    #[error("Failed to copy {file} to {destination}: {reason}")]
    CopyFailed {
        file: PathBuf,
        destination: PathBuf,
        reason: String,
    },
}
