//! Plugin error types

use thiserror::Error;

use crate::db::InvalidConnectionUrl;
use crate::host::HostError;

/// Everything that can fail a registration
#[derive(Debug, Error)]
pub enum PluginError {
    /// Options have the wrong shape or types
    #[error("Invalid plugin options: \"{field}\" {message}")]
    Validation { field: String, message: String },

    /// Entries disagree on how they want to be decorated
    #[error("You cannot mix different types of decorate options")]
    MixedDecoration,

    /// A connection string lacks a host or a path
    #[error(transparent)]
    InvalidConnectionUrl(#[from] InvalidConnectionUrl),

    /// The driver could not open a pool
    #[error("Failed to create MySQL pool for {identity}")]
    DriverConnection {
        identity: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error(transparent)]
    Host(#[from] HostError),
}

impl PluginError {
    pub(crate) fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub(crate) fn driver(identity: impl Into<String>, source: anyhow::Error) -> Self {
        Self::DriverConnection {
            identity: identity.into(),
            source: source.into(),
        }
    }
}
