//! Error types for the scope pipeline

use std::fmt;

/// Errors surfaced by the generator, queue setup and settings layers
#[derive(Debug, Clone, PartialEq)]
pub enum ScopeError {
    /// A configuration value was outside its accepted range
    InvalidConfig(String),

    /// The generator thread could not be spawned
    Spawn(String),

    /// The generator thread panicked before it could be joined
    WorkerPanicked,

    /// Settings could not be read or written
    Settings(String),
}

impl fmt::Display for ScopeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeError::InvalidConfig(msg) => write!(f, "Invalid configuration: {}", msg),
            ScopeError::Spawn(msg) => write!(f, "Failed to spawn generator thread: {}", msg),
            ScopeError::WorkerPanicked => write!(f, "Generator thread panicked"),
            ScopeError::Settings(msg) => write!(f, "Settings error: {}", msg),
        }
    }
}

impl std::error::Error for ScopeError {}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, ScopeError>;
