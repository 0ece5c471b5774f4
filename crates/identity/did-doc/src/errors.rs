//! Error types for DID parsing and DID Document handling.

use thiserror::Error;

/// Errors that can occur when parsing or constructing a DID or DID URL
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DIDError {
    /// DID string does not start with "did:"
    #[error("DID must start with 'did:'")]
    MissingPrefix,
    /// Method name is invalid (empty or contains invalid characters)
    #[error("Invalid DID method: {0}")]
    InvalidMethod(String),
    /// Method-specific identifier is invalid
    #[error("Invalid method-specific ID: {0}")]
    InvalidMethodSpecificId(String),
    /// Path component is invalid per RFC 3986
    #[error("Invalid path: {0}")]
    InvalidPath(String),
    /// Query component is invalid per RFC 3986
    #[error("Invalid query: {0}")]
    InvalidQuery(String),
    /// Fragment component is invalid per RFC 3986
    #[error("Invalid fragment: {0}")]
    InvalidFragment(String),
    /// Value is neither an absolute DID URL nor a relative reference
    #[error("Invalid DID URL: {0}")]
    InvalidUrl(String),
}

/// Error type for everything above the identifier grammar: validation of
/// resources, indexing, dereferencing and building documents.
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The raw value does not have the shape required for `resource`.
    /// Every offending field is listed.
    #[error("Failed to deserialize {resource}: {}", .errors.join("; "))]
    Validation {
        resource: &'static str,
        errors: Vec<String>,
    },

    /// More than one verification material property was set
    #[error("Found properties {}; only one verification material is allowed", .found.join(", "))]
    MaterialArity { found: Vec<String> },

    /// Material was requested from a method that carries none
    #[error("Verification material is not known for this method")]
    MaterialUnknown,

    /// Two different resources claim the same absolute ID
    #[error("ID {0} already found in index and items do not match")]
    IdentifiedResourceMismatch(String),

    /// Dereference target is not part of the document
    #[error("ID {0} not found in document")]
    IDNotFound(String),

    /// Resource exists but does not satisfy the requested type
    #[error("Resource {id} is not a valid {expected}: {reason}")]
    TypeMismatch {
        id: String,
        expected: &'static str,
        reason: String,
    },

    /// Builder API used incorrectly
    #[error("Builder error: {0}")]
    Builder(String),

    /// Identifier failed to parse
    #[error("DID error: {0}")]
    DID(#[from] DIDError),

    /// JSON text could not be read or written
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DocumentError {
    /// Single-field validation failure
    pub fn validation(resource: &'static str, error: impl Into<String>) -> Self {
        DocumentError::Validation {
            resource,
            errors: vec![error.into()],
        }
    }
}
