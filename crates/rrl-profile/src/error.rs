//! Error types for profile integrity
//!
//! Repair absorbs bad input; these errors only surface when a repaired
//! profile still breaks an invariant, which points at a defect in repair
//! itself rather than at the caller's data.

/// Profile invariant violation
#[derive(Debug, thiserror::Error)]
pub enum IntegrityError {
    /// Identity is blank
    #[error("profile id is blank")]
    BlankId,

    /// Required scalar attribute is blank
    #[error("required field '{0}' is blank")]
    BlankField(&'static str),

    /// Structural descriptor is inconsistent
    #[error("invalid structural descriptor: {0}")]
    InvalidDescriptor(String),

    /// Audit metadata is inconsistent
    #[error("invalid audit metadata: {0}")]
    InvalidMetadata(String),

    /// Typed profile could not be converted for repair
    #[error("profile serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type alias for integrity operations
pub type IntegrityResult<T> = Result<T, IntegrityError>;
