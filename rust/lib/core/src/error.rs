use thiserror::Error;

// ── Error codes ─────────────────────────────────────────────────────
//
// Stable, machine-readable identifiers. Callers match on these,
// never on the human-readable message string.

/// Stable error code constants.
pub mod error_code {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const CONFLICT: &str = "CONFLICT";
    pub const VALIDATION_FAILED: &str = "VALIDATION_FAILED";
    pub const SCHEMA: &str = "SCHEMA";
    pub const CONFIG: &str = "CONFIG";
    pub const INTERNAL: &str = "INTERNAL";
    pub const STORAGE_ERROR: &str = "STORAGE_ERROR";
}

// ── ServiceError ────────────────────────────────────────────────────

/// Unified error type shared by the storage, query and entity layers.
///
/// Only infrastructure failures travel through this type. Business
/// outcomes (stale token, nothing to update, no rights) are reported as
/// statuses by the entity layer and never become a `ServiceError`.
#[derive(Error, Debug)]
pub enum ServiceError {
    /// Referenced entity kind or attribute does not exist.
    #[error("{0}")]
    NotFound(String),

    /// Constraint violation reported by the backend.
    #[error("{0}")]
    Conflict(String),

    /// Input data is invalid.
    #[error("{0}")]
    Validation(String),

    /// Entity schema or relational metadata is inconsistent.
    #[error("{0}")]
    Schema(String),

    /// Configuration could not be read or parsed.
    #[error("{0}")]
    Config(String),

    /// Storage backend failure.
    #[error("{0}")]
    Storage(String),

    /// Unexpected internal error.
    #[error("{0}")]
    Internal(String),
}

impl ServiceError {
    /// Stable, machine-readable error code.
    pub fn error_code(&self) -> &'static str {
        match self {
            ServiceError::NotFound(_) => error_code::NOT_FOUND,
            ServiceError::Conflict(_) => error_code::CONFLICT,
            ServiceError::Validation(_) => error_code::VALIDATION_FAILED,
            ServiceError::Schema(_) => error_code::SCHEMA,
            ServiceError::Config(_) => error_code::CONFIG,
            ServiceError::Storage(_) => error_code::STORAGE_ERROR,
            ServiceError::Internal(_) => error_code::INTERNAL,
        }
    }

    /// JSON body used when the error crosses a process boundary.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "code": self.error_code(),
            "message": self.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_code_mapping() {
        assert_eq!(ServiceError::NotFound("x".into()).error_code(), "NOT_FOUND");
        assert_eq!(ServiceError::Conflict("x".into()).error_code(), "CONFLICT");
        assert_eq!(ServiceError::Validation("x".into()).error_code(), "VALIDATION_FAILED");
        assert_eq!(ServiceError::Schema("x".into()).error_code(), "SCHEMA");
        assert_eq!(ServiceError::Config("x".into()).error_code(), "CONFIG");
        assert_eq!(ServiceError::Storage("x".into()).error_code(), "STORAGE_ERROR");
        assert_eq!(ServiceError::Internal("x".into()).error_code(), "INTERNAL");
    }

    #[test]
    fn json_body_format() {
        let err = ServiceError::NotFound("entity 'invoice' not registered".into());
        let body = err.to_json();
        assert_eq!(body["code"], "NOT_FOUND");
        assert_eq!(body["message"], "entity 'invoice' not registered");
    }

    #[test]
    fn error_display_is_just_message() {
        assert_eq!(ServiceError::Storage("disk full".into()).to_string(), "disk full");
        assert_eq!(ServiceError::Schema("no identity".into()).to_string(), "no identity");
    }
}
