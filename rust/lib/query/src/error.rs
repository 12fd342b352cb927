use thiserror::Error;

/// Failures while turning records into statements.
#[derive(Error, Debug)]
pub enum QueryError {
    #[error("schema error: {0}")]
    Schema(String),

    #[error("unknown attribute '{attribute}' on entity '{entity}'")]
    UnknownAttribute { entity: String, attribute: String },

    #[error("attribute '{attribute}': {reason}")]
    Value { attribute: String, reason: String },
}

impl QueryError {
    pub(crate) fn value(attribute: &str, reason: impl Into<String>) -> Self {
        QueryError::Value {
            attribute: attribute.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<QueryError> for openerp_core::ServiceError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Schema(m) => openerp_core::ServiceError::Schema(m),
            QueryError::UnknownAttribute { .. } => openerp_core::ServiceError::NotFound(e.to_string()),
            QueryError::Value { .. } => openerp_core::ServiceError::Validation(e.to_string()),
        }
    }
}
