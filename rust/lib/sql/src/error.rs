use thiserror::Error;

/// Backend failure. Statement-level variants always carry the SQL text
/// that failed so callers can log it without re-assembling the query.
#[derive(Error, Debug)]
pub enum SQLError {
    #[error("query error: {message} [{sql}]")]
    Query { sql: String, message: String },

    #[error("execution error: {message} [{sql}]")]
    Execution { sql: String, message: String },

    #[error("connection error: {0}")]
    Connection(String),
}

impl SQLError {
    /// The failing statement, if the error came from one.
    pub fn statement(&self) -> Option<&str> {
        match self {
            SQLError::Query { sql, .. } | SQLError::Execution { sql, .. } => Some(sql),
            SQLError::Connection(_) => None,
        }
    }

    /// True when the backend rejected a write because of a constraint.
    pub fn is_constraint_violation(&self) -> bool {
        match self {
            SQLError::Execution { message, .. } => message.contains("constraint"),
            _ => false,
        }
    }
}
