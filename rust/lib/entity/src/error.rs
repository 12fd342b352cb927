use thiserror::Error;

use openerp_query::QueryError;
use openerp_sql::SQLError;

/// Infrastructure failures of the data layer.
///
/// Business outcomes (not found, stale token, no rights) are not errors;
/// they travel in `Outcome`. Anything here aborts the operation.
#[derive(Debug, Error)]
pub enum DataError {
    /// Backend failure; carries the failing statement.
    #[error(transparent)]
    Sql(#[from] SQLError),

    #[error(transparent)]
    Query(#[from] QueryError),

    #[error("unknown entity: {0}")]
    UnknownEntity(String),

    #[error("registry: {0}")]
    Registry(String),

    #[error("loader: {0}")]
    Loader(String),

    #[error("identity: {0}")]
    Identity(String),

    #[error("config: {0}")]
    Config(String),
}

impl From<DataError> for openerp_core::ServiceError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::Sql(e) if e.is_constraint_violation() => {
                openerp_core::ServiceError::Conflict(e.to_string())
            }
            DataError::Sql(e) => openerp_core::ServiceError::Storage(e.to_string()),
            DataError::Query(e) => e.into(),
            DataError::UnknownEntity(m) => openerp_core::ServiceError::NotFound(m),
            DataError::Registry(m) | DataError::Loader(m) => openerp_core::ServiceError::Schema(m),
            DataError::Identity(m) => openerp_core::ServiceError::Internal(m),
            DataError::Config(m) => openerp_core::ServiceError::Config(m),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use openerp_core::ServiceError;

    #[test]
    fn service_error_mapping() {
        let sql = DataError::Sql(SQLError::Execution {
            sql: "INSERT INTO t VALUES (?)".into(),
            message: "UNIQUE constraint failed: t.id".into(),
        });
        let mapped: ServiceError = sql.into();
        assert_eq!(mapped.error_code(), "CONFLICT");
        assert!(mapped.to_string().contains("INSERT INTO t VALUES (?)"));

        let unknown: ServiceError = DataError::UnknownEntity("ghost".into()).into();
        assert_eq!(unknown.error_code(), "NOT_FOUND");
    }
}
