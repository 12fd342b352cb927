pub mod dialect;
pub mod error;
pub mod recording;
pub mod sqlite;
pub mod traits;

pub use dialect::{DatePart, Dialect, OracleDialect, PostgresDialect, SqliteDialect, dialect_for};
pub use error::SQLError;
pub use recording::{LoggedStatement, RecordingStore, StatementKind};
pub use sqlite::SqliteStore;
pub use traits::{Row, SQLStore, Value};
