pub mod builder;
pub mod error;
pub mod operator;
pub mod params;
pub mod record;
pub mod schema;
pub mod value;

pub use builder::{
    AGGREGATE_COLUMN, Aggregate, Audit, COUNT_COLUMN, InsertColumns, QueryBuilder, Statement,
};
pub use error::QueryError;
pub use operator::{Clause, Criterion};
pub use params::{Orientation, QueryParams, SortSpec};
pub use record::{ChildFilter, FieldMap, OrGroup, RawFilter, Record, RowState};
pub use schema::{
    EntityDef, EntitySchema, EntitySchemaBuilder, FieldDef, FieldType, SearchMode, TokenDef, TokenKind,
};
pub use value::FieldValue;
