//! Shared in-memory fixture for data layer and service tests.

use std::sync::Arc;

use openerp_core::{Authorizer, DataConfig, UserContext};
use openerp_query::{EntitySchema, FieldDef, FieldType, FieldValue, Record, TokenKind};
use openerp_sql::{RecordingStore, SQLStore, SqliteDialect, SqliteStore};

use crate::dao::DataAccess;
use crate::registry::Registry;
use crate::relations::{CascadeRule, Relations};
use crate::service::EntityService;

const DDL: &str = "
    CREATE TABLE dept (id INTEGER PRIMARY KEY, name TEXT, changed TEXT);
    CREATE TABLE person (
        id INTEGER PRIMARY KEY, full_name TEXT, age INTEGER, dept_id INTEGER,
        changed TEXT, changed_by TEXT
    );
    CREATE TABLE task (id INTEGER PRIMARY KEY, person_id INTEGER, title TEXT, done INTEGER, changed TEXT);
    CREATE TABLE note (id INTEGER PRIMARY KEY, task_id INTEGER, body TEXT);
    CREATE TABLE tag (id INTEGER PRIMARY KEY, label TEXT);
    CREATE TABLE person_tag (id INTEGER PRIMARY KEY, person_id INTEGER, tag_id INTEGER);
";

pub const T0: &str = "2026-01-01 00:00:00.000";

fn dept() -> Arc<EntitySchema> {
    EntitySchema::builder("dept", "dept")
        .field(FieldDef::new("id", FieldType::Long))
        .field(FieldDef::new("name", FieldType::String))
        .field(FieldDef::new("changed", FieldType::Timestamp))
        .token("changed", TokenKind::Timestamp)
        .build()
        .unwrap()
}

fn person() -> Arc<EntitySchema> {
    EntitySchema::builder("person", "person")
        .field(FieldDef::new("id", FieldType::Long))
        .field(FieldDef::new("name", FieldType::String).column("full_name"))
        .field(FieldDef::new("age", FieldType::Integer))
        .field(FieldDef::new("dept_id", FieldType::Long))
        .field(FieldDef::new("changed", FieldType::Timestamp))
        .field(FieldDef::new("changed_by", FieldType::String))
        .field(FieldDef::new("dept", FieldType::Record))
        .field(FieldDef::new("tasks", FieldType::List))
        .field(FieldDef::new("tags", FieldType::List))
        .token("changed", TokenKind::Timestamp)
        .modified_by("changed_by")
        .build()
        .unwrap()
}

fn task() -> Arc<EntitySchema> {
    EntitySchema::builder("task", "task")
        .field(FieldDef::new("id", FieldType::Long))
        .field(FieldDef::new("person_id", FieldType::Long))
        .field(FieldDef::new("title", FieldType::String))
        .field(FieldDef::new("done", FieldType::Boolean))
        .field(FieldDef::new("changed", FieldType::Timestamp))
        .token("changed", TokenKind::Timestamp)
        .build()
        .unwrap()
}

fn note() -> Arc<EntitySchema> {
    EntitySchema::builder("note", "note")
        .field(FieldDef::new("id", FieldType::Long))
        .field(FieldDef::new("task_id", FieldType::Long))
        .field(FieldDef::new("body", FieldType::String))
        .build()
        .unwrap()
}

fn simple(kind: &str, fields: &[(&str, FieldType)]) -> Arc<EntitySchema> {
    let mut builder = EntitySchema::builder(kind, kind);
    for (name, ty) in fields {
        builder = builder.field(FieldDef::new(name, *ty));
    }
    builder.build().unwrap()
}

pub fn registry() -> Arc<Registry> {
    Registry::builder()
        .entity(dept(), Relations::new())
        .entity(
            person(),
            Relations::new()
                .parent("dept", "dept", "dept_id")
                .child("tasks", "task", "person_id")
                .multiselect("tags", "person_tag", "person_id", "tag_id")
                .cascade(CascadeRule {
                    name: "tasks".into(),
                    entity: "task".into(),
                    primary_key: "id".into(),
                    foreign_key: "person_id".into(),
                    delete: true,
                    active: true,
                }),
        )
        .entity(
            task(),
            Relations::new().parent("person", "person", "person_id").cascade(CascadeRule {
                name: "notes".into(),
                entity: "note".into(),
                primary_key: "id".into(),
                foreign_key: "task_id".into(),
                delete: false,
                active: true,
            }),
        )
        .entity(note(), Relations::new())
        .entity(simple("tag", &[("id", FieldType::Long), ("label", FieldType::String)]), Relations::new())
        .entity(
            simple(
                "person_tag",
                &[
                    ("id", FieldType::Long),
                    ("person_id", FieldType::Long),
                    ("tag_id", FieldType::Long),
                ],
            ),
            Relations::new(),
        )
        .build()
        .unwrap()
}

pub struct Fixture {
    pub store: Arc<RecordingStore<SqliteStore>>,
    pub registry: Arc<Registry>,
    pub dao: DataAccess,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_config(&DataConfig::default())
    }

    pub fn with_config(config: &DataConfig) -> Self {
        let store = Arc::new(RecordingStore::new(SqliteStore::open_in_memory().unwrap()));
        store.exec_batch(DDL).unwrap();
        let shared: Arc<dyn SQLStore> = store.clone();
        let dao = DataAccess::new(shared, Arc::new(SqliteDialect), config);
        Self {
            store,
            registry: registry(),
            dao,
        }
    }

    /// Run seed statements without recording them.
    pub fn seed(&self, sql: &str) {
        self.store.inner().exec_batch(sql).unwrap();
    }

    pub fn schema(&self, kind: &str) -> &Arc<EntitySchema> {
        self.registry.schema(kind).unwrap()
    }

    pub fn record(&self, kind: &str) -> Record {
        self.registry.new_record(kind).unwrap()
    }

    pub fn service(&self, authorizer: Arc<dyn Authorizer>) -> EntityService {
        EntityService::new(
            self.registry.clone(),
            self.dao.clone(),
            authorizer,
            UserContext::new("tester", "en"),
            &DataConfig::default(),
        )
    }

    /// Values of `column` in `table`, ordered by id.
    pub fn column(&self, table: &str, column: &str) -> Vec<FieldValue> {
        let rows = self
            .store
            .inner()
            .query(&format!("SELECT {column} FROM {table} ORDER BY id"), &[])
            .unwrap();
        rows.iter()
            .map(|r| match r.first() {
                Some(openerp_sql::Value::Integer(i)) => FieldValue::Int(*i),
                Some(openerp_sql::Value::Text(s)) => FieldValue::Text(s.clone()),
                _ => FieldValue::Null,
            })
            .collect()
    }
}
