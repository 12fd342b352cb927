use std::collections::BTreeMap;
use std::sync::Arc;

use openerp_query::{EntitySchema, Record};

use crate::error::DataError;
use crate::relations::Relations;

/// One registered entity kind.
#[derive(Debug)]
pub struct EntityEntry {
    pub schema: Arc<EntitySchema>,
    pub relations: Relations,
}

/// Entity kinds known to the engine. Built once, then shared read-only.
#[derive(Debug, Default)]
pub struct Registry {
    entries: BTreeMap<String, EntityEntry>,
}

impl Registry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn entry(&self, kind: &str) -> Result<&EntityEntry, DataError> {
        self.entries
            .get(kind)
            .ok_or_else(|| DataError::UnknownEntity(kind.to_string()))
    }

    pub fn schema(&self, kind: &str) -> Result<&Arc<EntitySchema>, DataError> {
        self.entry(kind).map(|e| &e.schema)
    }

    pub fn relations(&self, kind: &str) -> Result<&Relations, DataError> {
        self.entry(kind).map(|e| &e.relations)
    }

    /// Empty record of `kind`.
    pub fn new_record(&self, kind: &str) -> Result<Record, DataError> {
        Ok(self.schema(kind)?.new_record())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Default)]
pub struct RegistryBuilder {
    entries: BTreeMap<String, EntityEntry>,
}

impl RegistryBuilder {
    /// Register a kind. A later registration of the same kind replaces it.
    pub fn entity(mut self, schema: Arc<EntitySchema>, relations: Relations) -> Self {
        self.entries
            .insert(schema.kind().to_string(), EntityEntry { schema, relations });
        self
    }

    /// Check every link against the registered schemas and freeze.
    pub fn build(self) -> Result<Arc<Registry>, DataError> {
        let registry = Registry {
            entries: self.entries,
        };
        for (kind, entry) in &registry.entries {
            validate(&registry, kind, entry)?;
        }
        Ok(Arc::new(registry))
    }
}

fn linked<'a>(
    registry: &'a Registry,
    kind: &str,
    other: &str,
    link: &str,
) -> Result<&'a Arc<EntitySchema>, DataError> {
    registry
        .schema(other)
        .map_err(|_| DataError::Registry(format!("{kind}.{link}: unknown entity '{other}'")))
}

fn validate(registry: &Registry, kind: &str, entry: &EntityEntry) -> Result<(), DataError> {
    let stored = |schema: &EntitySchema, attribute: &str, link: &str| -> Result<(), DataError> {
        schema
            .require(attribute)
            .map(|_| ())
            .map_err(|e| DataError::Registry(format!("{kind}.{link}: {e}")))
    };
    let this = &entry.schema;
    let relations = &entry.relations;

    for p in &relations.parents {
        let parent = linked(registry, kind, &p.entity, &p.name)?;
        stored(this, &p.foreign_key, &p.name)?;
        if let Some(key) = &p.parent_key {
            stored(parent, key, &p.name)?;
        }
        if this.field(&p.name).is_some_and(|f| !f.ty.is_virtual()) {
            return Err(DataError::Registry(format!(
                "{kind}.{}: parent attribute would shadow a stored attribute",
                p.name
            )));
        }
    }
    for c in &relations.children {
        let child = linked(registry, kind, &c.entity, &c.name)?;
        stored(child, &c.foreign_key, &c.name)?;
        if let Some(key) = &c.master_key {
            stored(this, key, &c.name)?;
        }
    }
    for m in &relations.multiselects {
        let link = linked(registry, kind, &m.link_entity, &m.name)?;
        stored(link, &m.master_key, &m.name)?;
        stored(link, &m.detail_key, &m.name)?;
    }
    for r in &relations.cascades {
        let child = linked(registry, kind, &r.entity, &r.name)?;
        stored(this, &r.primary_key, &r.name)?;
        stored(child, &r.foreign_key, &r.name)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::relations::CascadeRule;
    use openerp_query::{FieldDef, FieldType};

    fn order() -> Arc<EntitySchema> {
        EntitySchema::builder("order", "orders")
            .field(FieldDef::new("id", FieldType::Long))
            .field(FieldDef::new("customer_id", FieldType::Long))
            .build()
            .unwrap()
    }

    fn line() -> Arc<EntitySchema> {
        EntitySchema::builder("order_line", "order_lines")
            .field(FieldDef::new("id", FieldType::Long))
            .field(FieldDef::new("order_id", FieldType::Long))
            .build()
            .unwrap()
    }

    #[test]
    fn lookups() {
        let registry = Registry::builder()
            .entity(order(), Relations::new().child("lines", "order_line", "order_id"))
            .entity(line(), Relations::new().parent("order", "order", "order_id"))
            .build()
            .unwrap();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.schema("order").unwrap().table(), "orders");
        assert_eq!(registry.relations("order").unwrap().children.len(), 1);
        assert_eq!(registry.new_record("order_line").unwrap().kind(), "order_line");
        assert!(matches!(registry.schema("nope"), Err(DataError::UnknownEntity(_))));
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["order", "order_line"]);
    }

    #[test]
    fn build_rejects_dangling_links() {
        let err = Registry::builder()
            .entity(order(), Relations::new().child("lines", "order_line", "order_id"))
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("unknown entity 'order_line'"));

        let err = Registry::builder()
            .entity(order(), Relations::new().child("lines", "order_line", "master"))
            .entity(line(), Relations::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("order.lines"));

        let err = Registry::builder()
            .entity(
                order(),
                Relations::new().cascade(CascadeRule {
                    name: "lines".into(),
                    entity: "order_line".into(),
                    primary_key: "code".into(),
                    foreign_key: "order_id".into(),
                    delete: true,
                    active: true,
                }),
            )
            .entity(line(), Relations::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("code"));

        let err = Registry::builder()
            .entity(line(), Relations::new().parent("order_id", "order", "order_id"))
            .entity(order(), Relations::new())
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("shadow"));
    }
}
