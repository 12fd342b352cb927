use openerp_query::{Criterion, FieldValue, QueryParams, Record, RowState};
use tracing::debug;

use crate::error::DataError;
use crate::outcome::{Outcome, Payload};
use crate::relations::ChildLink;
use crate::service::EntityService;

impl EntityService {
    /// Attach each configured parent under its link name, following the
    /// parents' own parents until `depth` levels are attached. Parents the
    /// caller cannot see are left out.
    pub fn load_parents(&self, record: &mut Record, depth: usize) -> Result<(), DataError> {
        if depth == 0 {
            return Ok(());
        }
        let relations = self.registry.relations(record.kind())?;
        for link in &relations.parents {
            let Some(key) = record.get(&link.foreign_key).filter(|v| !v.is_null()).cloned() else {
                continue;
            };
            let schema = self.schema(&link.entity)?;
            let parent = match &link.parent_key {
                None => self.dao.get(schema, Some(&key), &self.secured(&link.entity))?,
                Some(attribute) => {
                    let mut filter = schema.new_record();
                    filter.criterion(attribute, Criterion::Eq(key));
                    let params = self.secured(&link.entity).max_rows(1);
                    self.dao.list(&filter, &params)?
                }
            };
            let parent = match parent.payload {
                Payload::Record(r) => Some(*r),
                Payload::List(rows) => rows.into_iter().next(),
                _ => None,
            };
            if let Some(mut parent) = parent {
                self.readable(&mut parent);
                self.load_parents(&mut parent, depth - 1)?;
                record.set(&link.name, parent);
            }
        }
        Ok(())
    }

    /// Fill every child collection of `record` with the visible child rows.
    pub fn load_children(&self, record: &mut Record) -> Result<(), DataError> {
        let relations = self.registry.relations(record.kind())?;
        for link in &relations.children {
            let Some(master) = self.master_value(record, link) else {
                continue;
            };
            let mut filter = self.registry.new_record(&link.entity)?;
            filter.criterion(&link.foreign_key, Criterion::Eq(master));
            let params = self.secure(&link.entity, QueryParams::new().max_rows(0));
            let children = self.dao.list(&filter, &params)?.into_list().unwrap_or_default();
            let children: Vec<FieldValue> = children
                .into_iter()
                .map(|mut c| {
                    self.readable(&mut c);
                    FieldValue::from(c)
                })
                .collect();
            record.set(&link.name, children);
        }
        Ok(())
    }

    /// Write the child collections carried by `incoming` for the stored
    /// `master`. Rows are partitioned by state into a create batch, an
    /// update batch and a delete batch, run in that order; the first
    /// failing batch ends the operation. When `creating`, unchanged rows
    /// count as new. Returns the number of child rows written.
    pub fn save_children(&self, master: &Record, incoming: &Record, creating: bool) -> Result<Outcome, DataError> {
        let relations = self.registry.relations(master.kind())?;
        let mut total = 0;
        for link in &relations.children {
            let Some(FieldValue::List(items)) = incoming.get(&link.name) else {
                continue;
            };
            let Some(master_value) = self.master_value(master, link) else {
                continue;
            };

            let mut creates = Vec::new();
            let mut updates = Vec::new();
            let mut deletes = Vec::new();
            for item in items {
                let Some(child) = item.as_record() else {
                    continue;
                };
                if child.kind() != link.entity {
                    return Err(DataError::Registry(format!(
                        "{}.{}: expected {} rows, got {}",
                        master.kind(),
                        link.name,
                        link.entity,
                        child.kind()
                    )));
                }
                let mut child = child.clone();
                child.set(&link.foreign_key, master_value.clone());
                match child.state() {
                    RowState::New => creates.push(child),
                    RowState::Unchanged if creating => creates.push(child),
                    RowState::Modified => updates.push(child),
                    RowState::Deleted => deletes.push(child),
                    RowState::Unchanged => {}
                }
            }
            debug!(
                "EntityService: {}.{} create {} update {} delete {}",
                master.kind(),
                link.name,
                creates.len(),
                updates.len(),
                deletes.len()
            );

            for child in &creates {
                let outcome = self.create(child)?;
                if !outcome.is_ok() {
                    return Ok(outcome);
                }
                total += 1;
            }
            if !updates.is_empty() {
                let outcome = self.update_many(&updates)?;
                if !outcome.is_ok() {
                    return Ok(outcome);
                }
                total += outcome.as_count().unwrap_or(0);
            }
            for child in &deletes {
                let outcome = self.delete(child)?;
                if !outcome.is_ok() {
                    return Ok(outcome);
                }
                total += outcome.as_count().unwrap_or(0);
            }
        }
        Ok(Outcome::count(total))
    }

    /// Value of the master attribute a child link refers to.
    fn master_value(&self, master: &Record, link: &ChildLink) -> Option<FieldValue> {
        match &link.master_key {
            Some(key) => master.get(key).filter(|v| !v.is_null()).cloned(),
            None => master.id().cloned(),
        }
    }
}
