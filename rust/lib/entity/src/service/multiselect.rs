use tracing::debug;

use openerp_query::{Criterion, FieldValue, InsertColumns, QueryParams, Record};

use crate::error::DataError;
use crate::outcome::Outcome;
use crate::relations::MultiselectLink;
use crate::service::EntityService;

impl EntityService {
    /// Sync every multiselect whose list attribute `incoming` carries.
    /// Absent attributes are left alone; an empty list clears the links.
    pub(crate) fn sync_multiselects(&self, master: &Record, incoming: &Record) -> Result<Outcome, DataError> {
        let relations = self.registry.relations(master.kind())?;
        let mut total = 0;
        for link in &relations.multiselects {
            let Some(FieldValue::List(items)) = incoming.get(&link.name) else {
                continue;
            };
            let desired: Vec<FieldValue> = items
                .iter()
                .filter_map(|item| match item {
                    FieldValue::Record(r) => r.id().cloned(),
                    FieldValue::Null => None,
                    other => Some(other.clone()),
                })
                .collect();
            let outcome = self.sync_multiselect(master, link, &desired)?;
            if !outcome.is_ok() {
                return Ok(outcome);
            }
            total += outcome.as_count().unwrap_or(0);
        }
        Ok(Outcome::count(total))
    }

    /// Make the link rows of `master` under `link` match `desired`.
    ///
    /// Links whose detail key is not desired are deleted and desired keys
    /// without a link are created; links present on both sides are not
    /// touched. Returns the number of link rows written.
    pub fn sync_multiselect(
        &self,
        master: &Record,
        link: &MultiselectLink,
        desired: &[FieldValue],
    ) -> Result<Outcome, DataError> {
        let Some(master_id) = master.id() else {
            return Ok(Outcome::nothing_todo());
        };
        let schema = self.schema(&link.link_entity)?;
        let detail_type = schema.require(&link.detail_key)?.ty;
        let desired: Vec<FieldValue> = desired.iter().map(|v| detail_type.coerce(v.clone())).collect();

        let mut filter = schema.new_record();
        filter.criterion(&link.master_key, Criterion::Eq(master_id.clone()));
        let params = QueryParams::new().user(self.user.clone()).max_rows(0);
        let existing = self.dao.list(&filter, &params)?.into_list().unwrap_or_default();

        let mut stale = Vec::new();
        let mut present = Vec::new();
        for row in &existing {
            let detail = row.get(&link.detail_key).cloned().unwrap_or(FieldValue::Null);
            if desired.contains(&detail) {
                present.push(detail);
            } else {
                stale.push(row);
            }
        }
        let mut missing = Vec::new();
        for value in desired {
            if !present.contains(&value) && !missing.contains(&value) {
                missing.push(value);
            }
        }
        debug!(
            "EntityService: {}.{} remove {} add {}",
            master.kind(),
            link.name,
            stale.len(),
            missing.len()
        );

        let mut total = 0;
        for row in stale {
            let Some(id) = row.id() else {
                return Ok(Outcome::nothing_done());
            };
            let outcome = self.dao.delete(schema, id, None, &self.unsecured())?;
            match outcome.as_count() {
                Some(n) if n > 0 => total += n,
                _ => return Ok(Outcome::nothing_done()),
            }
        }
        for value in missing {
            let mut row = schema.new_record();
            row.set(&link.master_key, master_id.clone());
            row.set(&link.detail_key, value);
            let outcome = self.dao.create(&row, &InsertColumns::default(), &self.unsecured())?;
            if !outcome.is_ok() {
                return Ok(outcome);
            }
            total += 1;
        }
        Ok(Outcome::count(total))
    }
}
