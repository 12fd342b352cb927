use super::QueryBuilder;
use crate::error::QueryError;
use crate::params::QueryParams;
use crate::schema::{FieldDef, FieldType};

impl QueryBuilder {
    /// SELECT list. Geometry cannot be fetched as a plain column, so when
    /// geometry is involved the list is spelled out: ordinary columns
    /// first, then geometry columns rendered as text, each group in
    /// declaration (or requested) order.
    pub(crate) fn projection(&self, params: &QueryParams) -> Result<String, QueryError> {
        let requested = params.attributes.as_ref().filter(|a| !a.is_empty());

        let fields: Vec<&FieldDef> = match requested {
            None if !self.schema.has_geometry() => {
                return Ok(if params.tables.is_empty() {
                    "*".to_string()
                } else {
                    format!("{}.*", self.schema.table())
                });
            }
            None => self.schema.stored_fields().collect(),
            Some(names) => names
                .iter()
                .map(|n| self.schema.require(n))
                .collect::<Result<_, _>>()?,
        };

        let (geometry, plain): (Vec<&FieldDef>, Vec<&FieldDef>) =
            fields.into_iter().partition(|f| f.ty == FieldType::Geometry);

        let mut columns = Vec::with_capacity(plain.len() + geometry.len());
        for field in plain {
            let column = self.qualify(field, params);
            if field.column_name() == field.name {
                columns.push(column);
            } else {
                columns.push(format!("{column} AS {}", field.name));
            }
        }
        for field in geometry {
            let column = self.qualify(field, params);
            columns.push(format!("{} AS {}", self.dialect().geometry_as_text(&column), field.name));
        }
        Ok(columns.join(", "))
    }
}
