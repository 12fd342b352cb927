use super::QueryBuilder;
use crate::error::QueryError;
use crate::params::QueryParams;

impl QueryBuilder {
    /// ORDER BY body, or None when no sort was requested.
    pub(crate) fn order_by(&self, params: &QueryParams) -> Result<Option<String>, QueryError> {
        let Some(sort) = &params.sort else {
            return Ok(None);
        };

        let mut parts = Vec::with_capacity(sort.fields.len());
        for (index, raw) in sort.fields.iter().enumerate() {
            let field = raw.trim();
            if field.is_empty() {
                continue;
            }
            // Literal expressions already carry their direction.
            if field.contains(' ') {
                parts.push(field.to_string());
                continue;
            }

            let direction = sort.direction(index).keyword();
            let language = params.user.language.as_str();
            let expr = if let Some(inner) = call_argument(field, "codetext") {
                let column = self.qualify(self.schema.require(inner)?, params);
                self.dialect().locale_order(&column, language, true)
            } else if let Some(inner) = call_argument(field, "text") {
                let column = self.qualify(self.schema.require(inner)?, params);
                self.dialect().locale_order(&column, language, false)
            } else {
                self.qualify(self.schema.require(field)?, params)
            };
            parts.push(format!("{expr} {direction}"));
        }

        Ok(if parts.is_empty() {
            None
        } else {
            Some(parts.join(", "))
        })
    }
}

/// `name(arg)` → `arg`, matching `name` case-insensitively.
fn call_argument<'a>(field: &'a str, name: &str) -> Option<&'a str> {
    let head = field.get(..name.len())?;
    if !head.eq_ignore_ascii_case(name) {
        return None;
    }
    field[name.len()..]
        .strip_prefix('(')?
        .strip_suffix(')')
        .map(str::trim)
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::*;
    use super::*;
    use crate::params::{Orientation, SortSpec};
    use openerp_core::UserContext;

    #[test]
    fn literal_fields_pass_through() {
        let params = QueryParams::new().sort(SortSpec::new(["age DESC", "name"], Orientation::Ascending));
        assert_eq!(
            oracle(person()).order_by(&params).unwrap().as_deref(),
            Some("age DESC, name ASC")
        );
    }

    #[test]
    fn locale_aware_ordering_uses_user_language() {
        let params = QueryParams::new()
            .user(UserContext::new("u1", "de"))
            .sort(SortSpec::new(["text(name)", "CodeText(code)"], Orientation::Descending));
        assert_eq!(
            oracle(person()).order_by(&params).unwrap().as_deref(),
            Some("NLSSORT(name, 'NLS_SORT=DE') DESC, NLSSORT(CODE_TEXT(code, 'DE'), 'NLS_SORT=DE') DESC")
        );
        assert_eq!(
            sqlite(person()).order_by(&params).unwrap().as_deref(),
            Some("name COLLATE NOCASE DESC, code COLLATE NOCASE DESC")
        );
    }

    #[test]
    fn attributes_map_to_columns() {
        let params = QueryParams::new().sort(SortSpec::new(["id"], Orientation::Ascending));
        assert_eq!(
            oracle(site()).order_by(&params).unwrap().as_deref(),
            Some("site_id ASC")
        );
        let params = QueryParams::new().sort(SortSpec::new(["nope"], Orientation::Ascending));
        assert!(oracle(site()).order_by(&params).is_err());
    }

    #[test]
    fn toggled_directions() {
        let sort = SortSpec::new(["age", "name"], Orientation::Descending).configured(
            vec![Orientation::Ascending, Orientation::Ascending],
            vec![true, false],
        );
        let params = QueryParams::new().sort(sort);
        assert_eq!(
            oracle(person()).order_by(&params).unwrap().as_deref(),
            Some("age DESC, name ASC")
        );
    }

    #[test]
    fn call_argument_parsing() {
        assert_eq!(call_argument("text(name)", "text"), Some("name"));
        assert_eq!(call_argument("TEXT( name )", "text"), Some("name"));
        assert_eq!(call_argument("textual", "text"), None);
        assert_eq!(call_argument("codetext(x)", "text"), None);
        assert_eq!(call_argument("te", "text"), None);
    }
}
