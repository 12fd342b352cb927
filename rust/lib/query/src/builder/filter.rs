use std::collections::HashMap;

use openerp_sql::Value;

use super::QueryBuilder;
use crate::error::QueryError;
use crate::operator::{Clause, Criterion};
use crate::params::QueryParams;
use crate::record::Record;
use crate::value::FieldValue;

impl QueryBuilder {
    /// WHERE clause body (without the keyword) and its bind values.
    ///
    /// Contributions in order: raw fragment, OR-groups, child filters,
    /// plain attributes in schema order, security predicate, joins. The
    /// raw fragment and child-filter master values are taken out of the
    /// record so a reused filter does not apply them twice.
    pub(crate) fn where_clause(
        &self,
        filter: &mut Record,
        params: &QueryParams,
    ) -> Result<Clause, QueryError> {
        let mut conditions: Vec<String> = Vec::new();
        let mut binds: Vec<Value> = Vec::new();

        if let Some(raw) = filter.take_raw() {
            if !raw.sql.trim().is_empty() {
                conditions.push(format!("({})", raw.sql.trim()));
                binds.extend(raw.params);
            }
        }

        for group in filter.or_groups() {
            let mut alternatives = Vec::new();
            for (attribute, criterion) in group.members() {
                let Ok(field) = self.schema.require(attribute) else {
                    continue;
                };
                let clause = criterion.compile(&self.qualify(field, params), field, self.dialect())?;
                alternatives.push(clause.sql);
                binds.extend(clause.params);
            }
            if !alternatives.is_empty() {
                conditions.push(format!("({})", alternatives.join(" OR ")));
            }
        }

        let children = filter.child_filters().to_vec();
        let mut masters: HashMap<String, Option<FieldValue>> = HashMap::new();
        for child in &children {
            let master = child.master.as_deref().unwrap_or(self.schema.identity());
            let field = self.schema.require(master)?;
            let value = masters
                .entry(master.to_string())
                .or_insert_with(|| filter.remove(master).filter(|v| !v.is_null()))
                .clone();
            let column = self.qualify(field, params);
            match value {
                Some(value) => {
                    let bound = value
                        .to_sql()
                        .map_err(|_| QueryError::value(master, "child filter master must be a scalar"))?;
                    conditions.push(format!(
                        "{column} IN (SELECT {fk} FROM {table} WHERE {fk} = ?)",
                        fk = child.foreign_key,
                        table = child.table
                    ));
                    binds.push(bound);
                }
                None => conditions.push(format!(
                    "{column} IN (SELECT {} FROM {})",
                    child.foreign_key, child.table
                )),
            }
        }

        for field in self.schema.stored_fields() {
            let clause = if let Some(criterion) = filter.criteria().get(&field.name) {
                criterion.compile(&self.qualify(field, params), field, self.dialect())?
            } else if let Some(value) = filter.get(&field.name) {
                Criterion::Match(value.clone()).compile(&self.qualify(field, params), field, self.dialect())?
            } else {
                continue;
            };
            conditions.push(clause.sql);
            binds.extend(clause.params);
        }

        if let Some(security) = params.security_predicate() {
            conditions.push(format!("({security})"));
        }
        conditions.extend(join_predicates(params));

        Ok(Clause {
            sql: conditions.join(" AND "),
            params: binds,
        })
    }
}

/// Non-blank join predicates, each parenthesised so an `OR` inside one
/// cannot escape the surrounding conjunction.
pub(super) fn join_predicates(params: &QueryParams) -> impl Iterator<Item = String> + '_ {
    params
        .joins
        .iter()
        .map(|j| j.trim())
        .filter(|j| !j.is_empty())
        .map(|j| format!("({j})"))
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::super::count_placeholders;
    use super::super::fixtures::*;
    use crate::operator::Criterion;
    use crate::params::QueryParams;
    use crate::record::{ChildFilter, OrGroup};
    use crate::value::FieldValue;
    use openerp_sql::{DatePart, Value};

    #[test]
    fn assembly_order() {
        let b = oracle(person());
        let mut filter = person().new_record().with("id", 5).with("age", 40);
        filter
            .raw_filter("name <> ?", vec![Value::Text("x".into())])
            .or_group(
                OrGroup::new()
                    .with("code", Criterion::Eq("A".into()))
                    .with("ghost", Criterion::IsNull)
                    .with("code", Criterion::IsNull),
            )
            .has_children(ChildFilter::new("orders", "person_id"));
        let params = QueryParams::new().security("age > 0").join("1 = 1");

        let clause = b.where_clause(&mut filter, &params).unwrap();
        assert_eq!(
            clause.sql,
            "(name <> ?) AND (code = ? OR code IS NULL) AND id IN (SELECT person_id FROM orders WHERE person_id = ?) AND age = ? AND (age > 0) AND (1 = 1)"
        );
        assert_eq!(
            clause.params,
            vec![
                Value::Text("x".into()),
                Value::Text("A".into()),
                Value::Integer(5),
                Value::Integer(40),
            ]
        );

        // Raw fragment and master value were consumed.
        assert!(filter.take_raw().is_none());
        assert!(filter.get("id").is_none());
        let again = b.where_clause(&mut filter, &QueryParams::new()).unwrap();
        assert_eq!(
            again.sql,
            "(code = ? OR code IS NULL) AND id IN (SELECT person_id FROM orders) AND age = ?"
        );
    }

    #[test]
    fn raw_or_cannot_escape_security() {
        let b = sqlite(person());
        let mut filter = person().new_record();
        filter.raw_filter("age = ? OR age = ?", vec![Value::Integer(20), Value::Integer(99)]);
        let params = QueryParams::new()
            .security("age > 30")
            .join("1 = 0 OR 1 = 1")
            .join("  ");
        let clause = b.where_clause(&mut filter, &params).unwrap();
        assert_eq!(
            clause.sql,
            "(age = ? OR age = ?) AND (age > 30) AND (1 = 0 OR 1 = 1)"
        );
        assert_eq!(clause.params, vec![Value::Integer(20), Value::Integer(99)]);
    }

    #[test]
    fn child_filter_with_master_attribute() {
        let b = oracle(person());
        let mut filter = person().new_record().with("code", "K");
        filter.has_children(ChildFilter::new("tags", "person_code").master("code"));
        let clause = b.where_clause(&mut filter, &QueryParams::new()).unwrap();
        assert_eq!(
            clause.sql,
            "code IN (SELECT person_code FROM tags WHERE person_code = ?)"
        );
        assert_eq!(clause.params, vec![Value::Text("K".into())]);
    }

    #[test]
    fn explicit_criteria_override_values() {
        let b = oracle(person());
        let mut filter = person().new_record().with("age", 40);
        filter.criterion("age", Criterion::Lt(FieldValue::Int(30)));
        let clause = b.where_clause(&mut filter, &QueryParams::new()).unwrap();
        assert_eq!(clause.sql, "age < ?");
        assert_eq!(clause.params, vec![Value::Integer(30)]);
    }

    #[test]
    fn extra_tables_qualify_columns() {
        let b = oracle(person());
        let mut filter = person().new_record().with("code", "A");
        let params = QueryParams::new().table("dept").join("dept.id = person.dept_id");
        let clause = b.where_clause(&mut filter, &params).unwrap();
        assert_eq!(clause.sql, "person.code = ? AND (dept.id = person.dept_id)");
    }

    #[test]
    fn criterion_on_virtual_attribute_is_ignored() {
        let b = oracle(person());
        let mut filter = person().new_record();
        filter.criterion("orders", Criterion::IsNull);
        let clause = b.where_clause(&mut filter, &QueryParams::new()).unwrap();
        assert!(clause.sql.is_empty());
    }

    fn scalar() -> impl Strategy<Value = FieldValue> {
        prop_oneof![
            Just(FieldValue::Null),
            any::<i64>().prop_map(FieldValue::Int),
            "[a-z%']{0,6}".prop_map(FieldValue::Text),
        ]
    }

    fn leaf() -> impl Strategy<Value = Criterion> {
        prop_oneof![
            scalar().prop_map(Criterion::Match),
            scalar().prop_map(Criterion::Eq),
            scalar().prop_map(Criterion::Ne),
            any::<i64>().prop_map(|i| Criterion::Gt(FieldValue::Int(i))),
            "[a-z]{0,4}".prop_map(Criterion::StartsWithIgnoreCase),
            "[a-z%]{0,4}".prop_map(Criterion::Contains),
            prop::collection::vec(scalar().prop_filter("scalar", |v| !v.is_null()), 0..4)
                .prop_map(Criterion::In),
            prop::collection::vec(any::<i64>().prop_map(FieldValue::Int), 0..4).prop_map(Criterion::NotIn),
            Just(Criterion::IsNull),
            Just(Criterion::IsNotNull),
            Just(Criterion::InQuery("SELECT id FROM other".into())),
            (1i64..28).prop_map(|d| Criterion::DatePart(DatePart::Day, d)),
            "[a-z]{1,4}".prop_map(Criterion::FullText),
        ]
    }

    fn criterion() -> impl Strategy<Value = Criterion> {
        leaf().prop_recursive(3, 16, 4, |inner| {
            prop::collection::vec(inner, 0..4).prop_map(Criterion::Or)
        })
    }

    proptest! {
        #[test]
        fn placeholders_match_binds(
            name in criterion(),
            age in criterion(),
            group in prop::collection::vec(criterion(), 0..3),
            code in prop::option::of(scalar()),
        ) {
            let b = sqlite(person());
            let mut filter = person().new_record();
            filter.criterion("name", name.clone()).criterion("age", age.clone());
            let code_binds = code.clone().map_or(0, |c| Criterion::Match(c).placeholders());
            if let Some(code) = code {
                filter.set("code", code);
            }
            let mut or = OrGroup::new();
            for c in &group {
                or = or.with("name", c.clone());
            }
            filter.or_group(or);

            let clause = b.where_clause(&mut filter, &QueryParams::new()).unwrap();
            prop_assert_eq!(count_placeholders(&clause.sql), clause.params.len());

            let expected: usize = group.iter().map(Criterion::placeholders).sum::<usize>()
                + name.placeholders()
                + age.placeholders()
                + code_binds;
            prop_assert_eq!(clause.params.len(), expected);
        }
    }
}
