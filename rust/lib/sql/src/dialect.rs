//! Backend SQL touch-points.
//!
//! Statement assembly is backend-neutral except for the handful of
//! expressions below. Each backend overrides what differs; everything
//! else (clause order, placeholders, quoting rules) is shared.

use std::sync::Arc;

/// Calendar component extracted by date-part comparisons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Day,
    Month,
    Year,
}

impl DatePart {
    pub fn keyword(&self) -> &'static str {
        match self {
            DatePart::Day => "DAY",
            DatePart::Month => "MONTH",
            DatePart::Year => "YEAR",
        }
    }
}

pub trait Dialect: Send + Sync {
    fn name(&self) -> &'static str;

    /// Expression evaluating to the current timestamp.
    fn current_timestamp(&self) -> &'static str;

    /// Query returning the next identity value in a column named `next_id`.
    fn next_identity(&self, table: &str, id_column: &str, sequence: Option<&str>) -> String;

    /// Wrap a bound WKT placeholder into a geometry constructor.
    fn geometry_from_text(&self, placeholder: &str) -> String {
        format!("ST_GeomFromText({placeholder})")
    }

    /// Render a geometry column as WKT text.
    fn geometry_as_text(&self, column: &str) -> String {
        format!("ST_AsText({column})")
    }

    /// Restrict `sql` to rows `start..=end` (1-based).
    fn paginate(&self, sql: &str, start: u64, end: u64) -> String {
        let start = start.max(1);
        // LIMIT is a signed 64-bit value on both backends.
        let count = end.saturating_add(1).saturating_sub(start).min(i64::MAX as u64);
        format!("{sql} LIMIT {count} OFFSET {}", start - 1)
    }

    /// Ordering expression honouring the collation of `language`.
    /// `code` marks a code column whose display text is looked up first.
    fn locale_order(&self, column: &str, language: &str, code: bool) -> String;

    fn date_part(&self, part: DatePart, column: &str) -> String {
        format!("EXTRACT({} FROM {column})", part.keyword())
    }

    /// Full-text containment predicate consuming exactly one placeholder.
    fn full_text(&self, column: &str) -> String;
}

/// Keep language codes from smuggling SQL into ordering expressions.
fn sanitize_language(language: &str) -> String {
    let cleaned: String = language
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        "en".to_string()
    } else {
        cleaned
    }
}

/// Sequence-and-ROWNUM backend.
pub struct OracleDialect;

impl Dialect for OracleDialect {
    fn name(&self) -> &'static str {
        "oracle"
    }

    fn current_timestamp(&self) -> &'static str {
        "SYSTIMESTAMP"
    }

    fn next_identity(&self, table: &str, _id_column: &str, sequence: Option<&str>) -> String {
        match sequence {
            Some(seq) => format!("SELECT {seq}.NEXTVAL AS next_id FROM DUAL"),
            None => format!("SELECT {table}_SEQ.NEXTVAL AS next_id FROM DUAL"),
        }
    }

    fn geometry_from_text(&self, placeholder: &str) -> String {
        format!("SDO_UTIL.FROM_WKTGEOMETRY({placeholder})")
    }

    fn geometry_as_text(&self, column: &str) -> String {
        format!("SDO_UTIL.TO_WKTGEOMETRY({column})")
    }

    fn paginate(&self, sql: &str, start: u64, end: u64) -> String {
        format!(
            "SELECT * FROM (SELECT q__.*, ROWNUM AS rn__ FROM ({sql}) q__ WHERE ROWNUM <= {end}) WHERE rn__ >= {}",
            start.max(1)
        )
    }

    fn locale_order(&self, column: &str, language: &str, code: bool) -> String {
        let lang = sanitize_language(language).to_uppercase();
        if code {
            format!("NLSSORT(CODE_TEXT({column}, '{lang}'), 'NLS_SORT={lang}')")
        } else {
            format!("NLSSORT({column}, 'NLS_SORT={lang}')")
        }
    }

    fn full_text(&self, column: &str) -> String {
        format!("CONTAINS({column}, ?) > 0")
    }
}

pub struct PostgresDialect;

impl Dialect for PostgresDialect {
    fn name(&self) -> &'static str {
        "postgres"
    }

    fn current_timestamp(&self) -> &'static str {
        "CURRENT_TIMESTAMP"
    }

    fn next_identity(&self, table: &str, id_column: &str, sequence: Option<&str>) -> String {
        match sequence {
            Some(seq) => format!("SELECT nextval('{seq}') AS next_id"),
            None => format!("SELECT nextval('{table}_{id_column}_seq') AS next_id"),
        }
    }

    fn locale_order(&self, column: &str, language: &str, code: bool) -> String {
        let lang = sanitize_language(language);
        if code {
            format!("code_text({column}, '{lang}') COLLATE \"{lang}\"")
        } else {
            format!("{column} COLLATE \"{lang}\"")
        }
    }

    fn full_text(&self, column: &str) -> String {
        format!("to_tsvector({column}) @@ plainto_tsquery(?)")
    }
}

/// Embedded backend. Geometry is stored as WKT text, identities come
/// from `MAX(id) + 1` because SQLite has no sequences.
pub struct SqliteDialect;

impl Dialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn current_timestamp(&self) -> &'static str {
        "strftime('%Y-%m-%d %H:%M:%f', 'now')"
    }

    fn next_identity(&self, table: &str, id_column: &str, _sequence: Option<&str>) -> String {
        format!("SELECT COALESCE(MAX({id_column}), 0) + 1 AS next_id FROM {table}")
    }

    fn geometry_from_text(&self, placeholder: &str) -> String {
        placeholder.to_string()
    }

    fn geometry_as_text(&self, column: &str) -> String {
        column.to_string()
    }

    fn locale_order(&self, column: &str, _language: &str, _code: bool) -> String {
        format!("{column} COLLATE NOCASE")
    }

    fn date_part(&self, part: DatePart, column: &str) -> String {
        let fmt = match part {
            DatePart::Day => "%d",
            DatePart::Month => "%m",
            DatePart::Year => "%Y",
        };
        format!("CAST(strftime('{fmt}', {column}) AS INTEGER)")
    }

    fn full_text(&self, column: &str) -> String {
        format!("INSTR(LOWER({column}), LOWER(?)) > 0")
    }
}

/// Look a dialect up by its configured name.
pub fn dialect_for(name: &str) -> Option<Arc<dyn Dialect>> {
    match name.to_ascii_lowercase().as_str() {
        "sqlite" => Some(Arc::new(SqliteDialect)),
        "postgres" | "postgresql" => Some(Arc::new(PostgresDialect)),
        "oracle" => Some(Arc::new(OracleDialect)),
        _ => None,
    }
}
