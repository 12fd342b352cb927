use openerp_core::UserContext;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Orientation {
    #[default]
    Ascending,
    Descending,
}

impl Orientation {
    pub fn invert(self) -> Self {
        match self {
            Orientation::Ascending => Orientation::Descending,
            Orientation::Descending => Orientation::Ascending,
        }
    }

    pub fn keyword(self) -> &'static str {
        match self {
            Orientation::Ascending => "ASC",
            Orientation::Descending => "DESC",
        }
    }
}

/// Requested ordering.
///
/// `fields` holds attribute names, `text(attr)` / `codetext(attr)` for
/// locale-aware ordering, or literal expressions containing a space
/// (e.g. `"age DESC"`) that are used verbatim. `orientations` and
/// `toggable` optionally configure each field; when they are present the
/// global `orientation` acts as a toggle relative to the first field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SortSpec {
    pub fields: Vec<String>,
    pub orientation: Orientation,
    pub orientations: Vec<Orientation>,
    pub toggable: Vec<bool>,
}

impl SortSpec {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>, orientation: Orientation) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            orientation,
            orientations: Vec::new(),
            toggable: Vec::new(),
        }
    }

    /// Per-field configured orientation and toggle flag.
    pub fn configured(mut self, orientations: Vec<Orientation>, toggable: Vec<bool>) -> Self {
        self.orientations = orientations;
        self.toggable = toggable;
        self
    }

    /// Direction of the field at `index`.
    pub fn direction(&self, index: usize) -> Orientation {
        if self.orientations.is_empty() && self.toggable.is_empty() {
            return self.orientation;
        }
        let configured = self
            .orientations
            .get(index)
            .copied()
            .unwrap_or(self.orientation);
        let toggable = self.toggable.get(index).copied().unwrap_or(true);
        let first = self.orientations.first().copied().unwrap_or(self.orientation);
        if !toggable || self.orientation == first {
            configured
        } else {
            configured.invert()
        }
    }
}

/// Auxiliary inputs to search, count and aggregate statements.
#[derive(Debug, Clone, Default)]
pub struct QueryParams {
    pub user: UserContext,
    pub sort: Option<SortSpec>,
    /// First row of the window, 1-based inclusive.
    pub start: Option<u64>,
    /// Last row of the window, inclusive.
    pub end: Option<u64>,
    /// Additional FROM tables.
    pub tables: Vec<String>,
    /// Join predicates, AND-ed into the WHERE clause.
    pub joins: Vec<String>,
    /// Row-visibility predicate.
    pub security: Option<String>,
    pub group_by: Option<String>,
    /// Attribute projection; all attributes when absent.
    pub attributes: Option<Vec<String>>,
    /// Per-call override of the configured row limit.
    pub max_rows: Option<usize>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn user(mut self, user: UserContext) -> Self {
        self.user = user;
        self
    }

    pub fn sort(mut self, sort: SortSpec) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn window(mut self, start: u64, end: u64) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn table(mut self, table: &str) -> Self {
        self.tables.push(table.to_string());
        self
    }

    pub fn join(mut self, predicate: &str) -> Self {
        self.joins.push(predicate.to_string());
        self
    }

    pub fn security(mut self, predicate: impl Into<String>) -> Self {
        self.security = Some(predicate.into());
        self
    }

    pub fn group_by(mut self, expr: &str) -> Self {
        self.group_by = Some(expr.to_string());
        self
    }

    pub fn attributes<S: Into<String>>(mut self, attributes: impl IntoIterator<Item = S>) -> Self {
        self.attributes = Some(attributes.into_iter().map(Into::into).collect());
        self
    }

    pub fn max_rows(mut self, max_rows: usize) -> Self {
        self.max_rows = Some(max_rows);
        self
    }

    /// Security predicate, ignoring blank strings.
    pub fn security_predicate(&self) -> Option<&str> {
        self.security.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}
