use serde_json::Value;

/// Operator keys understood by the discovery backend's query language.
pub mod op {
    pub const AND: &str = "$and";
    pub const OR: &str = "$or";
    pub const IN: &str = "$in";
    pub const REGEX: &str = "$regex";
    pub const OPTIONS: &str = "$options";
}

/// Field carrying the beam-time-request identifier on every dataset record.
pub const BTR_FIELD: &str = "btr";

/// One key of a filter document.
///
/// Every clause renders to exactly one `key: value` pair, so a document is an
/// ordered set of clauses with unique keys. Shapes the builder does not model
/// (`$gt`, `$exists`, nested objects with several operators, ...) are kept
/// verbatim in `Raw` so they survive a round trip untouched.
#[derive(Debug, Clone, PartialEq)]
pub enum Clause {
    /// `{field: value}` with a scalar or array value (implicit equality)
    Equals { field: String, value: Value },
    /// `{field: {"$in": [..]}}`
    In { field: String, values: Vec<Value> },
    /// `{field: {"$regex": pattern}}`, plus `"$options"` when set (`"i"` ignores case)
    Regex { field: String, pattern: String, options: Option<String> },
    /// `{"$and": [doc, ..]}`
    And(Vec<FilterExpression>),
    /// `{"$or": [doc, ..]}`
    Or(Vec<FilterExpression>),
    /// Any other `key: value` pair
    Raw { key: String, value: Value },
}

/// A filter document: an implicit conjunction of clauses.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterExpression {
    pub(crate) clauses: Vec<Clause>,
}

/// How `scope_filter` treats the caller's clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeMode {
    /// Structured query typed by the user; non-btr clauses are kept, the btr axis is narrowed.
    Search,
    /// Column filters from a table UI; the btr axis is always rebuilt from entitlements.
    Filter,
}

/// Entitlements of the calling user, resolved once per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntitlementContext {
    authorized_btrs: Vec<String>,
    pub has_elevated_access: bool,
}

impl EntitlementContext {
    pub fn new<I, S>(authorized_btrs: I, has_elevated_access: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut btrs: Vec<String> = Vec::new();
        for btr in authorized_btrs {
            let btr = btr.into();
            if !btrs.contains(&btr) {
                btrs.push(btr);
            }
        }
        Self { authorized_btrs: btrs, has_elevated_access }
    }

    /// Context with nothing authorized; used whenever the lookup fails.
    pub fn denied() -> Self {
        Self::default()
    }

    /// Context for deployments that do not scope queries at all.
    pub fn unrestricted() -> Self {
        Self { authorized_btrs: Vec::new(), has_elevated_access: true }
    }

    pub fn authorized_btrs(&self) -> &[String] {
        &self.authorized_btrs
    }
}
