use serde_json::Value;

use super::btrs::intersect_btrs;
use super::types::{op, Clause, EntitlementContext, FilterExpression, ScopeMode, BTR_FIELD};
use crate::config::{Deployment, FrontendConfig};

/// Deployment-specific rule for narrowing a filter to a user's entitlements.
pub trait ScopeStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn scope(&self, input: FilterExpression, ctx: &EntitlementContext, mode: ScopeMode) -> FilterExpression;
}

/// Scoping by beam-time-request identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct BtrScope;

impl ScopeStrategy for BtrScope {
    fn name(&self) -> &'static str {
        "chess"
    }

    fn scope(&self, input: FilterExpression, ctx: &EntitlementContext, mode: ScopeMode) -> FilterExpression {
        if ctx.has_elevated_access {
            return input;
        }
        match mode {
            ScopeMode::Search => narrow_btrs(input, ctx.authorized_btrs()),
            ScopeMode::Filter => rebuild_with_btrs(input, ctx.authorized_btrs()),
        }
    }
}

/// Keep every clause the user wrote, only intersecting the btr axis with entitlements.
fn narrow_btrs(mut input: FilterExpression, authorized: &[String]) -> FilterExpression {
    let requested = input.get(BTR_FIELD).map(Clause::value);
    match requested {
        Some(requested) => {
            let btrs = intersect_btrs(&requested, authorized);
            input.insert(Clause::is_in(BTR_FIELD, btrs));
        }
        None if !authorized.is_empty() => {
            input.insert(Clause::is_in(BTR_FIELD, authorized.iter().cloned()));
        }
        None => {}
    }
    input
}

/// Drop whatever the UI said about btr and AND the remaining clauses with the entitled set.
fn rebuild_with_btrs(input: FilterExpression, authorized: &[String]) -> FilterExpression {
    let restriction = || FilterExpression::from(Clause::is_in(BTR_FIELD, authorized.iter().cloned()));

    let or_docs = match input.get(op::OR) {
        Some(Clause::Or(docs)) => Some(docs.clone()),
        _ => None,
    };

    let clauses: Vec<FilterExpression> = match or_docs {
        Some(docs) => docs.into_iter().filter(|doc| !doc.contains_key(BTR_FIELD)).collect(),
        None => input
            .into_clauses()
            .into_iter()
            .filter(|clause| clause.key() != BTR_FIELD)
            .map(FilterExpression::from)
            .collect(),
    };

    if clauses.is_empty() {
        return restriction();
    }
    FilterExpression::from(Clause::And(vec![FilterExpression::from(Clause::Or(clauses)), restriction()]))
}

/// Placeholder for the MagLab deployment: its authorization axis is not defined yet,
/// so filters pass through unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThroughScope;

impl ScopeStrategy for PassThroughScope {
    fn name(&self) -> &'static str {
        "maglab"
    }

    fn scope(&self, input: FilterExpression, _ctx: &EntitlementContext, _mode: ScopeMode) -> FilterExpression {
        input
    }
}

/// Builds discovery filters and scopes them to the caller's entitlements.
pub struct QuerySpecBuilder {
    strategy: Box<dyn ScopeStrategy>,
    embedded_store: bool,
}

impl QuerySpecBuilder {
    pub fn new(strategy: Box<dyn ScopeStrategy>, embedded_store: bool) -> Self {
        Self { strategy, embedded_store }
    }

    pub fn from_config(config: &FrontendConfig) -> Self {
        let strategy: Box<dyn ScopeStrategy> = match config.deployment {
            Deployment::Chess => Box::new(BtrScope),
            Deployment::MagLab => {
                tracing::warn!("MagLab deployment selected: query specs are not narrowed by entitlements");
                Box::new(PassThroughScope)
            }
        };
        Self::new(strategy, config.embedded_store)
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    /// Case-insensitive substring match of `search_text` against any of `attributes`.
    ///
    /// The embedded document store cannot evaluate `$regex`, so it gets the empty filter.
    /// An empty attribute list yields `{"$or": []}`, which matches nothing.
    pub fn build_filter_from_attributes<S: AsRef<str>>(&self, search_text: &str, attributes: &[S]) -> FilterExpression {
        if self.embedded_store {
            return FilterExpression::new();
        }
        let pattern = format!(".*{}.*", search_text);
        if let Err(err) = regex::Regex::new(&pattern) {
            tracing::debug!("search text {:?} is not a valid pattern: {}", search_text, err);
            return FilterExpression::from(Clause::Or(vec![]));
        }
        let filters = attributes
            .iter()
            .map(|attr| FilterExpression::from(Clause::regex_ignore_case(attr.as_ref(), pattern.clone())))
            .collect();
        FilterExpression::from(Clause::Or(filters))
    }

    pub fn intersect_btrs<S: AsRef<str>>(&self, requested: &Value, authorized: &[S]) -> Vec<String> {
        intersect_btrs(requested, authorized)
    }

    pub fn scope_filter(&self, input: FilterExpression, ctx: &EntitlementContext, mode: ScopeMode) -> FilterExpression {
        let scoped = self.strategy.scope(input, ctx, mode);
        tracing::debug!(strategy = self.strategy.name(), ?mode, clauses = scoped.len(), spec = %scoped, "scoped query spec");
        scoped
    }
}

impl Default for QuerySpecBuilder {
    fn default() -> Self {
        Self::new(Box::new(BtrScope), false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> FilterExpression {
        FilterExpression::from_value(&value).unwrap()
    }

    fn scoped(input: Value, btrs: &[&str], mode: ScopeMode) -> Value {
        let ctx = EntitlementContext::new(btrs.iter().copied(), false);
        QuerySpecBuilder::default().scope_filter(doc(input), &ctx, mode).to_value()
    }

    #[test]
    fn elevated_access_bypasses_both_modes() {
        let builder = QuerySpecBuilder::default();
        let ctx = EntitlementContext::new(["B1"], true);
        let input = json!({"btr": "other", "$or": [{"a": 1}]});
        for mode in [ScopeMode::Search, ScopeMode::Filter] {
            assert_eq!(builder.scope_filter(doc(input.clone()), &ctx, mode).to_value(), input);
        }
    }

    #[test]
    fn search_mode_narrows_btr_and_keeps_other_keys() {
        let out = scoped(json!({"beamline": "X", "btr": "B1"}), &["B1", "B2"], ScopeMode::Search);
        assert_eq!(out, json!({"beamline": "X", "btr": {"$in": ["B1"]}}));
    }

    #[test]
    fn search_mode_intersects_list_of_btrs() {
        let out = scoped(json!({"btr": ["btr1", "btr2", "btr3"]}), &["btr1", "btr3"], ScopeMode::Search);
        assert_eq!(out, json!({"btr": {"$in": ["btr1", "btr3"]}}));
    }

    #[test]
    fn search_mode_adds_btrs_when_missing() {
        let out = scoped(json!({"cycle": "2024-1"}), &["B2", "B1"], ScopeMode::Search);
        assert_eq!(out, json!({"cycle": "2024-1", "btr": {"$in": ["B2", "B1"]}}));
    }

    #[test]
    fn search_mode_without_entitlements_leaves_input_alone() {
        let out = scoped(json!({"cycle": "2024-1"}), &[], ScopeMode::Search);
        assert_eq!(out, json!({"cycle": "2024-1"}));
    }

    #[test]
    fn search_mode_with_unknown_btr_shape_matches_nothing() {
        let out = scoped(json!({"btr": {"$gt": "A"}}), &["A", "B"], ScopeMode::Search);
        assert_eq!(out, json!({"btr": {"$in": []}}));
    }

    #[test]
    fn filter_mode_wraps_plain_keys() {
        let out = scoped(json!({"category": "science"}), &["btr1", "btr3"], ScopeMode::Filter);
        assert_eq!(
            out,
            json!({"$and": [
                {"$or": [{"category": "science"}]},
                {"btr": {"$in": ["btr1", "btr3"]}}
            ]})
        );
    }

    #[test]
    fn filter_mode_ignores_attacker_btr() {
        let out = scoped(json!({"btr": "attacker-supplied", "category": "science"}), &["B1"], ScopeMode::Filter);
        assert_eq!(out["$and"][1], json!({"btr": {"$in": ["B1"]}}));
        assert_eq!(out["$and"][0], json!({"$or": [{"category": "science"}]}));
    }

    #[test]
    fn filter_mode_uses_existing_or_clauses() {
        let input = json!({"$or": [
            {"beamline": {"$regex": ".*3a.*"}},
            {"btr": {"$regex": ".*"}},
            {"cycle": {"$regex": ".*3a.*"}}
        ]});
        let out = scoped(input, &["B1"], ScopeMode::Filter);
        assert_eq!(
            out,
            json!({"$and": [
                {"$or": [{"beamline": {"$regex": ".*3a.*"}}, {"cycle": {"$regex": ".*3a.*"}}]},
                {"btr": {"$in": ["B1"]}}
            ]})
        );
    }

    #[test]
    fn filter_mode_with_only_btr_is_bare_restriction() {
        assert_eq!(scoped(json!({"btr": "B9"}), &["B1"], ScopeMode::Filter), json!({"btr": {"$in": ["B1"]}}));
        assert_eq!(scoped(json!({}), &[], ScopeMode::Filter), json!({"btr": {"$in": []}}));
    }

    #[test]
    fn attribute_filter_builds_regex_or() {
        let spec = QuerySpecBuilder::default().build_filter_from_attributes("3a", &["beamline", "btr"]);
        assert_eq!(
            spec.to_value(),
            json!({"$or": [
                {"beamline": {"$regex": ".*3a.*", "$options": "i"}},
                {"btr": {"$regex": ".*3a.*", "$options": "i"}}
            ]})
        );
    }

    #[test]
    fn attribute_filter_edge_cases() {
        let builder = QuerySpecBuilder::default();
        let none: [&str; 0] = [];
        assert_eq!(builder.build_filter_from_attributes("x", &none).to_value(), json!({"$or": []}));
        assert_eq!(builder.build_filter_from_attributes("(", &["beamline"]).to_value(), json!({"$or": []}));

        let embedded = QuerySpecBuilder::new(Box::new(BtrScope), true);
        assert!(embedded.build_filter_from_attributes("x", &["beamline"]).is_empty());
    }

    #[test]
    fn pass_through_strategy_keeps_input() {
        let builder = QuerySpecBuilder::new(Box::new(PassThroughScope), false);
        let ctx = EntitlementContext::new(["B1"], false);
        let input = json!({"btr": "B7"});
        assert_eq!(builder.scope_filter(doc(input.clone()), &ctx, ScopeMode::Filter).to_value(), input);
        assert_eq!(builder.strategy_name(), "maglab");
    }
}
