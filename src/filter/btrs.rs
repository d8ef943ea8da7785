use std::collections::{BTreeSet, HashSet};

use serde_json::Value;

use super::types::op;

/// Intersect the BTRs named in a caller's query with the ones the caller is entitled to.
///
/// `requested` is whatever the caller put under the `btr` key: a string, an array of
/// strings, or an object holding an array under `$or` or `$in`. Any other shape names
/// no BTRs. The result is sorted and free of duplicates; an empty result is a valid
/// answer that makes the scoped query match nothing.
pub fn intersect_btrs<S: AsRef<str>>(requested: &Value, authorized: &[S]) -> Vec<String> {
    let allowed: HashSet<&str> = authorized.iter().map(AsRef::as_ref).collect();
    let mut valid: BTreeSet<String> = BTreeSet::new();

    let mut add_if_valid = |item: &Value| {
        if let Some(btr) = item.as_str() {
            if allowed.contains(btr) {
                valid.insert(btr.to_string());
            }
        }
    };

    match requested {
        Value::String(_) => add_if_valid(requested),
        Value::Array(items) => items.iter().for_each(&mut add_if_valid),
        Value::Object(obj) => {
            for key in [op::OR, op::IN] {
                if let Some(Value::Array(items)) = obj.get(key) {
                    items.iter().for_each(&mut add_if_valid);
                }
            }
        }
        _ => {}
    }

    valid.into_iter().collect()
}
