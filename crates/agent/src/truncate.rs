//! Size limits applied to tool results before they go back to the model.
//!
//! Large function responses make the model emit malformed calls, so every
//! result is cut down here first. Applying [`truncate_tool_response`] to its own
//! output returns the same value.

use pathfinder_core::text::ellipsize;
use pathfinder_tool_runtime::ToolFamily;
use serde_json::{Map, Value};

pub const MAX_LIST_ITEMS: usize = 80;
pub const MAX_NESTED_ITEMS: usize = 10;
pub const MAX_DEPTH: usize = 3;
pub const MAX_STRING_CHARS: usize = 500;
pub const MAX_COMPARED_BRANCHES: usize = 10;

/// Fields kept on each item of a long result list.
const LIST_FIELDS: &[&str] = &[
    "college_name",
    "college_code",
    "branch_name",
    "cutoff_rank",
    "round",
    "admission_chance",
    "best_cutoff",
    "avg_cutoff",
    "worst_cutoff",
    "total_branches",
    "best_branch",
    "worst_branch",
];

pub fn truncate_tool_response(data: Value, family: ToolFamily) -> Value {
    match data {
        Value::Object(obj) if family == ToolFamily::Comparison && obj.contains_key("comparison") => {
            Value::Object(truncate_object(truncate_comparison(obj), 0))
        }
        Value::Array(items) => truncate_list(items),
        Value::Object(obj) => Value::Object(truncate_object(obj, 0)),
        other => other,
    }
}

/// Each college keeps only the names of its first few branches.
fn truncate_comparison(mut obj: Map<String, Value>) -> Map<String, Value> {
    if let Some(Value::Array(colleges)) = obj.get_mut("comparison") {
        for college in colleges.iter_mut() {
            let Value::Object(college) = college else { continue };
            let Some(Value::Array(branches)) = college.get("branches") else { continue };

            let cut = branches.len() > MAX_COMPARED_BRANCHES;
            let names: Vec<Value> = branches
                .iter()
                .take(MAX_COMPARED_BRANCHES)
                .map(|b| {
                    let name = b.get("branch_name").cloned().unwrap_or(Value::Null);
                    let mut entry = Map::new();
                    entry.insert("branch_name".into(), name);
                    Value::Object(entry)
                })
                .collect();

            let already = college
                .get("branches_truncated")
                .and_then(Value::as_bool)
                .unwrap_or(false);
            college.insert("branches".into(), Value::Array(names));
            college.insert("branches_truncated".into(), Value::Bool(already || cut));
        }
    }
    obj
}

fn truncate_list(items: Vec<Value>) -> Value {
    let project = items.len() > MAX_LIST_ITEMS;
    Value::Array(
        items
            .into_iter()
            .take(MAX_LIST_ITEMS)
            .map(|item| match item {
                Value::Object(obj) if project => Value::Object(
                    obj.into_iter()
                        .filter(|(k, _)| LIST_FIELDS.contains(&k.as_str()))
                        .collect(),
                ),
                other => other,
            })
            .map(|item| truncate_value(item, 0))
            .collect(),
    )
}

/// Bound one value found at `depth`. Array elements share the depth of their array.
fn truncate_value(value: Value, depth: usize) -> Value {
    match value {
        Value::Object(obj) => Value::Object(truncate_object(obj, depth)),
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .map(|item| truncate_value(item, depth))
                .collect(),
        ),
        Value::String(s) if s.chars().count() > MAX_STRING_CHARS => {
            Value::String(ellipsize(&s, MAX_STRING_CHARS))
        }
        other => other,
    }
}

fn truncate_object(obj: Map<String, Value>, depth: usize) -> Map<String, Value> {
    if depth >= MAX_DEPTH {
        let mut marker = Map::new();
        marker.insert("_truncated".into(), Value::Bool(true));
        return marker;
    }

    let mut out = Map::new();
    for (key, value) in obj {
        match value {
            Value::Object(inner) => {
                out.insert(key, Value::Object(truncate_object(inner, depth + 1)));
            }
            Value::Array(items) => {
                if items.len() > MAX_NESTED_ITEMS {
                    out.insert(format!("{}_count", key), Value::from(items.len()));
                }
                let kept = items.into_iter().take(MAX_NESTED_ITEMS).collect();
                out.insert(key, truncate_value(Value::Array(kept), depth + 1));
            }
            Value::String(s) if s.chars().count() > MAX_STRING_CHARS => {
                out.insert(key, Value::String(ellipsize(&s, MAX_STRING_CHARS)));
            }
            other => {
                // Counts recorded for a cut list take precedence.
                if key.ends_with("_count") && out.contains_key(&key) {
                    continue;
                }
                out.insert(key, other);
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn comparison_with_branches(colleges: usize, branches: usize) -> Value {
        let list: Vec<Value> = (0..colleges)
            .map(|c| {
                json!({
                    "college_code": format!("E{:03}", c),
                    "college_name": format!("College {}", c),
                    "best_cutoff": 1000,
                    "branches": (0..branches)
                        .map(|b| json!({"branch_name": format!("Branch {}", b), "cutoff_rank": 1000 + b}))
                        .collect::<Vec<_>>(),
                })
            })
            .collect();
        json!({"comparison": list, "round": 1})
    }

    #[test]
    fn comparison_keeps_ten_branch_names() {
        let out = truncate_tool_response(comparison_with_branches(3, 50), ToolFamily::Comparison);
        for college in out["comparison"].as_array().unwrap() {
            let branches = college["branches"].as_array().unwrap();
            assert_eq!(branches.len(), 10);
            assert_eq!(branches[0], json!({"branch_name": "Branch 0"}));
            assert_eq!(college["branches_truncated"], true);
            assert_eq!(college["best_cutoff"], 1000);
        }
        assert_eq!(
            truncate_tool_response(out.clone(), ToolFamily::Comparison),
            out
        );

        let small = truncate_tool_response(comparison_with_branches(2, 4), ToolFamily::Comparison);
        assert_eq!(small["comparison"][0]["branches_truncated"], false);
    }

    #[test]
    fn long_lists_are_sliced_and_projected() {
        let rows: Vec<Value> = (0..120)
            .map(|i| json!({"college_name": "C", "cutoff_rank": i, "internal_id": i, "notes": "x"}))
            .collect();
        let out = truncate_tool_response(Value::Array(rows), ToolFamily::Query);
        let items = out.as_array().unwrap();
        assert_eq!(items.len(), MAX_LIST_ITEMS);
        assert_eq!(items[5], json!({"college_name": "C", "cutoff_rank": 5}));
        assert_eq!(truncate_tool_response(out.clone(), ToolFamily::Query), out);

        let short = json!([{"internal_id": 1}]);
        assert_eq!(truncate_tool_response(short.clone(), ToolFamily::Query), short);
    }

    #[test]
    fn short_lists_still_bound_their_items() {
        let rows = json!([{
            "college_name": "y".repeat(5000),
            "a": {"b": {"c": {"d": 1}}},
        }]);
        let out = truncate_tool_response(rows, ToolFamily::Query);
        let name = out[0]["college_name"].as_str().unwrap();
        assert_eq!(name.chars().count(), MAX_STRING_CHARS);
        assert_eq!(out[0]["a"]["b"]["c"], json!({"_truncated": true}));
        assert_eq!(truncate_tool_response(out.clone(), ToolFamily::Query), out);
    }

    #[test]
    fn objects_are_bounded() {
        let payload = json!({
            "summary": "s".repeat(900),
            "colleges": (0..25).collect::<Vec<_>>(),
            "a": {"b": {"c": {"d": 1}}, "short": [1, 2]},
            "items": [{"note": "x".repeat(5000), "a": {"b": {"c": {"d": {"e": 1}}}}}],
            "rank": 5000,
        });
        let out = truncate_tool_response(payload, ToolFamily::Query);

        let summary = out["summary"].as_str().unwrap();
        assert_eq!(summary.chars().count(), MAX_STRING_CHARS);
        assert!(summary.ends_with("..."));
        assert_eq!(out["colleges"].as_array().unwrap().len(), MAX_NESTED_ITEMS);
        assert_eq!(out["colleges_count"], 25);
        assert_eq!(out["a"]["b"]["c"], json!({"_truncated": true}));
        assert_eq!(out["a"]["short"], json!([1, 2]));
        assert_eq!(out["rank"], 5000);

        let item = &out["items"][0];
        assert_eq!(item["note"].as_str().unwrap().chars().count(), MAX_STRING_CHARS);
        assert_eq!(item["a"]["b"], json!({"_truncated": true}));

        assert_eq!(truncate_tool_response(out.clone(), ToolFamily::Query), out);
    }

    #[test]
    fn scalars_pass_through() {
        assert_eq!(truncate_tool_response(json!(null), ToolFamily::Email), json!(null));
        assert_eq!(truncate_tool_response(json!("ok"), ToolFamily::Query), json!("ok"));
    }
}
