//! Answers built straight from a tool result when the model cannot finish the turn.

use pathfinder_core::text::take_chars;
use pathfinder_tool_runtime::{ToolCallResult, ToolFamily};
use serde_json::Value;

const LIST_PREVIEW: usize = 8;
const OBJECT_FIELDS: usize = 5;

/// Human-readable text for a successful tool result, shaped by the tool's family.
pub fn synthesize(family: ToolFamily, result: &ToolCallResult) -> String {
    let summary = result.summary();
    let data = result.data();

    if family == ToolFamily::Comparison {
        let colleges = data
            .and_then(|d| d.get("comparison"))
            .and_then(Value::as_array)
            .filter(|c| !c.is_empty());
        if let Some(colleges) = colleges {
            return comparison_text(colleges);
        }
    }

    match (family, data) {
        (ToolFamily::Email, Some(Value::Object(obj))) => {
            let sent = obj.get("success").and_then(Value::as_bool).unwrap_or(false);
            match obj.get("message").and_then(Value::as_str) {
                Some(message) => message.to_string(),
                None if sent => "Email sent successfully!".to_string(),
                None => "Failed to send email. Please try again.".to_string(),
            }
        }
        (ToolFamily::Email, _) => or_default(summary, "Email operation completed."),
        (_, None | Some(Value::Null)) => or_default(summary, "No results available."),
        (_, Some(Value::Array(items))) => list_text(items),
        (_, Some(Value::Object(obj))) => {
            let fields: Vec<String> = obj
                .iter()
                .take(OBJECT_FIELDS)
                .filter_map(|(key, value)| scalar(value).map(|v| format!("{}: {}", key, v)))
                .collect();
            if fields.is_empty() {
                or_default(summary, "Data retrieved successfully.")
            } else {
                format!("Results:\n{}", fields.join("\n"))
            }
        }
        (_, Some(other)) => take_chars(&other.to_string(), 500).to_string(),
    }
}

fn or_default(summary: &str, fallback: &str) -> String {
    if summary.is_empty() {
        fallback.to_string()
    } else {
        summary.to_string()
    }
}

fn scalar(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn field(item: &Value, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match item.get(*key)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        _ => None,
    })
}

fn comparison_text(colleges: &[Value]) -> String {
    let mut lines = vec!["Here's the comparison:\n".to_string()];
    for college in colleges {
        let text = |key: &str, default: &str| {
            college
                .get(key)
                .and_then(scalar)
                .unwrap_or_else(|| default.to_string())
        };
        lines.push(format!(
            "**{}** ({})",
            text("college_name", "Unknown"),
            text("college_code", "")
        ));
        lines.push(format!("  - Best Cutoff: {}", text("best_cutoff", "N/A")));
        lines.push(format!("  - Avg Cutoff: {}", text("avg_cutoff", "N/A")));
        lines.push(format!("  - Total Branches: {}\n", text("total_branches", "0")));
    }
    lines.join("\n")
}

fn list_text(items: &[Value]) -> String {
    let shown = items.len().min(LIST_PREVIEW);
    let lines: Vec<String> = items
        .iter()
        .take(shown)
        .map(|item| {
            if let Some(s) = scalar(item) {
                return s;
            }
            let mut parts = Vec::new();
            if let Some(name) = field(item, &["college_name", "name"]) {
                parts.push(name);
            }
            if let Some(code) = field(item, &["college_code", "code"]) {
                parts.push(format!("({})", code));
            }
            if let Some(branch) = field(item, &["branch", "branch_name"]) {
                parts.push(format!("- {}", branch));
            }
            if let Some(cutoff) = field(item, &["cutoff_rank", "rank"]) {
                parts.push(format!("Cutoff: {}", cutoff));
            }
            parts.join(" ")
        })
        .collect();
    format!("Here are the top {} results:\n\n{}", shown, lines.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_reports_its_message() {
        let sent = ToolCallResult::success(
            json!({"success": true, "message": "Report sent to a@b.co"}),
            "Report sent to a@b.co",
        );
        assert_eq!(synthesize(ToolFamily::Email, &sent), "Report sent to a@b.co");

        let bare = ToolCallResult::success(json!({"success": false}), "x");
        assert_eq!(
            synthesize(ToolFamily::Email, &bare),
            "Failed to send email. Please try again."
        );
    }

    #[test]
    fn comparison_bullets() {
        let result = ToolCallResult::success(
            json!({"comparison": [
                {"college_name": "R V College of Engineering", "college_code": "E005", "best_cutoff": 300, "avg_cutoff": 2100, "total_branches": 7}
            ], "round": 1}),
            "Compared 1 colleges",
        );
        assert_eq!(
            synthesize(ToolFamily::Comparison, &result),
            "Here's the comparison:\n\n**R V College of Engineering** (E005)\n  - Best Cutoff: 300\n  - Avg Cutoff: 2100\n  - Total Branches: 7\n"
        );
    }

    #[test]
    fn lists_show_first_eight() {
        let rows: Vec<Value> = (0..12)
            .map(|i| json!({"college_name": format!("College {}", i), "college_code": "E1", "branch_name": "Civil Engineering", "cutoff_rank": 1000 + i}))
            .collect();
        let text = synthesize(
            ToolFamily::Query,
            &ToolCallResult::success(Value::Array(rows), "Found 12 colleges"),
        );
        assert!(text.starts_with("Here are the top 8 results:\n\nCollege 0 (E1) - Civil Engineering Cutoff: 1000\n"));
        assert_eq!(text.lines().count(), 10);

        let names = synthesize(
            ToolFamily::Query,
            &ToolCallResult::success(json!(["Civil Engineering"]), "1 branch"),
        );
        assert_eq!(names, "Here are the top 1 results:\n\nCivil Engineering");
    }

    #[test]
    fn objects_show_scalar_fields() {
        let result = ToolCallResult::success(
            json!({"branch_name": "Civil Engineering", "cutoff_trends": {"round1": 1}, "college_name": "RVCE"}),
            "trends",
        );
        assert_eq!(
            synthesize(ToolFamily::Query, &result),
            "Results:\nbranch_name: Civil Engineering\ncollege_name: RVCE"
        );

        let nested = ToolCallResult::success(json!({"a": {"b": 1}}), "Nested data");
        assert_eq!(synthesize(ToolFamily::Query, &nested), "Nested data");
    }

    #[test]
    fn null_data_uses_summary() {
        let result = ToolCallResult::success(Value::Null, "Nothing to show");
        assert_eq!(synthesize(ToolFamily::Query, &result), "Nothing to show");
    }
}
