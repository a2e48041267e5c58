//! Built-in tools exposed to the counselor agent.
//!
//! - **College tools** (`college`): read-only lookups against a [`CollegeData`] backend
//! - **Email tools** (`email`): render a report and send it once through a [`Mailer`]

pub mod college;
pub mod email;

use std::sync::Arc;

use pathfinder_core::CollegeData;
use pathfinder_notify::{Mailer, ReportRenderer};
use serde_json::Value;

use crate::registry::{RegistryError, ToolRegistry};

pub use email::EmailDeps;

/// Registry holding every college and email tool.
pub fn counselor_registry(
    data: Arc<dyn CollegeData>,
    mailer: Arc<dyn Mailer>,
    renderer: Arc<ReportRenderer>,
) -> Result<ToolRegistry, RegistryError> {
    let mut registry = ToolRegistry::new();
    for tool in college::all(data.clone()) {
        registry.register_arc(tool)?;
    }
    let deps = Arc::new(EmailDeps {
        mailer,
        renderer,
        data,
    });
    for tool in email::all(deps) {
        registry.register_arc(tool)?;
    }
    Ok(registry)
}

// ── Argument helpers ──────────────────────────────────────────
//
// Schema validation has already run, so these only need to be lenient about
// representation (numbers sent as floats or numeric strings).

pub(crate) fn arg_i64(input: &Value, key: &str) -> Option<i64> {
    match input.get(key)? {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
        Value::String(s) => s.trim().replace(',', "").parse().ok(),
        _ => None,
    }
}

pub(crate) fn arg_str<'a>(input: &'a Value, key: &str) -> Option<&'a str> {
    input
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

pub(crate) fn arg_str_list(input: &Value, key: &str) -> Vec<String> {
    input
        .get(key)
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        })
        .unwrap_or_default()
}

/// Counseling round; anything outside 1..=3 falls back to 1.
pub(crate) fn arg_round(input: &Value, key: &str) -> u8 {
    match arg_i64(input, key) {
        Some(r @ 1..=3) => r as u8,
        _ => 1,
    }
}

pub(crate) fn arg_limit(input: &Value, default: usize) -> usize {
    arg_i64(input, "limit")
        .map(|l| l.clamp(1, 200) as usize)
        .unwrap_or(default)
}
