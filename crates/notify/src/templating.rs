//! Minijinja rendering for the built-in report emails.
//!
//! Templates ship with the crate and are registered once per renderer. Names
//! are given without the `.html` suffix (e.g. `comprehensive_report`).

use minijinja::{Environment, UndefinedBehavior, Value};
use pathfinder_core::text::format_number;
use serde::Serialize;

use crate::traits::NotifyError;

const TEMPLATES: &[(&str, &str)] = &[
    ("_layout.html", include_str!("../templates/_layout.html")),
    ("comprehensive_report.html", include_str!("../templates/comprehensive_report.html")),
    ("prediction_summary.html", include_str!("../templates/prediction_summary.html")),
    ("detailed_report.html", include_str!("../templates/detailed_report.html")),
    ("comparison_report.html", include_str!("../templates/comparison_report.html")),
    ("branch_analysis.html", include_str!("../templates/branch_analysis.html")),
    ("admission_tips.html", include_str!("../templates/admission_tips.html")),
    ("cutoff_trends.html", include_str!("../templates/cutoff_trends.html")),
];

/// Renders report emails to HTML.
#[derive(Debug)]
pub struct ReportRenderer {
    env: Environment<'static>,
}

impl ReportRenderer {
    pub fn new() -> Result<Self, NotifyError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Chainable);
        env.add_filter("format_number", format_number_filter);
        env.add_filter("date", date_filter);
        for (name, source) in TEMPLATES {
            env.add_template(*name, *source)
                .map_err(|e| NotifyError::Template(e.to_string()))?;
        }
        Ok(Self { env })
    }

    /// Render one of the built-in templates with `ctx`.
    pub fn render(&self, name: &str, ctx: &impl Serialize) -> Result<String, NotifyError> {
        let template = self
            .env
            .get_template(&format!("{}.html", name))
            .map_err(|e| NotifyError::Template(e.to_string()))?;
        template
            .render(ctx)
            .map_err(|e| NotifyError::Template(e.to_string()))
    }

    pub fn template_names() -> impl Iterator<Item = &'static str> {
        TEMPLATES
            .iter()
            .filter(|(name, _)| !name.starts_with('_'))
            .map(|(name, _)| name.trim_end_matches(".html"))
    }
}

/// Thousands separators for integers; `-` for missing values.
fn format_number_filter(value: Value) -> String {
    if value.is_undefined() || value.is_none() {
        return "-".to_string();
    }
    if let Ok(n) = i64::try_from(value.clone()) {
        return format_number(n);
    }
    if let Ok(f) = f64::try_from(value.clone()) {
        return format_number(f.round() as i64);
    }
    value.to_string()
}

/// `2026-01-05T10:00:00Z` -> `05 January 2026`. Unparseable input is returned unchanged.
fn date_filter(value: Value) -> String {
    if value.is_undefined() || value.is_none() {
        return String::new();
    }
    let raw = value.as_str().map(str::to_string).unwrap_or_else(|| value.to_string());
    chrono::DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.format("%d %B %Y").to_string())
        .unwrap_or(raw)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn chat_url() -> &'static str {
        "https://collegepathfinder.example/ai-chat?session=s1"
    }

    #[test]
    fn every_template_renders_with_minimal_context() {
        let renderer = ReportRenderer::new().unwrap();
        for name in ReportRenderer::template_names() {
            let html = renderer
                .render(name, &json!({"student_name": "Asha", "chat_url": chat_url()}))
                .unwrap_or_else(|e| panic!("{name}: {e}"));
            assert!(html.contains("Continue the Chat"), "{name}");
        }
        assert_eq!(ReportRenderer::template_names().count(), 7);
    }

    #[test]
    fn comprehensive_report_lists_colleges() {
        let renderer = ReportRenderer::new().unwrap();
        let html = renderer
            .render(
                "comprehensive_report",
                &json!({
                    "student_name": "Asha",
                    "rank": 12345,
                    "category": "GM",
                    "analysis_date": "2026-01-05T10:00:00Z",
                    "chat_url": chat_url(),
                    "conversation_summary": "Looking for CSE",
                    "stats": {"total_colleges": 1, "round1_colleges": 1, "round2_colleges": 0, "branches_count": 1},
                    "round1_colleges": [{
                        "college_name": "R V College of Engineering",
                        "branch_name": "Civil Engineering",
                        "cutoff_rank": 15000,
                        "admission_chance": "High"
                    }],
                    "round2_colleges": []
                }),
            )
            .unwrap();
        assert!(html.contains("12,345"));
        assert!(html.contains("15,000"));
        assert!(html.contains("05 January 2026"));
        assert!(html.contains("R V College of Engineering"));
        assert!(html.contains("No colleges found for this round."));
    }

    #[test]
    fn user_text_is_escaped() {
        let renderer = ReportRenderer::new().unwrap();
        let html = renderer
            .render(
                "comparison_report",
                &json!({"student_name": "<b>x</b>", "chat_url": chat_url(), "recommendation_text": "ok"}),
            )
            .unwrap();
        assert!(!html.contains("<b>x</b>"));
    }

    #[test]
    fn unknown_template_is_an_error() {
        let renderer = ReportRenderer::new().unwrap();
        assert!(matches!(
            renderer.render("nope", &json!({})),
            Err(NotifyError::Template(_))
        ));
    }

    #[test]
    fn filters() {
        assert_eq!(format_number_filter(Value::from(1234567)), "1,234,567");
        assert_eq!(format_number_filter(Value::from(99.6)), "100");
        assert_eq!(format_number_filter(Value::UNDEFINED), "-");
        assert_eq!(date_filter(Value::from("not a date")), "not a date");
        assert_eq!(date_filter(Value::UNDEFINED), "");
    }
}
