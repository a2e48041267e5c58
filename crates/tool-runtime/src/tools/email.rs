//! Report email tools.
//!
//! Every tool resolves its recipient (argument first, then the session's
//! authenticated address), renders one template and sends it exactly once.
//! Outcomes are reported inside a successful envelope as
//! `{success, message, error?}` so the model can relay them verbatim.

use std::collections::HashSet;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::Utc;
use pathfinder_core::data::{CollegeCutoff, SortOrder};
use pathfinder_core::text::take_chars;
use pathfinder_core::{CollegeData, MessageRole, Session};
use pathfinder_notify::{is_valid_email, name_from_email, Mailer, ReportRenderer};
use regex::Regex;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::{arg_i64, arg_str};
use crate::tool::{Tool, ToolCallResult, ToolContext, ToolDefinition, ToolError, ToolFamily};

const DEFAULT_RANK: i64 = 50_000;
const DEFAULT_CATEGORY: &str = "GM";
const SEND_FAILED: &str = "Failed to send email. Please check your email address and try again.";

static RANK_NUMBER: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(\d{1,6})\b").ok());
static CATEGORY: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"\b(gm|sc|st|2a|2b|3a|3b|obc)\b").ok());

/// Collaborators shared by the email tools.
pub struct EmailDeps {
    pub mailer: Arc<dyn Mailer>,
    pub renderer: Arc<ReportRenderer>,
    pub data: Arc<dyn CollegeData>,
}

pub fn all(deps: Arc<EmailDeps>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(ComprehensiveReportTool { deps: deps.clone() }),
        Arc::new(PredictionSummaryTool { deps: deps.clone() }),
        Arc::new(DetailedAnalysisTool { deps: deps.clone() }),
        Arc::new(ComparisonEmailTool { deps: deps.clone() }),
        Arc::new(BranchAnalysisTool { deps: deps.clone() }),
        Arc::new(AdmissionTipsTool { deps: deps.clone() }),
        Arc::new(CutoffTrendsEmailTool { deps }),
    ]
}

/// What a finished send reports back.
#[derive(Debug, Clone, Serialize)]
struct EmailOutcome {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    colleges_sent: Option<usize>,
}

impl EmailOutcome {
    fn sent(message: String) -> Self {
        Self {
            success: true,
            message,
            error: None,
            colleges_sent: None,
        }
    }

    fn failed(error: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
            error: Some(error.into()),
            colleges_sent: None,
        }
    }

    fn into_result(self) -> ToolCallResult {
        if self.success {
            let summary = self.message.clone();
            return ToolCallResult::success(self, summary);
        }
        let error = self.error.unwrap_or_else(|| self.message.clone());
        ToolCallResult::failure(error, self.message)
    }
}

/// Recipient and greeting resolved for one send.
struct Recipient {
    email: String,
    student_name: String,
}

fn resolve_recipient(input: &Value, ctx: &ToolContext) -> Result<Recipient, EmailOutcome> {
    let Some(email) = arg_str(input, "email").or_else(|| ctx.authenticated_email()) else {
        return Err(EmailOutcome::failed(
            "No email provided",
            "Please provide an email address. Say 'email me' to use your account email, \
             or provide a specific address like 'send to friend@email.com'",
        ));
    };
    if !is_valid_email(email) {
        return Err(EmailOutcome::failed(
            "Invalid email format",
            "Please provide a valid email address.",
        ));
    }
    let student_name = arg_str(input, "student_name")
        .map(str::to_string)
        .unwrap_or_else(|| name_from_email(email));
    Ok(Recipient {
        email: email.to_string(),
        student_name,
    })
}

struct Delivery<'a> {
    template: &'a str,
    subject: String,
    sent_message: String,
    failed_message: &'a str,
}

impl EmailDeps {
    /// Render and send once. Never retried.
    async fn deliver(&self, to: &str, delivery: Delivery<'_>, context: &Value) -> EmailOutcome {
        let html = match self.renderer.render(delivery.template, context) {
            Ok(html) => html,
            Err(e) => {
                warn!(template = delivery.template, error = %e, "report rendering failed");
                return EmailOutcome::failed(e.to_string(), format!("Error sending email: {}", e));
            }
        };
        match self.mailer.send_email(to, &delivery.subject, &html).await {
            Ok(true) => {
                info!(template = delivery.template, channel = self.mailer.channel_name(), "report email sent");
                EmailOutcome::sent(delivery.sent_message)
            }
            Ok(false) => EmailOutcome::failed("Email sending failed", delivery.failed_message),
            Err(e) => {
                warn!(template = delivery.template, error = %e, "report email failed");
                EmailOutcome::failed(e.to_string(), format!("Error sending email: {}", e))
            }
        }
    }
}

fn email_properties(extra: Value) -> Value {
    let mut properties = json!({
        "email": {"type": "string", "description": "Recipient address. Omit to use the signed-in student's email."},
        "student_name": {"type": "string", "description": "Name used in the greeting. Derived from the email when omitted."}
    });
    if let (Some(base), Value::Object(extra)) = (properties.as_object_mut(), extra) {
        base.extend(extra);
    }
    properties
}

fn email_definition(name: &str, description: &str, extra: Value, required: &[&str]) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: json!({
            "type": "object",
            "properties": email_properties(extra),
            "required": required
        }),
        family: ToolFamily::Email,
    }
}

fn arg_array(input: &Value, key: &str) -> Vec<Value> {
    input
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn arg_category(input: &Value) -> String {
    arg_str(input, "category")
        .map(str::to_uppercase)
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string())
}

// ── Conversation analysis ─────────────────────────────────────

#[derive(Debug, Default, PartialEq)]
struct ConversationFacts {
    rank: Option<i64>,
    category: Option<String>,
    snippets: Vec<String>,
}

/// Rank, category and a few user snippets recovered from the session log.
fn analyze_history(session: &Session) -> ConversationFacts {
    let mut facts = ConversationFacts::default();
    for message in &session.messages {
        let content = message.content.to_lowercase();

        if facts.rank.is_none() && content.contains("rank") {
            facts.rank = RANK_NUMBER
                .as_ref()
                .and_then(|re| re.captures(&content))
                .and_then(|caps| caps[1].parse().ok());
        }
        if let Some(found) = CATEGORY.as_ref().and_then(|re| re.captures(&content)) {
            facts.category = Some(found[1].to_uppercase());
        }
        if message.role == MessageRole::User && content.chars().count() > 20 && facts.snippets.len() < 5 {
            facts.snippets.push(take_chars(&content, 100).to_string());
        }
    }
    facts
}

fn admission_chance(rank: i64, cutoff: i64) -> &'static str {
    if rank <= cutoff {
        "High"
    } else if (rank as f64) <= cutoff as f64 * 1.1 {
        "Medium"
    } else {
        "Low"
    }
}

#[derive(Serialize)]
struct ChanceRow {
    #[serde(flatten)]
    cutoff: CollegeCutoff,
    admission_chance: &'static str,
}

// ── Tools ─────────────────────────────────────────────────────

pub struct ComprehensiveReportTool {
    deps: Arc<EmailDeps>,
}

impl ComprehensiveReportTool {
    async fn round_rows(&self, rank: i64, round: u8) -> Vec<ChanceRow> {
        match self
            .deps
            .data
            .get_colleges_by_rank(rank, round, 15, SortOrder::Asc)
            .await
        {
            Ok(rows) => rows
                .into_iter()
                .map(|cutoff| ChanceRow {
                    admission_chance: admission_chance(rank, cutoff.cutoff_rank),
                    cutoff,
                })
                .collect(),
            Err(e) => {
                warn!(round, error = %e, "report lookup failed");
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl Tool for ComprehensiveReportTool {
    fn definition(&self) -> ToolDefinition {
        email_definition(
            "send_comprehensive_report_email",
            "Email a full report built from this conversation: rank, category and matching colleges \
             for rounds 1 and 2. Rank and category are read from the chat when omitted.",
            json!({
                "rank": {"type": "integer", "description": "Student's rank (optional)"},
                "category": {"type": "string", "description": "Reservation category, e.g. GM (optional)"}
            }),
            &[],
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let recipient = match resolve_recipient(&input, ctx) {
            Ok(r) => r,
            Err(outcome) => return Ok(outcome.into_result()),
        };

        let facts = analyze_history(&ctx.session);
        let rank = arg_i64(&input, "rank")
            .or(facts.rank)
            .unwrap_or(DEFAULT_RANK);
        let category = arg_str(&input, "category")
            .map(str::to_uppercase)
            .or(facts.category)
            .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());
        let conversation_summary = if facts.snippets.is_empty() {
            format!("Analysis for rank {} in {} category", rank, category)
        } else {
            facts.snippets.join(" ")
        };

        let round1 = self.round_rows(rank, 1).await;
        let round2 = self.round_rows(rank, 2).await;
        let branches: HashSet<&str> = round1
            .iter()
            .chain(&round2)
            .map(|row| row.cutoff.branch_name.as_str())
            .collect();

        let context = json!({
            "student_name": recipient.student_name,
            "rank": rank,
            "category": category,
            "analysis_date": Utc::now().to_rfc3339(),
            "chat_url": ctx.chat_url(),
            "conversation_summary": conversation_summary,
            "stats": {
                "total_colleges": round1.len() + round2.len(),
                "round1_colleges": round1.len(),
                "round2_colleges": round2.len(),
                "branches_count": branches.len(),
            },
            "round1_colleges": round1,
            "round2_colleges": round2,
        });

        let outcome = self
            .deps
            .deliver(
                &recipient.email,
                Delivery {
                    template: "comprehensive_report",
                    subject: format!("🎓 Your KCET College Report - Rank {}", rank),
                    sent_message: format!(
                        "✅ Comprehensive analysis report sent to {}! Check your inbox for detailed insights \
                         including college matches, branch analysis, trends, and personalized recommendations.",
                        recipient.email
                    ),
                    failed_message: SEND_FAILED,
                },
                &context,
            )
            .await;
        Ok(outcome.into_result())
    }
}

pub struct PredictionSummaryTool {
    deps: Arc<EmailDeps>,
}

#[async_trait]
impl Tool for PredictionSummaryTool {
    fn definition(&self) -> ToolDefinition {
        email_definition(
            "send_prediction_summary_email",
            "Email the list of colleges found for the student's rank (up to 30 rows).",
            json!({
                "rank": {"type": "integer", "description": "Student's rank"},
                "category": {"type": "string", "description": "Reservation category (default GM)"},
                "colleges": {"type": "array", "items": {"type": "object"}, "description": "College rows from a previous search"},
                "round_number": {"type": "integer", "description": "Counseling round (1-3)"},
                "preferred_location": {"type": "string", "description": "Preferred location if mentioned"}
            }),
            &["rank", "colleges"],
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let recipient = match resolve_recipient(&input, ctx) {
            Ok(r) => r,
            Err(outcome) => return Ok(outcome.into_result()),
        };
        let rank = arg_i64(&input, "rank").unwrap_or(DEFAULT_RANK);
        let colleges = arg_array(&input, "colleges");
        let shown: Vec<&Value> = colleges.iter().take(30).collect();

        let context = json!({
            "student_name": recipient.student_name,
            "rank": rank,
            "category": arg_category(&input),
            "round_number": arg_i64(&input, "round_number").unwrap_or(1),
            "location": arg_str(&input, "preferred_location"),
            "rank_year": "2024",
            "analysis_date": Utc::now().to_rfc3339(),
            "total_colleges": colleges.len(),
            "colleges": shown,
            "chat_url": ctx.chat_url(),
        });

        let mut outcome = self
            .deps
            .deliver(
                &recipient.email,
                Delivery {
                    template: "prediction_summary",
                    subject: format!(
                        "🎓 Your KCET College Predictions - {} Matches Found!",
                        colleges.len()
                    ),
                    sent_message: format!("Prediction summary sent to {}! Check your inbox.", recipient.email),
                    failed_message: SEND_FAILED,
                },
                &context,
            )
            .await;
        if outcome.success {
            outcome.colleges_sent = Some(shown.len());
        }
        Ok(outcome.into_result())
    }
}

pub struct DetailedAnalysisTool {
    deps: Arc<EmailDeps>,
}

#[async_trait]
impl Tool for DetailedAnalysisTool {
    fn definition(&self) -> ToolDefinition {
        email_definition(
            "send_detailed_analysis_email",
            "Email a detailed analysis with statistics for the given colleges (top 15 listed).",
            json!({
                "rank": {"type": "integer", "description": "Student's rank"},
                "category": {"type": "string", "description": "Reservation category (default GM)"},
                "colleges": {"type": "array", "items": {"type": "object"}, "description": "College rows, optionally with admission_chance"},
                "branch_distribution": {"type": "array", "items": {"type": "object"}, "description": "Optional per-branch counts"}
            }),
            &["rank", "colleges"],
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let recipient = match resolve_recipient(&input, ctx) {
            Ok(r) => r,
            Err(outcome) => return Ok(outcome.into_result()),
        };
        let colleges = arg_array(&input, "colleges");
        let high_chance = colleges
            .iter()
            .filter(|c| c.get("admission_chance").and_then(Value::as_str) == Some("High"))
            .count();
        let branches: HashSet<&str> = colleges
            .iter()
            .filter_map(|c| {
                c.get("branch_name")
                    .or_else(|| c.get("branch"))
                    .and_then(Value::as_str)
            })
            .collect();

        let context = json!({
            "student_name": recipient.student_name,
            "rank": arg_i64(&input, "rank").unwrap_or(DEFAULT_RANK),
            "category": arg_category(&input),
            "total_matches": colleges.len(),
            "high_chance_count": high_chance,
            "branches_count": branches.len(),
            "colleges": colleges.iter().take(15).collect::<Vec<_>>(),
            "branch_distribution": arg_array(&input, "branch_distribution"),
            "generation_date": Utc::now().to_rfc3339(),
            "chat_url": ctx.chat_url(),
        });

        let outcome = self
            .deps
            .deliver(
                &recipient.email,
                Delivery {
                    template: "detailed_report",
                    subject: "📋 Your Detailed College Analysis Report".to_string(),
                    sent_message: format!(
                        "✅ Detailed report sent to {}! Check your inbox for comprehensive analysis.",
                        recipient.email
                    ),
                    failed_message: "Failed to send detailed report. Please try again.",
                },
                &context,
            )
            .await;
        Ok(outcome.into_result())
    }
}

pub struct ComparisonEmailTool {
    deps: Arc<EmailDeps>,
}

#[async_trait]
impl Tool for ComparisonEmailTool {
    fn definition(&self) -> ToolDefinition {
        email_definition(
            "send_comparison_email",
            "Email a college comparison. Pass the output of compare_colleges as comparison_data.",
            json!({
                "comparison_data": {"type": "object", "description": "Result of compare_colleges"},
                "comparisons": {"type": "array", "items": {"type": "object"}, "description": "Pairwise rows {college_a, college_b, winner}"},
                "recommendation": {"type": "string", "description": "Your recommendation text"},
                "round": {"type": "integer", "description": "Counseling round (1-3)"}
            }),
            &[],
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let recipient = match resolve_recipient(&input, ctx) {
            Ok(r) => r,
            Err(outcome) => return Ok(outcome.into_result()),
        };
        let comparison_data = input.get("comparison_data").cloned().unwrap_or(Value::Null);
        let round = comparison_data
            .get("round")
            .and_then(Value::as_i64)
            .or_else(|| arg_i64(&input, "round"))
            .unwrap_or(1);
        let recommendation = arg_str(&input, "recommendation").unwrap_or(
            "Based on the comparison, consider factors like cutoff ranks, available branches, \
             and your preferences to make the best choice.",
        );

        let context = json!({
            "student_name": recipient.student_name,
            "recommendation_text": recommendation,
            "chat_url": ctx.chat_url(),
            "round": round,
            "comparison": comparison_data.get("comparison").cloned().unwrap_or_else(|| json!([])),
            "comparisons": arg_array(&input, "comparisons"),
        });

        let outcome = self
            .deps
            .deliver(
                &recipient.email,
                Delivery {
                    template: "comparison_report",
                    subject: "College Comparison Report - College Path Finder".to_string(),
                    sent_message: format!("✅ Comparison report sent to {}!", recipient.email),
                    failed_message: "Failed to send comparison report.",
                },
                &context,
            )
            .await;
        Ok(outcome.into_result())
    }
}

pub struct BranchAnalysisTool {
    deps: Arc<EmailDeps>,
}

#[async_trait]
impl Tool for BranchAnalysisTool {
    fn definition(&self) -> ToolDefinition {
        email_definition(
            "send_branch_analysis_email",
            "Email colleges grouped by branch.",
            json!({
                "rank": {"type": "integer", "description": "Student's rank"},
                "branches": {"type": "array", "items": {"type": "object"}, "description": "Per-branch rows, each with optional colleges"}
            }),
            &["rank", "branches"],
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let recipient = match resolve_recipient(&input, ctx) {
            Ok(r) => r,
            Err(outcome) => return Ok(outcome.into_result()),
        };
        let context = json!({
            "student_name": recipient.student_name,
            "rank": arg_i64(&input, "rank").unwrap_or(DEFAULT_RANK),
            "branches": arg_array(&input, "branches"),
            "recommendation_1": "Consider colleges with good placement records",
            "recommendation_2": "Check faculty qualifications and research facilities",
            "recommendation_3": "Visit campuses before making final decision",
            "recommendation_4": "Talk to current students and alumni",
            "chat_url": ctx.chat_url(),
        });

        let outcome = self
            .deps
            .deliver(
                &recipient.email,
                Delivery {
                    template: "branch_analysis",
                    subject: "📊 Branch-wise College Analysis Report".to_string(),
                    sent_message: format!("✅ Branch analysis sent to {}!", recipient.email),
                    failed_message: "Failed to send branch analysis.",
                },
                &context,
            )
            .await;
        Ok(outcome.into_result())
    }
}

pub struct AdmissionTipsTool {
    deps: Arc<EmailDeps>,
}

#[async_trait]
impl Tool for AdmissionTipsTool {
    fn definition(&self) -> ToolDefinition {
        email_definition(
            "send_admission_tips_email",
            "Email general KCET counseling tips and guidance.",
            json!({}),
            &[],
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let recipient = match resolve_recipient(&input, ctx) {
            Ok(r) => r,
            Err(outcome) => return Ok(outcome.into_result()),
        };
        let context = json!({
            "student_name": recipient.student_name,
            "chat_url": ctx.chat_url(),
        });

        let outcome = self
            .deps
            .deliver(
                &recipient.email,
                Delivery {
                    template: "admission_tips",
                    subject: "💡 Expert Tips for KCET Counseling Success".to_string(),
                    sent_message: format!("✅ Admission tips sent to {}!", recipient.email),
                    failed_message: "Failed to send tips.",
                },
                &context,
            )
            .await;
        Ok(outcome.into_result())
    }
}

pub struct CutoffTrendsEmailTool {
    deps: Arc<EmailDeps>,
}

#[async_trait]
impl Tool for CutoffTrendsEmailTool {
    fn definition(&self) -> ToolDefinition {
        email_definition(
            "send_cutoff_trends_email",
            "Email historical cutoff trends with a short outlook.",
            json!({
                "rank": {"type": "integer", "description": "Student's rank"},
                "category": {"type": "string", "description": "Reservation category (default GM)"},
                "trends_data": {"type": "object", "description": "Optional {cutoff_2022, cutoff_2023, cutoff_2024, trend_2023, trend_2024, prediction, branch_trends}"}
            }),
            &["rank"],
        )
    }

    async fn execute(&self, input: Value, ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let recipient = match resolve_recipient(&input, ctx) {
            Ok(r) => r,
            Err(outcome) => return Ok(outcome.into_result()),
        };
        let rank = arg_i64(&input, "rank").unwrap_or(DEFAULT_RANK);
        let trends = match input.get("trends_data") {
            Some(data @ Value::Object(_)) => data.clone(),
            _ => json!({
                "cutoff_2022": rank + 500,
                "cutoff_2023": rank + 300,
                "cutoff_2024": rank,
                "trend_2023": "trend-down",
                "trend_2024": "trend-down",
                "prediction": "Based on trends, cutoffs are expected to remain stable or decrease slightly in 2025.",
                "branch_trends": [],
            }),
        };

        let context = json!({
            "student_name": recipient.student_name,
            "rank": rank,
            "category": arg_category(&input),
            "year_1": 2022,
            "year_2": 2023,
            "year_3": 2024,
            "cutoff_year_1": trends.get("cutoff_2022"),
            "cutoff_year_2": trends.get("cutoff_2023"),
            "cutoff_year_3": trends.get("cutoff_2024"),
            "trend_year_2": trends.get("trend_2023").and_then(Value::as_str).unwrap_or("trend-up"),
            "trend_year_3": trends.get("trend_2024").and_then(Value::as_str).unwrap_or("trend-down"),
            "branch_trends": trends.get("branch_trends").cloned().unwrap_or_else(|| json!([])),
            "prediction_message": trends.get("prediction"),
            "chat_url": ctx.chat_url(),
        });

        let outcome = self
            .deps
            .deliver(
                &recipient.email,
                Delivery {
                    template: "cutoff_trends",
                    subject: "📈 KCET Cutoff Trends & 2025 Predictions".to_string(),
                    sent_message: format!("✅ Cutoff trends sent to {}!", recipient.email),
                    failed_message: "Failed to send trends.",
                },
                &context,
            )
            .await;
        Ok(outcome.into_result())
    }
}
