//! One-shot intent classification of a user message.
//!
//! The extractor never fails: provider errors and unparseable replies both
//! degrade to [`Intent::default`], a conversational intent that defers to the
//! tool-calling agent.

use std::sync::{Arc, LazyLock};

use pathfinder_llm::{LlmProvider, Message};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::prompts::EXTRACTION_PROMPT;

pub const DEFAULT_LIMIT: usize = 20;
pub const MAX_LIMIT: usize = 200;

static SHORT_RANK: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*[kK]$").ok());

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    CollegesByRank,
    CollegesByBranch,
    CollegesByRankAndBranch,
    CollegeInfo,
    CompareColleges,
    AnalyzeRank,
    BranchPopularity,
    ListBranches,
    CutoffTrends,
    EmailReport,
    #[default]
    Conversational,
}

impl IntentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CollegesByRank => "colleges_by_rank",
            Self::CollegesByBranch => "colleges_by_branch",
            Self::CollegesByRankAndBranch => "colleges_by_rank_and_branch",
            Self::CollegeInfo => "college_info",
            Self::CompareColleges => "compare_colleges",
            Self::AnalyzeRank => "analyze_rank",
            Self::BranchPopularity => "branch_popularity",
            Self::ListBranches => "list_branches",
            Self::CutoffTrends => "cutoff_trends",
            Self::EmailReport => "email_report",
            Self::Conversational => "conversational",
        }
    }

    /// Unknown names map to `None`.
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name.trim() {
            "colleges_by_rank" => Self::CollegesByRank,
            "colleges_by_branch" => Self::CollegesByBranch,
            "colleges_by_rank_and_branch" => Self::CollegesByRankAndBranch,
            "college_info" => Self::CollegeInfo,
            "compare_colleges" => Self::CompareColleges,
            "analyze_rank" => Self::AnalyzeRank,
            "branch_popularity" => Self::BranchPopularity,
            "list_branches" => Self::ListBranches,
            "cutoff_trends" => Self::CutoffTrends,
            "email_report" => Self::EmailReport,
            "conversational" => Self::Conversational,
            _ => return None,
        };
        Some(kind)
    }
}

impl std::fmt::Display for IntentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured reading of a user message. Branch and college terms are raw text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Intent {
    pub intent: IntentKind,
    pub rank: Option<i64>,
    pub round: u8,
    pub limit: usize,
    pub branches: Vec<String>,
    pub college_names: Vec<String>,
    pub email: Option<String>,
    pub query: Option<String>,
    pub needs_llm_followup: bool,
}

impl Default for Intent {
    fn default() -> Self {
        Self {
            intent: IntentKind::Conversational,
            rank: None,
            round: 1,
            limit: DEFAULT_LIMIT,
            branches: Vec::new(),
            college_names: Vec::new(),
            email: None,
            query: None,
            needs_llm_followup: true,
        }
    }
}

impl Intent {
    /// The slots filled for this intent, as a JSON object. Unset slots are left out.
    pub fn params(&self) -> Value {
        let mut params = serde_json::Map::new();
        if let Some(rank) = self.rank {
            params.insert("rank".into(), rank.into());
        }
        params.insert("round".into(), self.round.into());
        params.insert("limit".into(), self.limit.into());
        if !self.branches.is_empty() {
            params.insert("branches".into(), self.branches.clone().into());
        }
        if !self.college_names.is_empty() {
            params.insert("college_names".into(), self.college_names.clone().into());
        }
        if let Some(email) = &self.email {
            params.insert("email".into(), email.clone().into());
        }
        if let Some(query) = &self.query {
            params.insert("query".into(), query.clone().into());
        }
        Value::Object(params)
    }

    /// Parse a classifier reply, tolerating a markdown code fence around the JSON.
    ///
    /// Returns `None` when the reply is not a JSON object.
    pub fn parse(raw: &str) -> Option<Self> {
        let obj: serde_json::Map<String, Value> = serde_json::from_str(strip_fence(raw)).ok()?;

        let (intent, recognised) = match obj.get("intent").and_then(Value::as_str) {
            Some(name) => match IntentKind::from_name(name) {
                Some(kind) => (kind, true),
                None => (IntentKind::Conversational, false),
            },
            None => (IntentKind::Conversational, false),
        };

        let needs = ["needs_llm_response", "needs_llm_followup", "needs_gemini_response"]
            .iter()
            .find_map(|key| obj.get(*key).and_then(Value::as_bool))
            .unwrap_or(true);

        Some(Self {
            intent,
            rank: obj.get("rank").and_then(parse_rank),
            round: match obj.get("round").and_then(as_integer) {
                Some(r @ 1..=3) => r as u8,
                _ => 1,
            },
            limit: obj
                .get("limit")
                .and_then(as_integer)
                .map(|l| l.clamp(1, MAX_LIMIT as i64) as usize)
                .unwrap_or(DEFAULT_LIMIT),
            branches: string_list(obj.get("branches")),
            college_names: string_list(obj.get("college_names")),
            email: non_empty(obj.get("email")),
            query: non_empty(obj.get("query")),
            needs_llm_followup: needs || !recognised || intent == IntentKind::Conversational,
        })
    }
}

fn strip_fence(raw: &str) -> &str {
    let mut text = raw.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    text.strip_suffix("```").unwrap_or(text).trim()
}

fn as_integer(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
        _ => None,
    }
}

/// Ranks arrive as numbers, occasionally as `"12,000"` or `"3k"`.
fn parse_rank(value: &Value) -> Option<i64> {
    let rank = match value {
        Value::String(s) => {
            let s = s.trim().replace(',', "");
            match SHORT_RANK.as_ref().and_then(|re| re.captures(&s)) {
                Some(caps) => caps[1].parse::<f64>().ok().map(|k| (k * 1000.0).round() as i64),
                None => s.parse().ok(),
            }
        }
        other => as_integer(other),
    }?;
    (rank > 0).then_some(rank)
}

fn string_list(value: Option<&Value>) -> Vec<String> {
    value
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

fn non_empty(value: Option<&Value>) -> Option<String> {
    value
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Classifies messages with a small, low-temperature model.
pub struct IntentExtractor {
    provider: Arc<dyn LlmProvider>,
    temperature: f32,
    max_tokens: u32,
}

impl IntentExtractor {
    pub fn new(provider: Arc<dyn LlmProvider>, temperature: f32, max_tokens: u32) -> Self {
        Self {
            provider,
            temperature,
            max_tokens,
        }
    }

    /// Classify `message`; `context` is a compressed view of the last few turns.
    pub async fn extract(&self, message: &str, context: &str) -> Intent {
        let mut prompt = format!("{}\n\nUser message: {}", EXTRACTION_PROMPT, message);
        if !context.is_empty() {
            prompt.push_str("\n\nConversation context: ");
            prompt.push_str(context);
        }

        let reply = match self
            .provider
            .complete(vec![Message::user(prompt)], self.temperature, self.max_tokens)
            .await
        {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "intent extraction failed, deferring to agent");
                return Intent::default();
            }
        };

        match Intent::parse(&reply) {
            Some(intent) => {
                debug!(intent = %intent.intent, rank = ?intent.rank, needs_llm = intent.needs_llm_followup, "intent extracted");
                intent
            }
            None => {
                warn!(reply = %pathfinder_core::text::clip(&reply, 200), "unparseable intent reply");
                Intent::default()
            }
        }
    }
}
