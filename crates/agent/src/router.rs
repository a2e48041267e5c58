//! Fast path: answers simple data questions from a template without the tool loop.

use std::sync::Arc;

use pathfinder_core::data::{BranchPopularity, SortOrder};
use pathfinder_core::text::take_chars;
use pathfinder_core::{CollegeData, DataError, Session};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::intent::{Intent, IntentExtractor, IntentKind};
use crate::resolve::Resolver;
use crate::templates;

const COMPARE_MAX: usize = 4;
const CONTEXT_MESSAGES: usize = 3;
const CONTEXT_CHARS: usize = 100;

#[derive(Debug, Clone, Default)]
pub struct RouterResult {
    pub handled: bool,
    pub response: Option<String>,
    pub intent: Option<Intent>,
    /// Slot values of `intent`; `Value::Null` when no intent was read.
    pub params: Value,
    pub needs_llm: bool,
    pub error: Option<String>,
}

impl RouterResult {
    fn answered(intent: Intent, response: String) -> Self {
        Self {
            handled: true,
            response: Some(response),
            params: intent.params(),
            intent: Some(intent),
            needs_llm: false,
            error: None,
        }
    }

    fn deferred(intent: Intent) -> Self {
        Self {
            handled: false,
            response: None,
            params: intent.params(),
            intent: Some(intent),
            needs_llm: true,
            error: None,
        }
    }
}

pub struct FastPathRouter {
    extractor: IntentExtractor,
    data: Arc<dyn CollegeData>,
    resolver: Resolver,
}

impl FastPathRouter {
    pub fn new(extractor: IntentExtractor, data: Arc<dyn CollegeData>) -> Self {
        let resolver = Resolver::new(data.clone());
        Self {
            extractor,
            data,
            resolver,
        }
    }

    pub async fn route(&self, message: &str, session: &Session) -> RouterResult {
        let context = recent_context(session);
        let intent = self.extractor.extract(message, &context).await;

        if intent.needs_llm_followup {
            debug!(intent = %intent.intent, "deferring to agent");
            return RouterResult::deferred(intent);
        }

        match self.execute_intent(&intent).await {
            Ok(Some(response)) => {
                info!(intent = %intent.intent, "answered on fast path");
                RouterResult::answered(intent, response)
            }
            Ok(None) => {
                debug!(intent = %intent.intent, "required slots missing, deferring to agent");
                RouterResult::deferred(intent)
            }
            Err(e) if e.is_presentable() => RouterResult::answered(intent, e.to_string()),
            Err(e) => {
                warn!(intent = %intent.intent, error = %e, "fast path failed, deferring to agent");
                RouterResult {
                    error: Some(e.to_string()),
                    ..RouterResult::deferred(intent)
                }
            }
        }
    }

    /// Render the answer for `intent`, or `None` when a required slot is missing.
    pub async fn execute_intent(&self, intent: &Intent) -> Result<Option<String>, DataError> {
        let round = intent.round;
        let limit = intent.limit;

        let text = match intent.intent {
            IntentKind::CollegesByRank => {
                let Some(rank) = intent.rank else { return Ok(None) };
                self.rank_table(rank, &[], round, limit).await?
            }
            IntentKind::CollegesByBranch => {
                let resolved = self.resolver.resolve_branches(&intent.branches).await;
                let Some(branch) = resolved.first() else { return Ok(None) };
                let rows = self.data.get_colleges_by_branch(branch, round, limit).await?;
                let total = self
                    .data
                    .count_colleges(None, std::slice::from_ref(branch), round)
                    .await?;
                templates::colleges_by_branch(&rows, total, branch, round, limit)
            }
            IntentKind::CollegesByRankAndBranch => {
                let Some(rank) = intent.rank else { return Ok(None) };
                let resolved = self.resolver.resolve_branches(&intent.branches).await;
                self.rank_table(rank, &resolved, round, limit).await?
            }
            IntentKind::ListBranches => templates::all_branches(&self.data.get_all_branches().await?),
            IntentKind::CollegeInfo => {
                let Some(first) = intent.college_names.first() else { return Ok(None) };
                let codes = self.resolver.resolve_college_codes(&intent.college_names).await;
                match codes.first() {
                    Some(code) => templates::college_info(&self.data.get_college_branches(code).await?),
                    None => {
                        let matches = self.data.search_college_by_name(first, 5).await?;
                        templates::search_college(&matches, first)
                    }
                }
            }
            IntentKind::CompareColleges => {
                if intent.college_names.len() < 2 {
                    return Ok(None);
                }
                let codes = self.resolver.resolve_college_codes(&intent.college_names).await;
                if codes.len() < 2 {
                    return Ok(None);
                }
                let codes = &codes[..codes.len().min(COMPARE_MAX)];
                templates::compare_colleges(&self.data.compare_colleges(codes, round).await?)
            }
            IntentKind::AnalyzeRank => {
                let Some(rank) = intent.rank else { return Ok(None) };
                templates::analyze_rank(&self.data.analyze_rank_prospects(rank, round).await?)
            }
            IntentKind::BranchPopularity => {
                let resolved = self.resolver.resolve_branches(&intent.branches).await;
                let popularity = self
                    .data
                    .get_branch_popularity(resolved.first().map(String::as_str), round)
                    .await?;
                match popularity {
                    BranchPopularity::Branch(detail) => templates::branch_popularity_specific(&detail),
                    BranchPopularity::All(overview) => templates::branch_popularity_all(&overview),
                }
            }
            IntentKind::CutoffTrends => {
                if intent.college_names.is_empty() || intent.branches.is_empty() {
                    return Ok(None);
                }
                let codes = self.resolver.resolve_college_codes(&intent.college_names).await;
                let branches = self.resolver.resolve_branches(&intent.branches).await;
                let (Some(code), Some(branch)) = (codes.first(), branches.first()) else {
                    return Ok(None);
                };
                templates::cutoff_trends(&self.data.get_cutoff_trends(code, branch).await?)
            }
            IntentKind::EmailReport | IntentKind::Conversational => return Ok(None),
        };
        Ok(Some(text))
    }

    /// Reachable colleges at `rank`: the first `limit` rows plus the size of the full set.
    async fn rank_table(
        &self,
        rank: i64,
        branches: &[String],
        round: u8,
        limit: usize,
    ) -> Result<String, DataError> {
        let rows = if branches.is_empty() {
            self.data
                .get_colleges_by_rank(rank, round, limit, SortOrder::Asc)
                .await?
        } else {
            self.data
                .search_colleges(Some(rank), branches, round, limit)
                .await?
        };
        let total = self.data.count_colleges(Some(rank), branches, round).await?;
        Ok(templates::colleges_by_rank(&rows, total, rank, round, limit, branches))
    }
}

/// The last few messages as `"{role}: {content}"`, each clipped, joined by `" | "`.
pub fn recent_context(session: &Session) -> String {
    session
        .get_recent_messages(CONTEXT_MESSAGES)
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str(), take_chars(&m.content, CONTEXT_CHARS)))
        .collect::<Vec<_>>()
        .join(" | ")
}
