//! Contract of the cutoff data service and the records it returns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::DataError;

/// One admission cutoff: the last admitted rank for a college/branch/round.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollegeCutoff {
    pub college_code: String,
    pub college_name: String,
    pub branch_name: String,
    pub round: u8,
    pub cutoff_rank: i64,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl std::str::FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "asc" => Ok(Self::Asc),
            "desc" => Ok(Self::Desc),
            other => Err(format!("unknown sort order: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RoundCutoffs {
    pub round1: Option<i64>,
    pub round2: Option<i64>,
    pub round3: Option<i64>,
}

impl RoundCutoffs {
    pub fn set(&mut self, round: u8, rank: i64) {
        let slot = match round {
            1 => &mut self.round1,
            2 => &mut self.round2,
            3 => &mut self.round3,
            _ => return,
        };
        // Several category rows may exist per round; keep the most favourable one.
        *slot = Some(slot.map_or(rank, |current| current.min(rank)));
    }

    pub fn is_empty(&self) -> bool {
        self.round1.is_none() && self.round2.is_none() && self.round3.is_none()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchCutoffs {
    pub branch_name: String,
    pub cutoff_ranks: RoundCutoffs,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollegeBranches {
    pub college_code: String,
    pub college_name: String,
    pub branches: Vec<BranchCutoffs>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NameMatch {
    pub college_name: String,
    pub college_code: String,
    pub match_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchMatch {
    pub branch_name: String,
    pub match_score: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchCutoff {
    pub branch_name: String,
    pub cutoff_rank: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CollegeComparison {
    pub college_code: String,
    pub college_name: String,
    pub total_branches: usize,
    pub best_cutoff: Option<i64>,
    pub avg_cutoff: Option<i64>,
    pub worst_cutoff: Option<i64>,
    pub best_branch: Option<String>,
    pub worst_branch: Option<String>,
    pub branches: Vec<BranchCutoff>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Comparison {
    pub comparison: Vec<CollegeComparison>,
    pub round: u8,
}

/// A college/branch reachable at a given rank.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankOption {
    pub college_name: String,
    pub college_code: String,
    pub branch: String,
    pub cutoff_rank: i64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RankSummary {
    pub best_options: usize,
    pub good_options: usize,
    pub moderate_options: usize,
    pub reach_options: usize,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RankCategories {
    pub best: Vec<RankOption>,
    pub good: Vec<RankOption>,
    pub moderate: Vec<RankOption>,
    pub reach: Vec<RankOption>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RankAnalysis {
    pub rank: i64,
    pub round: u8,
    pub percentile: String,
    pub total_options: usize,
    pub summary: RankSummary,
    pub categories: RankCategories,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchStats {
    pub branch_name: String,
    pub college_count: usize,
    pub best_cutoff: i64,
    pub avg_cutoff: i64,
    pub worst_cutoff: i64,
    pub competitiveness: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PopularityOverview {
    pub round: u8,
    pub branches: Vec<BranchStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchCollege {
    pub college_name: String,
    pub college_code: String,
    pub cutoff_rank: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BranchPopularityDetail {
    pub branch_name: String,
    pub round: u8,
    pub total_colleges: usize,
    pub best_cutoff: i64,
    pub avg_cutoff: i64,
    pub worst_cutoff: i64,
    pub competitiveness: String,
    pub top_colleges: Vec<BranchCollege>,
}

/// Popularity of every branch, or of one specific branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BranchPopularity {
    Branch(BranchPopularityDetail),
    All(PopularityOverview),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CutoffTrends {
    pub college_code: String,
    pub college_name: String,
    pub branch_name: String,
    pub cutoff_trends: RoundCutoffs,
}

/// Read-only access to the cutoff dataset.
#[async_trait]
pub trait CollegeData: Send + Sync {
    async fn get_colleges_by_rank(
        &self,
        rank: i64,
        round: u8,
        limit: usize,
        sort_order: SortOrder,
    ) -> Result<Vec<CollegeCutoff>, DataError>;

    async fn get_colleges_by_branch(
        &self,
        branch: &str,
        round: u8,
        limit: usize,
    ) -> Result<Vec<CollegeCutoff>, DataError>;

    async fn search_colleges(
        &self,
        min_rank: Option<i64>,
        branches: &[String],
        round: u8,
        limit: usize,
    ) -> Result<Vec<CollegeCutoff>, DataError>;

    /// Size of the full result set `search_colleges` draws from, ignoring any limit.
    async fn count_colleges(
        &self,
        min_rank: Option<i64>,
        branches: &[String],
        round: u8,
    ) -> Result<usize, DataError>;

    async fn get_all_branches(&self) -> Result<Vec<String>, DataError>;

    async fn get_college_branches(&self, college_code: &str) -> Result<CollegeBranches, DataError>;

    async fn search_college_by_name(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<NameMatch>, DataError>;

    async fn match_branch_names(&self, query: &str, limit: usize)
        -> Result<Vec<BranchMatch>, DataError>;

    async fn compare_colleges(&self, codes: &[String], round: u8) -> Result<Comparison, DataError>;

    async fn analyze_rank_prospects(&self, rank: i64, round: u8) -> Result<RankAnalysis, DataError>;

    async fn get_branch_popularity(
        &self,
        branch_name: Option<&str>,
        round: u8,
    ) -> Result<BranchPopularity, DataError>;

    async fn get_cutoff_trends(
        &self,
        college_code: &str,
        branch_name: &str,
    ) -> Result<CutoffTrends, DataError>;
}
