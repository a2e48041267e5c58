//! In-memory [`CollegeData`] backend.
//!
//! Used when no database is configured, and as the fixture for tests across the
//! workspace. Seeded from a JSON array of [`CollegeCutoff`] rows.

use std::path::Path;

use async_trait::async_trait;
use tracing::info;

use crate::analysis;
use crate::data::{
    BranchMatch, BranchPopularity, CollegeBranches, CollegeCutoff, CollegeData, Comparison,
    CutoffTrends, NameMatch, RankAnalysis, SortOrder,
};
use crate::error::DataError;

const BUILTIN_DATASET: &str = include_str!("../data/sample_cutoffs.json");

#[derive(Debug, Clone, Default)]
pub struct MemoryCollegeData {
    rows: Vec<CollegeCutoff>,
}

impl MemoryCollegeData {
    pub fn new(rows: Vec<CollegeCutoff>) -> Self {
        Self { rows }
    }

    /// Load rows from a JSON file (`[{college_code, college_name, branch_name, round, cutoff_rank}, ...]`).
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, DataError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)?;
        let rows: Vec<CollegeCutoff> = serde_json::from_str(&raw)?;
        info!(path = %path.display(), rows = rows.len(), "loaded cutoff dataset");
        Ok(Self::new(rows))
    }

    /// The small dataset bundled with the crate.
    pub fn builtin() -> Result<Self, DataError> {
        Ok(Self::new(serde_json::from_str(BUILTIN_DATASET)?))
    }

    pub fn rows(&self) -> &[CollegeCutoff] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[async_trait]
impl CollegeData for MemoryCollegeData {
    async fn get_colleges_by_rank(
        &self,
        rank: i64,
        round: u8,
        limit: usize,
        sort_order: SortOrder,
    ) -> Result<Vec<CollegeCutoff>, DataError> {
        Ok(analysis::reachable(&self.rows, Some(rank), &[], round, limit, sort_order))
    }

    async fn get_colleges_by_branch(
        &self,
        branch: &str,
        round: u8,
        limit: usize,
    ) -> Result<Vec<CollegeCutoff>, DataError> {
        Ok(analysis::by_branch(&self.rows, branch, round, limit))
    }

    async fn search_colleges(
        &self,
        min_rank: Option<i64>,
        branches: &[String],
        round: u8,
        limit: usize,
    ) -> Result<Vec<CollegeCutoff>, DataError> {
        Ok(analysis::reachable(&self.rows, min_rank, branches, round, limit, SortOrder::Asc))
    }

    async fn count_colleges(
        &self,
        min_rank: Option<i64>,
        branches: &[String],
        round: u8,
    ) -> Result<usize, DataError> {
        Ok(analysis::count_reachable(&self.rows, min_rank, branches, round))
    }

    async fn get_all_branches(&self) -> Result<Vec<String>, DataError> {
        Ok(analysis::distinct_branches(&self.rows))
    }

    async fn get_college_branches(&self, college_code: &str) -> Result<CollegeBranches, DataError> {
        analysis::college_branches(&self.rows, college_code)
    }

    async fn search_college_by_name(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<NameMatch>, DataError> {
        Ok(analysis::name_matches(&self.rows, query, limit))
    }

    async fn match_branch_names(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<BranchMatch>, DataError> {
        Ok(analysis::branch_matches(&self.rows, query, limit))
    }

    async fn compare_colleges(&self, codes: &[String], round: u8) -> Result<Comparison, DataError> {
        analysis::compare(&self.rows, codes, round)
    }

    async fn analyze_rank_prospects(&self, rank: i64, round: u8) -> Result<RankAnalysis, DataError> {
        Ok(analysis::analyze_rank(&self.rows, rank, round))
    }

    async fn get_branch_popularity(
        &self,
        branch_name: Option<&str>,
        round: u8,
    ) -> Result<BranchPopularity, DataError> {
        match branch_name {
            Some(name) => analysis::branch_detail(&self.rows, name, round).map(BranchPopularity::Branch),
            None => analysis::branch_overview(&self.rows, round).map(BranchPopularity::All),
        }
    }

    async fn get_cutoff_trends(
        &self,
        college_code: &str,
        branch_name: &str,
    ) -> Result<CutoffTrends, DataError> {
        analysis::cutoff_trends(&self.rows, college_code, branch_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn builtin_dataset_answers_queries() {
        let data = MemoryCollegeData::builtin().unwrap();
        assert!(!data.is_empty());

        let branches = data.get_all_branches().await.unwrap();
        assert!(branches.contains(&"Computer Science and Engineering".to_string()));

        let hits = data.get_colleges_by_rank(5_000, 1, 5, SortOrder::Asc).await.unwrap();
        assert_eq!(hits.len(), 5);
        assert!(hits.windows(2).all(|w| w[0].cutoff_rank <= w[1].cutoff_rank));
        assert!(hits.iter().all(|r| r.cutoff_rank >= 5_000 && r.round == 1));

        let found = data.search_college_by_name("RVCE", 1).await.unwrap();
        assert_eq!(found[0].college_code, "E005");
    }

    #[tokio::test]
    async fn popularity_dispatches_on_branch() {
        let data = MemoryCollegeData::builtin().unwrap();
        let all = data.get_branch_popularity(None, 1).await.unwrap();
        assert!(matches!(all, BranchPopularity::All(_)));
        let one = data
            .get_branch_popularity(Some("Civil Engineering"), 1)
            .await
            .unwrap();
        assert!(matches!(one, BranchPopularity::Branch(ref d) if d.total_colleges > 0));
    }

    #[test]
    fn loads_from_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[{{"college_code":"E1","college_name":"Test College","branch_name":"Civil Engineering","round":1,"cutoff_rank":1000}}]"#
        )
        .unwrap();
        let data = MemoryCollegeData::from_json_file(file.path()).unwrap();
        assert_eq!(data.len(), 1);

        assert!(MemoryCollegeData::from_json_file("/definitely/missing.json").is_err());
    }
}
