//! PostgreSQL-backed cutoff data.
//!
//! Queries narrow the `cutoffs` table to the rows an operation needs; the
//! aggregation itself is shared with the in-memory backend.

use async_trait::async_trait;
use sqlx::PgPool;

use pathfinder_core::analysis;
use pathfinder_core::data::{
    BranchMatch, BranchPopularity, CollegeBranches, CollegeCutoff, Comparison, CutoffTrends,
    NameMatch, RankAnalysis, SortOrder,
};
use pathfinder_core::{CollegeData, DataError};

const SELECT_CUTOFFS: &str =
    "SELECT college_code, college_name, branch_name, round, cutoff_rank FROM cutoffs";

#[derive(sqlx::FromRow)]
struct CutoffRow {
    college_code: String,
    college_name: String,
    branch_name: String,
    round: i16,
    cutoff_rank: i64,
}

impl TryFrom<CutoffRow> for CollegeCutoff {
    type Error = DataError;

    fn try_from(row: CutoffRow) -> Result<Self, Self::Error> {
        let round = u8::try_from(row.round)
            .map_err(|_| DataError::Backend(format!("invalid round {}", row.round)))?;
        Ok(CollegeCutoff {
            college_code: row.college_code,
            college_name: row.college_name,
            branch_name: row.branch_name,
            round,
            cutoff_rank: row.cutoff_rank,
        })
    }
}

fn backend(e: sqlx::Error) -> DataError {
    DataError::Backend(e.to_string())
}

fn into_cutoffs(rows: Vec<CutoffRow>) -> Result<Vec<CollegeCutoff>, DataError> {
    rows.into_iter().map(CollegeCutoff::try_from).collect()
}

pub struct PgCollegeData {
    pool: PgPool,
}

impl PgCollegeData {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn round_rows(&self, round: u8, min_rank: Option<i64>) -> Result<Vec<CollegeCutoff>, DataError> {
        let sql = format!("{SELECT_CUTOFFS} WHERE round = $1 AND cutoff_rank >= $2");
        let rows = sqlx::query_as::<_, CutoffRow>(&sql)
            .bind(i16::from(round))
            .bind(min_rank.unwrap_or(i64::MIN))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        into_cutoffs(rows)
    }

    async fn branch_rows(&self, branch: &str, round: Option<u8>) -> Result<Vec<CollegeCutoff>, DataError> {
        let sql = format!(
            "{SELECT_CUTOFFS} WHERE lower(trim(branch_name)) = lower(trim($1)) \
             AND ($2::smallint IS NULL OR round = $2)"
        );
        let rows = sqlx::query_as::<_, CutoffRow>(&sql)
            .bind(branch)
            .bind(round.map(i16::from))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        into_cutoffs(rows)
    }

    async fn college_rows(&self, codes: &[String], round: Option<u8>) -> Result<Vec<CollegeCutoff>, DataError> {
        let codes: Vec<String> = codes.iter().map(|c| c.trim().to_uppercase()).collect();
        let sql = format!(
            "{SELECT_CUTOFFS} WHERE upper(college_code) = ANY($1) \
             AND ($2::smallint IS NULL OR round = $2)"
        );
        let rows = sqlx::query_as::<_, CutoffRow>(&sql)
            .bind(&codes)
            .bind(round.map(i16::from))
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        into_cutoffs(rows)
    }

    async fn count_rows(&self, round: u8, min_rank: Option<i64>, branches: &[String]) -> Result<usize, DataError> {
        let branches: Vec<String> = branches.iter().map(|b| b.trim().to_lowercase()).collect();
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM cutoffs WHERE round = $1 AND cutoff_rank >= $2 \
             AND (cardinality($3::text[]) = 0 OR lower(trim(branch_name)) = ANY($3))",
        )
        .bind(i16::from(round))
        .bind(min_rank.unwrap_or(i64::MIN))
        .bind(&branches)
        .fetch_one(&self.pool)
        .await
        .map_err(backend)?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// One representative row per distinct value of `column`.
    async fn distinct_rows(&self, column: &str) -> Result<Vec<CollegeCutoff>, DataError> {
        let sql = format!(
            "SELECT DISTINCT ON ({column}) college_code, college_name, branch_name, round, cutoff_rank \
             FROM cutoffs ORDER BY {column}"
        );
        let rows = sqlx::query_as::<_, CutoffRow>(&sql)
            .fetch_all(&self.pool)
            .await
            .map_err(backend)?;
        into_cutoffs(rows)
    }
}

#[async_trait]
impl CollegeData for PgCollegeData {
    async fn get_colleges_by_rank(
        &self,
        rank: i64,
        round: u8,
        limit: usize,
        sort_order: SortOrder,
    ) -> Result<Vec<CollegeCutoff>, DataError> {
        let rows = self.round_rows(round, Some(rank)).await?;
        Ok(analysis::reachable(&rows, Some(rank), &[], round, limit, sort_order))
    }

    async fn get_colleges_by_branch(
        &self,
        branch: &str,
        round: u8,
        limit: usize,
    ) -> Result<Vec<CollegeCutoff>, DataError> {
        let rows = self.branch_rows(branch, Some(round)).await?;
        Ok(analysis::by_branch(&rows, branch, round, limit))
    }

    async fn search_colleges(
        &self,
        min_rank: Option<i64>,
        branches: &[String],
        round: u8,
        limit: usize,
    ) -> Result<Vec<CollegeCutoff>, DataError> {
        let rows = self.round_rows(round, min_rank).await?;
        Ok(analysis::reachable(&rows, min_rank, branches, round, limit, SortOrder::Asc))
    }

    async fn count_colleges(
        &self,
        min_rank: Option<i64>,
        branches: &[String],
        round: u8,
    ) -> Result<usize, DataError> {
        self.count_rows(round, min_rank, branches).await
    }

    async fn get_all_branches(&self) -> Result<Vec<String>, DataError> {
        let rows = self.distinct_rows("branch_name").await?;
        Ok(analysis::distinct_branches(&rows))
    }

    async fn get_college_branches(&self, college_code: &str) -> Result<CollegeBranches, DataError> {
        let rows = self.college_rows(&[college_code.to_string()], None).await?;
        analysis::college_branches(&rows, college_code)
    }

    async fn search_college_by_name(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<NameMatch>, DataError> {
        let rows = self.distinct_rows("college_code").await?;
        Ok(analysis::name_matches(&rows, query, limit))
    }

    async fn match_branch_names(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<BranchMatch>, DataError> {
        let rows = self.distinct_rows("branch_name").await?;
        Ok(analysis::branch_matches(&rows, query, limit))
    }

    async fn compare_colleges(&self, codes: &[String], round: u8) -> Result<Comparison, DataError> {
        let rows = self.college_rows(codes, Some(round)).await?;
        analysis::compare(&rows, codes, round)
    }

    async fn analyze_rank_prospects(&self, rank: i64, round: u8) -> Result<RankAnalysis, DataError> {
        // The percentile needs the whole round, not only reachable rows.
        let rows = self.round_rows(round, None).await?;
        Ok(analysis::analyze_rank(&rows, rank, round))
    }

    async fn get_branch_popularity(
        &self,
        branch_name: Option<&str>,
        round: u8,
    ) -> Result<BranchPopularity, DataError> {
        match branch_name {
            Some(name) => {
                let rows = self.branch_rows(name, Some(round)).await?;
                analysis::branch_detail(&rows, name, round).map(BranchPopularity::Branch)
            }
            None => {
                let rows = self.round_rows(round, None).await?;
                analysis::branch_overview(&rows, round).map(BranchPopularity::All)
            }
        }
    }

    async fn get_cutoff_trends(
        &self,
        college_code: &str,
        branch_name: &str,
    ) -> Result<CutoffTrends, DataError> {
        let rows = self.college_rows(&[college_code.to_string()], None).await?;
        analysis::cutoff_trends(&rows, college_code, branch_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(round: i16) -> CutoffRow {
        CutoffRow {
            college_code: "E005".into(),
            college_name: "R V College of Engineering".into(),
            branch_name: "Computer Science And Engineering".into(),
            round,
            cutoff_rank: 350,
        }
    }

    #[test]
    fn rows_convert_to_cutoffs() {
        let cutoff = CollegeCutoff::try_from(row(2)).unwrap();
        assert_eq!(cutoff.round, 2);
        assert_eq!(cutoff.cutoff_rank, 350);
    }

    #[test]
    fn negative_rounds_are_rejected() {
        assert!(matches!(into_cutoffs(vec![row(1), row(-1)]), Err(DataError::Backend(_))));
    }
}
