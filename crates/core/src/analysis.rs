//! Aggregations over cutoff rows.
//!
//! Every [`CollegeData`](crate::data::CollegeData) backend loads the relevant
//! [`CollegeCutoff`] rows its own way and then defers to these functions, so the
//! in-memory and SQL backends answer identically.

use std::collections::{BTreeMap, HashMap};

use crate::data::{
    BranchCollege, BranchCutoff, BranchCutoffs, BranchMatch, BranchPopularityDetail, BranchStats,
    CollegeBranches, CollegeComparison, CollegeCutoff, Comparison, CutoffTrends, NameMatch,
    PopularityOverview, RankAnalysis, RankCategories, RankOption, RankSummary, RoundCutoffs,
    SortOrder,
};
use crate::error::DataError;
use crate::fuzzy;

/// Margin (cutoff minus rank) thresholds for the rank categories.
pub const BEST_MARGIN: i64 = 10_000;
pub const GOOD_MARGIN: i64 = 5_000;
pub const MODERATE_MARGIN: i64 = 2_000;

pub fn competitiveness(avg_cutoff: i64) -> &'static str {
    match avg_cutoff {
        c if c < 10_000 => "Very High",
        c if c < 30_000 => "High",
        c if c < 60_000 => "Moderate",
        _ => "Low",
    }
}

fn sort_by_cutoff(rows: &mut [CollegeCutoff], order: SortOrder) {
    rows.sort_by(|a, b| {
        let ord = a
            .cutoff_rank
            .cmp(&b.cutoff_rank)
            .then_with(|| a.college_name.cmp(&b.college_name));
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

fn same_branch(a: &str, b: &str) -> bool {
    a.trim().eq_ignore_ascii_case(b.trim())
}

fn rounded_mean(values: &[i64]) -> i64 {
    if values.is_empty() {
        return 0;
    }
    let sum: i64 = values.iter().sum();
    (sum as f64 / values.len() as f64).round() as i64
}

/// Rows of `round` reachable at `rank`, optionally restricted to `branches`.
pub fn reachable(
    rows: &[CollegeCutoff],
    rank: Option<i64>,
    branches: &[String],
    round: u8,
    limit: usize,
    order: SortOrder,
) -> Vec<CollegeCutoff> {
    let mut hits: Vec<CollegeCutoff> = rows
        .iter()
        .filter(|r| r.round == round)
        .filter(|r| rank.map_or(true, |rank| r.cutoff_rank >= rank))
        .filter(|r| branches.is_empty() || branches.iter().any(|b| same_branch(b, &r.branch_name)))
        .cloned()
        .collect();
    sort_by_cutoff(&mut hits, order);
    hits.truncate(limit);
    hits
}

/// Number of rows [`reachable`] would return without a limit.
pub fn count_reachable(rows: &[CollegeCutoff], rank: Option<i64>, branches: &[String], round: u8) -> usize {
    rows.iter()
        .filter(|r| r.round == round)
        .filter(|r| rank.map_or(true, |rank| r.cutoff_rank >= rank))
        .filter(|r| branches.is_empty() || branches.iter().any(|b| same_branch(b, &r.branch_name)))
        .count()
}

pub fn by_branch(rows: &[CollegeCutoff], branch: &str, round: u8, limit: usize) -> Vec<CollegeCutoff> {
    reachable(rows, None, &[branch.to_string()], round, limit, SortOrder::Asc)
}

pub fn distinct_branches(rows: &[CollegeCutoff]) -> Vec<String> {
    let mut names: Vec<String> = rows.iter().map(|r| r.branch_name.clone()).collect();
    names.sort();
    names.dedup();
    names
}

pub fn college_branches(rows: &[CollegeCutoff], college_code: &str) -> Result<CollegeBranches, DataError> {
    let own: Vec<&CollegeCutoff> = rows
        .iter()
        .filter(|r| r.college_code.eq_ignore_ascii_case(college_code))
        .collect();
    let first = own.first().ok_or_else(|| DataError::college_not_found(college_code))?;

    let mut per_branch: BTreeMap<&str, RoundCutoffs> = BTreeMap::new();
    for row in &own {
        per_branch
            .entry(row.branch_name.as_str())
            .or_default()
            .set(row.round, row.cutoff_rank);
    }

    Ok(CollegeBranches {
        college_code: first.college_code.clone(),
        college_name: first.college_name.clone(),
        branches: per_branch
            .into_iter()
            .map(|(name, cutoff_ranks)| BranchCutoffs {
                branch_name: name.to_string(),
                cutoff_ranks,
            })
            .collect(),
    })
}

/// Fuzzy college lookup by name; an exact code match scores 1.0.
pub fn name_matches(rows: &[CollegeCutoff], query: &str, limit: usize) -> Vec<NameMatch> {
    let mut colleges: BTreeMap<&str, &str> = BTreeMap::new();
    for row in rows {
        colleges.entry(row.college_code.as_str()).or_insert(row.college_name.as_str());
    }

    let query = query.trim();
    let mut matches: Vec<NameMatch> = colleges
        .into_iter()
        .map(|(code, name)| {
            let score = if code.eq_ignore_ascii_case(query) {
                1.0
            } else {
                fuzzy::similarity(query, name)
            };
            NameMatch {
                college_name: name.to_string(),
                college_code: code.to_string(),
                match_score: score,
            }
        })
        .filter(|m| m.match_score > 0.0)
        .collect();
    matches.sort_by(|a, b| {
        b.match_score
            .partial_cmp(&a.match_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.college_name.cmp(&b.college_name))
    });
    matches.truncate(limit);
    matches
}

pub fn branch_matches(rows: &[CollegeCutoff], query: &str, limit: usize) -> Vec<BranchMatch> {
    let names = distinct_branches(rows);
    fuzzy::rank_candidates(query, names.iter().map(String::as_str), limit)
        .into_iter()
        .map(|(name, score)| BranchMatch {
            branch_name: name.to_string(),
            match_score: score,
        })
        .collect()
}

/// Collapse duplicate rows (several seat categories) to the best cutoff per college and branch.
fn best_per_college_branch<'a>(rows: impl Iterator<Item = &'a CollegeCutoff>) -> Vec<CollegeCutoff> {
    let mut best: HashMap<(String, String), CollegeCutoff> = HashMap::new();
    for row in rows {
        let key = (row.college_code.clone(), row.branch_name.clone());
        match best.get_mut(&key) {
            Some(current) if current.cutoff_rank <= row.cutoff_rank => {}
            Some(current) => *current = row.clone(),
            None => {
                best.insert(key, row.clone());
            }
        }
    }
    let mut out: Vec<CollegeCutoff> = best.into_values().collect();
    sort_by_cutoff(&mut out, SortOrder::Asc);
    out
}

pub fn compare(rows: &[CollegeCutoff], codes: &[String], round: u8) -> Result<Comparison, DataError> {
    let mut comparison = Vec::new();
    for code in codes {
        let own = best_per_college_branch(
            rows.iter()
                .filter(|r| r.round == round && r.college_code.eq_ignore_ascii_case(code)),
        );
        let (Some(best), Some(worst)) = (own.first(), own.last()) else {
            continue;
        };
        let cutoffs: Vec<i64> = own.iter().map(|r| r.cutoff_rank).collect();
        comparison.push(CollegeComparison {
            college_code: best.college_code.clone(),
            college_name: best.college_name.clone(),
            total_branches: own.len(),
            best_cutoff: Some(best.cutoff_rank),
            avg_cutoff: Some(rounded_mean(&cutoffs)),
            worst_cutoff: Some(worst.cutoff_rank),
            best_branch: Some(best.branch_name.clone()),
            worst_branch: Some(worst.branch_name.clone()),
            branches: own
                .iter()
                .map(|r| BranchCutoff {
                    branch_name: r.branch_name.clone(),
                    cutoff_rank: r.cutoff_rank,
                })
                .collect(),
        });
    }

    if comparison.is_empty() {
        return Err(DataError::NoDataFound(format!(
            "No comparison data found for the selected colleges in Round {}.",
            round
        )));
    }
    Ok(Comparison { comparison, round })
}

/// Share of the round's cutoff range lying above `rank`, e.g. `"87.5%"`.
pub fn percentile(rows: &[CollegeCutoff], rank: i64, round: u8) -> String {
    let cutoffs = rows.iter().filter(|r| r.round == round).map(|r| r.cutoff_rank);
    let (min, max) = cutoffs.fold((i64::MAX, i64::MIN), |(lo, hi), c| (lo.min(c), hi.max(c)));
    let value = if min > max {
        0.0
    } else if max == min {
        if rank <= min { 100.0 } else { 0.0 }
    } else {
        ((max - rank) as f64 / (max - min) as f64 * 100.0).clamp(0.0, 100.0)
    };
    format!("{:.1}%", value)
}

pub fn analyze_rank(rows: &[CollegeCutoff], rank: i64, round: u8) -> RankAnalysis {
    let options = best_per_college_branch(
        rows.iter()
            .filter(|r| r.round == round && r.cutoff_rank >= rank),
    );

    let mut categories = RankCategories::default();
    for row in &options {
        let option = RankOption {
            college_name: row.college_name.clone(),
            college_code: row.college_code.clone(),
            branch: row.branch_name.clone(),
            cutoff_rank: row.cutoff_rank,
        };
        let margin = row.cutoff_rank - rank;
        let bucket = if margin >= BEST_MARGIN {
            &mut categories.best
        } else if margin >= GOOD_MARGIN {
            &mut categories.good
        } else if margin >= MODERATE_MARGIN {
            &mut categories.moderate
        } else {
            &mut categories.reach
        };
        bucket.push(option);
    }

    RankAnalysis {
        rank,
        round,
        percentile: percentile(rows, rank, round),
        total_options: options.len(),
        summary: RankSummary {
            best_options: categories.best.len(),
            good_options: categories.good.len(),
            moderate_options: categories.moderate.len(),
            reach_options: categories.reach.len(),
        },
        categories,
    }
}

fn stats_for(branch_name: &str, colleges: &[CollegeCutoff]) -> BranchStats {
    let cutoffs: Vec<i64> = colleges.iter().map(|r| r.cutoff_rank).collect();
    let avg = rounded_mean(&cutoffs);
    BranchStats {
        branch_name: branch_name.to_string(),
        college_count: colleges.len(),
        best_cutoff: cutoffs.iter().copied().min().unwrap_or(0),
        avg_cutoff: avg,
        worst_cutoff: cutoffs.iter().copied().max().unwrap_or(0),
        competitiveness: competitiveness(avg).to_string(),
    }
}

pub fn branch_overview(rows: &[CollegeCutoff], round: u8) -> Result<PopularityOverview, DataError> {
    let deduped = best_per_college_branch(rows.iter().filter(|r| r.round == round));
    let mut grouped: BTreeMap<&str, Vec<CollegeCutoff>> = BTreeMap::new();
    for row in &deduped {
        grouped.entry(row.branch_name.as_str()).or_default().push(row.clone());
    }
    if grouped.is_empty() {
        return Err(DataError::NoDataFound(format!(
            "No branch data found for Round {}.",
            round
        )));
    }

    let mut branches: Vec<BranchStats> = grouped
        .iter()
        .map(|(name, colleges)| stats_for(name, colleges))
        .collect();
    branches.sort_by(|a, b| {
        a.avg_cutoff
            .cmp(&b.avg_cutoff)
            .then_with(|| a.branch_name.cmp(&b.branch_name))
    });
    Ok(PopularityOverview { round, branches })
}

pub fn branch_detail(
    rows: &[CollegeCutoff],
    branch_name: &str,
    round: u8,
) -> Result<BranchPopularityDetail, DataError> {
    let colleges = best_per_college_branch(
        rows.iter()
            .filter(|r| r.round == round && same_branch(&r.branch_name, branch_name)),
    );
    let Some(first) = colleges.first() else {
        return Err(DataError::NoDataFound(format!(
            "No data found for branch '{}' in Round {}.",
            branch_name, round
        )));
    };

    let canonical = first.branch_name.clone();
    let stats = stats_for(&canonical, &colleges);
    Ok(BranchPopularityDetail {
        branch_name: canonical,
        round,
        total_colleges: stats.college_count,
        best_cutoff: stats.best_cutoff,
        avg_cutoff: stats.avg_cutoff,
        worst_cutoff: stats.worst_cutoff,
        competitiveness: stats.competitiveness,
        top_colleges: colleges
            .iter()
            .take(10)
            .map(|r| BranchCollege {
                college_name: r.college_name.clone(),
                college_code: r.college_code.clone(),
                cutoff_rank: r.cutoff_rank,
            })
            .collect(),
    })
}

pub fn cutoff_trends(
    rows: &[CollegeCutoff],
    college_code: &str,
    branch_name: &str,
) -> Result<CutoffTrends, DataError> {
    let own: Vec<&CollegeCutoff> = rows
        .iter()
        .filter(|r| r.college_code.eq_ignore_ascii_case(college_code))
        .filter(|r| same_branch(&r.branch_name, branch_name))
        .collect();
    let Some(first) = own.first() else {
        return Err(DataError::NoDataFound(format!(
            "No cutoff data found for {} in {}.",
            branch_name, college_code
        )));
    };

    let mut trends = RoundCutoffs::default();
    for row in &own {
        trends.set(row.round, row.cutoff_rank);
    }
    Ok(CutoffTrends {
        college_code: first.college_code.clone(),
        college_name: first.college_name.clone(),
        branch_name: first.branch_name.clone(),
        cutoff_trends: trends,
    })
}

#[cfg(test)]
pub(crate) mod fixtures {
    use crate::data::CollegeCutoff;

    pub fn row(code: &str, name: &str, branch: &str, round: u8, cutoff: i64) -> CollegeCutoff {
        CollegeCutoff {
            college_code: code.to_string(),
            college_name: name.to_string(),
            branch_name: branch.to_string(),
            round,
            cutoff_rank: cutoff,
        }
    }

    pub fn sample() -> Vec<CollegeCutoff> {
        vec![
            row("E005", "R V College of Engineering", "Computer Science and Engineering", 1, 300),
            row("E005", "R V College of Engineering", "Computer Science and Engineering", 2, 420),
            row("E005", "R V College of Engineering", "Civil Engineering", 1, 9_000),
            row("E005", "R V College of Engineering", "Mechanical Engineering", 1, 6_500),
            row("E012", "B M S College of Engineering", "Computer Science and Engineering", 1, 1_200),
            row("E012", "B M S College of Engineering", "Civil Engineering", 1, 21_000),
            row("E048", "Sir M Visvesvaraya Institute of Technology", "Computer Science and Engineering", 1, 14_000),
            row("E048", "Sir M Visvesvaraya Institute of Technology", "Civil Engineering", 1, 70_000),
            row("E048", "Sir M Visvesvaraya Institute of Technology", "Civil Engineering", 1, 65_000),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::sample;
    use super::*;

    #[test]
    fn reachable_filters_round_and_rank() {
        let rows = sample();
        let hits = reachable(&rows, Some(5_000), &[], 1, 10, SortOrder::Asc);
        let cutoffs: Vec<i64> = hits.iter().map(|r| r.cutoff_rank).collect();
        assert_eq!(cutoffs, vec![6_500, 9_000, 14_000, 21_000, 65_000, 70_000]);

        let desc = reachable(&rows, Some(5_000), &[], 1, 2, SortOrder::Desc);
        assert_eq!(desc[0].cutoff_rank, 70_000);
        assert_eq!(desc.len(), 2);

        let civil = reachable(
            &rows,
            Some(5_000),
            &["civil engineering".to_string()],
            1,
            10,
            SortOrder::Asc,
        );
        assert!(civil.iter().all(|r| r.branch_name == "Civil Engineering"));
        assert_eq!(civil.len(), 4);

        assert_eq!(count_reachable(&rows, Some(5_000), &[], 1), 6);
        assert_eq!(count_reachable(&rows, Some(5_000), &["civil engineering".to_string()], 1), 4);
        assert_eq!(count_reachable(&rows, None, &[], 2), 1);
    }

    #[test]
    fn college_branches_groups_rounds() {
        let info = college_branches(&sample(), "e005").unwrap();
        assert_eq!(info.college_name, "R V College of Engineering");
        let cse = info
            .branches
            .iter()
            .find(|b| b.branch_name.starts_with("Computer"))
            .unwrap();
        assert_eq!(cse.cutoff_ranks.round1, Some(300));
        assert_eq!(cse.cutoff_ranks.round2, Some(420));
        assert_eq!(cse.cutoff_ranks.round3, None);

        let err = college_branches(&sample(), "X999").unwrap_err();
        assert!(err.is_presentable());
        assert_eq!(err.to_string(), "College with code 'X999' not found.");
    }

    #[test]
    fn name_search_prefers_code_and_acronym() {
        let rows = sample();
        let by_code = name_matches(&rows, "E012", 3);
        assert_eq!(by_code[0].college_code, "E012");
        assert_eq!(by_code[0].match_score, 1.0);

        let by_acronym = name_matches(&rows, "RVCE", 1);
        assert_eq!(by_acronym[0].college_code, "E005");
        assert!(by_acronym[0].match_score > 0.5);
    }

    #[test]
    fn compare_reports_aggregates_and_skips_unknown() {
        let rows = sample();
        let cmp = compare(&rows, &["E005".into(), "NOPE".into(), "E048".into()], 1).unwrap();
        assert_eq!(cmp.comparison.len(), 2);
        let rv = &cmp.comparison[0];
        assert_eq!(rv.total_branches, 3);
        assert_eq!(rv.best_cutoff, Some(300));
        assert_eq!(rv.worst_cutoff, Some(9_000));
        assert_eq!(rv.avg_cutoff, Some(5_267));
        assert_eq!(rv.best_branch.as_deref(), Some("Computer Science and Engineering"));

        // duplicate civil rows collapse to the better cutoff
        let sir_mv = &cmp.comparison[1];
        assert_eq!(sir_mv.total_branches, 2);
        assert_eq!(sir_mv.worst_cutoff, Some(65_000));

        assert!(matches!(
            compare(&rows, &["NOPE".into()], 1),
            Err(DataError::NoDataFound(_))
        ));
    }

    #[test]
    fn rank_analysis_buckets_by_margin() {
        let analysis = analyze_rank(&sample(), 5_000, 1);
        // margins: 1500 reach, 4000 moderate, 9000 good, 16000/60000 best
        assert_eq!(analysis.summary.reach_options, 1);
        assert_eq!(analysis.summary.moderate_options, 1);
        assert_eq!(analysis.summary.good_options, 1);
        assert_eq!(analysis.summary.best_options, 2);
        assert_eq!(analysis.total_options, 5);
        assert_eq!(analysis.categories.best[0].cutoff_rank, 21_000);
        assert!(analysis.percentile.ends_with('%'));
    }

    #[test]
    fn percentile_formats_one_decimal() {
        let rows = sample();
        // round 1 range is 300..=70000
        assert_eq!(percentile(&rows, 300, 1), "100.0%");
        assert_eq!(percentile(&rows, 70_000, 1), "0.0%");
        assert_eq!(percentile(&rows, 1, 3), "0.0%");
    }

    #[test]
    fn popularity_overview_and_detail() {
        let rows = sample();
        let overview = branch_overview(&rows, 1).unwrap();
        assert_eq!(overview.branches[0].branch_name, "Computer Science and Engineering");
        assert_eq!(overview.branches[0].competitiveness, "Very High");
        let civil = overview
            .branches
            .iter()
            .find(|b| b.branch_name == "Civil Engineering")
            .unwrap();
        assert_eq!(civil.college_count, 3);
        assert_eq!(civil.competitiveness, "Moderate");

        let detail = branch_detail(&rows, "civil engineering", 1).unwrap();
        assert_eq!(detail.branch_name, "Civil Engineering");
        assert_eq!(detail.top_colleges[0].college_code, "E005");
        assert!(branch_detail(&rows, "Aeronautical", 1).is_err());
    }

    #[test]
    fn trends_cover_all_rounds() {
        let trends =
            cutoff_trends(&sample(), "E005", "Computer Science and Engineering").unwrap();
        assert_eq!(trends.cutoff_trends.round1, Some(300));
        assert_eq!(trends.cutoff_trends.round2, Some(420));
        assert!(cutoff_trends(&sample(), "E005", "Biotechnology").is_err());
    }

    #[test]
    fn competitiveness_bands() {
        assert_eq!(competitiveness(9_999), "Very High");
        assert_eq!(competitiveness(10_000), "High");
        assert_eq!(competitiveness(59_999), "Moderate");
        assert_eq!(competitiveness(60_000), "Low");
    }
}
