//! Deterministic markdown renderings for the fast path.
//!
//! Every function here is pure: identical data renders to identical text.

use pathfinder_core::data::{
    BranchPopularityDetail, CollegeBranches, CollegeCutoff, Comparison, CutoffTrends, NameMatch,
    PopularityOverview, RankAnalysis, RankOption,
};
use pathfinder_core::text::{ellipsize, format_number, format_opt_number, take_chars};

/// Admission chance from the margin between cutoff and rank.
pub fn chance_indicator(rank: i64, cutoff: i64) -> &'static str {
    match cutoff - rank {
        m if m <= 2_000 => "High",
        m if m <= 5_000 => "Good",
        m if m <= 10_000 => "Moderate",
        _ => "Low",
    }
}

/// `total` is the size of the whole result set; `colleges` may hold only its head.
pub fn colleges_by_rank(
    colleges: &[CollegeCutoff],
    total: usize,
    rank: i64,
    round: u8,
    limit: usize,
    branches: &[String],
) -> String {
    if colleges.is_empty() {
        let branch_text = if branches.is_empty() {
            String::new()
        } else {
            format!(" for {}", branches.join(", "))
        };
        return format!(
            "No colleges found for rank {}{} in Round {}.",
            format_number(rank),
            branch_text,
            round
        );
    }

    let total = total.max(colleges.len());
    let branch_text = match branches {
        [] => String::new(),
        [one] => format!(" ({})", one),
        many => format!(" ({} branches)", many.len()),
    };

    let mut lines = vec![
        format!(
            "Found {} college options for rank {}{} (Round {}):",
            total,
            format_number(rank),
            branch_text,
            round
        ),
        String::new(),
        "| # | College | Branch | Cutoff | Chance |".to_string(),
        "|---|---------|--------|--------|--------|".to_string(),
    ];

    let shown = limit.min(colleges.len());
    for (i, college) in colleges.iter().take(shown).enumerate() {
        lines.push(format!(
            "| {} | {} | {} | {} | {} |",
            i + 1,
            ellipsize(&college.college_name, 40),
            ellipsize(&college.branch_name, 25),
            format_number(college.cutoff_rank),
            chance_indicator(rank, college.cutoff_rank)
        ));
    }

    if total > shown {
        lines.push(format!("\n*Showing {} of {} options.*", shown, total));
    }
    lines.join("\n")
}

pub fn colleges_by_branch(
    colleges: &[CollegeCutoff],
    total: usize,
    branch: &str,
    round: u8,
    limit: usize,
) -> String {
    if colleges.is_empty() {
        return format!("No colleges found offering {} in Round {}.", branch, round);
    }

    let total = total.max(colleges.len());
    let mut lines = vec![
        format!("Found {} colleges offering {} (Round {}):", total, branch, round),
        String::new(),
        "| # | College | Cutoff Rank |".to_string(),
        "|---|---------|-------------|".to_string(),
    ];

    let shown = limit.min(colleges.len());
    for (i, college) in colleges.iter().take(shown).enumerate() {
        lines.push(format!(
            "| {} | {} | {} |",
            i + 1,
            ellipsize(&college.college_name, 45),
            format_number(college.cutoff_rank)
        ));
    }

    if total > shown {
        lines.push(format!("\n*Showing {} of {} colleges.*", shown, total));
    }
    lines.join("\n")
}

pub fn all_branches(branches: &[String]) -> String {
    if branches.is_empty() {
        return "No branches found in the database.".to_string();
    }
    let mut lines = vec![
        format!("Available Engineering Branches ({} total):", branches.len()),
        String::new(),
    ];
    lines.extend(branches.iter().enumerate().map(|(i, b)| format!("{}. {}", i + 1, b)));
    lines.join("\n")
}

pub fn college_info(info: &CollegeBranches) -> String {
    if info.branches.is_empty() {
        return format!("No branch information found for {}.", info.college_name);
    }

    let mut lines = vec![
        format!("**{}**", info.college_name),
        format!("Total Branches: {}", info.branches.len()),
        String::new(),
        "| Branch | Round 1 | Round 2 | Round 3 |".to_string(),
        "|--------|---------|---------|---------|".to_string(),
    ];
    for branch in &info.branches {
        let ranks = &branch.cutoff_ranks;
        lines.push(format!(
            "| {} | {} | {} | {} |",
            ellipsize(&branch.branch_name, 35),
            format_opt_number(ranks.round1),
            format_opt_number(ranks.round2),
            format_opt_number(ranks.round3)
        ));
    }
    lines.join("\n")
}

pub fn search_college(results: &[NameMatch], query: &str) -> String {
    if results.is_empty() {
        return format!("No colleges found matching '{}'.", query);
    }

    let mut lines = vec![
        format!("Colleges matching '{}':", query),
        String::new(),
        "| College | Code | Match |".to_string(),
        "|---------|------|-------|".to_string(),
    ];
    for result in results.iter().take(10) {
        lines.push(format!(
            "| {} | {} | {}% |",
            ellipsize(&result.college_name, 45),
            result.college_code,
            (result.match_score * 100.0) as i64
        ));
    }
    lines.join("\n")
}

pub fn compare_colleges(comparison: &Comparison) -> String {
    let colleges = &comparison.comparison;
    if colleges.is_empty() {
        return "No comparison data available.".to_string();
    }

    let row = |label: &str, cells: Vec<String>| format!("| {} | {} |", label, cells.join(" | "));

    let names: Vec<String> = colleges
        .iter()
        .map(|c| take_chars(&c.college_name, 25).to_string())
        .collect();

    let lines = vec![
        format!("College Comparison (Round {}):", comparison.round),
        String::new(),
        row("Metric", names),
        format!("|--------|{}|", vec!["-------"; colleges.len()].join("|")),
        row("Code", colleges.iter().map(|c| c.college_code.clone()).collect()),
        row(
            "Branches",
            colleges.iter().map(|c| c.total_branches.to_string()).collect(),
        ),
        row(
            "Best Cutoff",
            colleges.iter().map(|c| format_opt_number(c.best_cutoff)).collect(),
        ),
        row(
            "Avg Cutoff",
            colleges.iter().map(|c| format_opt_number(c.avg_cutoff)).collect(),
        ),
        row(
            "Worst Cutoff",
            colleges.iter().map(|c| format_opt_number(c.worst_cutoff)).collect(),
        ),
        row(
            "Best Branch",
            colleges
                .iter()
                .map(|c| match c.best_branch.as_deref() {
                    Some(b) if !b.is_empty() => ellipsize(b, 20),
                    _ => "-".to_string(),
                })
                .collect(),
        ),
    ];
    lines.join("\n")
}

fn option_table(title: &str, options: &[RankOption], lines: &mut Vec<String>) {
    lines.push(title.to_string());
    lines.push("| College | Branch | Cutoff |".to_string());
    lines.push("|---------|--------|--------|".to_string());
    for option in options.iter().take(5) {
        lines.push(format!(
            "| {} | {} | {} |",
            ellipsize(&option.college_name, 35),
            ellipsize(&option.branch, 20),
            format_number(option.cutoff_rank)
        ));
    }
}

pub fn analyze_rank(analysis: &RankAnalysis) -> String {
    if analysis.total_options == 0 {
        return format!(
            "No colleges found for rank {}. The rank may be too low for available options.",
            format_number(analysis.rank)
        );
    }

    let summary = &analysis.summary;
    let mut lines = vec![
        format!(
            "**Rank Analysis: {}** (Round {})",
            format_number(analysis.rank),
            analysis.round
        ),
        String::new(),
        format!("Percentile: {}", analysis.percentile),
        format!("Total Options: {}", analysis.total_options),
        String::new(),
        "**Category Breakdown:**".to_string(),
        format!("- Safe (Best): {} colleges", summary.best_options),
        format!("- Good: {} colleges", summary.good_options),
        format!("- Moderate: {} colleges", summary.moderate_options),
        format!("- Reach: {} colleges", summary.reach_options),
        String::new(),
    ];

    let categories = &analysis.categories;
    if !categories.best.is_empty() {
        option_table("**Top Safe Options:**", &categories.best, &mut lines);
        lines.push(String::new());
    }
    if !categories.good.is_empty() {
        option_table("**Good Options:**", &categories.good, &mut lines);
    }
    lines.join("\n")
}

pub fn branch_popularity_all(overview: &PopularityOverview) -> String {
    if overview.branches.is_empty() {
        return "No branch data available.".to_string();
    }

    let mut lines = vec![
        format!("**Branch Popularity** (Round {})", overview.round),
        String::new(),
        "| Branch | Colleges | Best Cutoff | Avg Cutoff | Level |".to_string(),
        "|--------|----------|-------------|------------|-------|".to_string(),
    ];
    for b in overview.branches.iter().take(25) {
        lines.push(format!(
            "| {} | {} | {} | {} | {} |",
            ellipsize(&b.branch_name, 30),
            b.college_count,
            format_number(b.best_cutoff),
            format_number(b.avg_cutoff),
            b.competitiveness
        ));
    }
    lines.join("\n")
}

pub fn branch_popularity_specific(detail: &BranchPopularityDetail) -> String {
    let mut lines = vec![
        format!("**{}** (Round {})", detail.branch_name, detail.round),
        String::new(),
        format!("- Total Colleges: {}", detail.total_colleges),
        format!("- Best Cutoff: {}", format_number(detail.best_cutoff)),
        format!("- Average Cutoff: {}", format_number(detail.avg_cutoff)),
        format!("- Worst Cutoff: {}", format_number(detail.worst_cutoff)),
        format!("- Competition Level: {}", detail.competitiveness),
        String::new(),
    ];

    if !detail.top_colleges.is_empty() {
        lines.push("**Top Colleges:**".to_string());
        lines.push("| College | Cutoff |".to_string());
        lines.push("|---------|--------|".to_string());
        for c in detail.top_colleges.iter().take(10) {
            lines.push(format!(
                "| {} | {} |",
                ellipsize(&c.college_name, 40),
                format_number(c.cutoff_rank)
            ));
        }
    }
    lines.join("\n")
}

pub fn cutoff_trends(trends: &CutoffTrends) -> String {
    let t = &trends.cutoff_trends;
    [
        format!("**Cutoff Trends: {}**", trends.college_name),
        format!("Branch: {}", trends.branch_name),
        String::new(),
        "| Round | Cutoff Rank |".to_string(),
        "|-------|-------------|".to_string(),
        format!("| Round 1 | {} |", format_opt_number(t.round1)),
        format!("| Round 2 | {} |", format_opt_number(t.round2)),
        format!("| Round 3 | {} |", format_opt_number(t.round3)),
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathfinder_core::data::{BranchCutoffs, CollegeComparison, RankCategories, RankSummary, RoundCutoffs};

    fn row(name: &str, branch: &str, cutoff: i64) -> CollegeCutoff {
        CollegeCutoff {
            college_code: "E001".into(),
            college_name: name.into(),
            branch_name: branch.into(),
            round: 1,
            cutoff_rank: cutoff,
        }
    }

    #[test]
    fn chance_bands() {
        assert_eq!(chance_indicator(5_000, 7_000), "High");
        assert_eq!(chance_indicator(5_000, 10_000), "Good");
        assert_eq!(chance_indicator(5_000, 15_000), "Moderate");
        assert_eq!(chance_indicator(5_000, 15_001), "Low");
    }

    #[test]
    fn rank_table_exact_output() {
        let rows = vec![
            row("R V College of Engineering", "Computer Science and Engineering", 6_500),
            row("Siddaganga Institute of Technology Tumkur Karnataka", "Civil Engineering", 21_000),
        ];
        let text = colleges_by_rank(&rows, 2, 5_000, 2, 20, &["Computer Science and Engineering".to_string()]);
        assert_eq!(
            text,
            "Found 2 college options for rank 5,000 (Computer Science and Engineering) (Round 2):\n\
             \n\
             | # | College | Branch | Cutoff | Chance |\n\
             |---|---------|--------|--------|--------|\n\
             | 1 | R V College of Engineering | Computer Science and E... | 6,500 | High |\n\
             | 2 | Siddaganga Institute of Technology Tu... | Civil Engineering | 21,000 | Low |"
        );
        assert_eq!(text, colleges_by_rank(&rows, 2, 5_000, 2, 20, &["Computer Science and Engineering".to_string()]));
    }

    #[test]
    fn showing_footer_only_when_capped() {
        let rows: Vec<_> = (0..8).map(|i| row("College", "Civil Engineering", 10_000 + i)).collect();

        let capped = colleges_by_rank(&rows, 8, 9_000, 1, 5, &[]);
        let data_rows = capped.lines().filter(|l| l.starts_with("| ") && !l.starts_with("| #")).count();
        assert_eq!(data_rows, 5);
        assert!(capped.ends_with("\n\n*Showing 5 of 8 options.*"));

        let full = colleges_by_rank(&rows, 8, 9_000, 1, 8, &[]);
        assert!(!full.contains("Showing"));

        let by_branch = colleges_by_branch(&rows, 8, "Civil Engineering", 1, 3);
        assert!(by_branch.ends_with("*Showing 3 of 8 colleges.*"));

        // only the head of a larger result set was fetched
        let head = colleges_by_rank(&rows[..5], 300, 9_000, 1, 5, &[]);
        assert!(head.starts_with("Found 300 college options"));
        assert!(head.ends_with("*Showing 5 of 300 options.*"));
    }

    #[test]
    fn empty_results() {
        assert_eq!(
            colleges_by_rank(&[], 0, 12_345, 1, 20, &["A".to_string(), "B".to_string()]),
            "No colleges found for rank 12,345 for A, B in Round 1."
        );
        assert_eq!(
            colleges_by_branch(&[], 0, "Civil Engineering", 3, 20),
            "No colleges found offering Civil Engineering in Round 3."
        );
        assert_eq!(all_branches(&[]), "No branches found in the database.");
        assert_eq!(search_college(&[], "xyz"), "No colleges found matching 'xyz'.");
    }

    #[test]
    fn college_info_marks_missing_rounds() {
        let info = CollegeBranches {
            college_code: "E005".into(),
            college_name: "R V College of Engineering".into(),
            branches: vec![BranchCutoffs {
                branch_name: "Civil Engineering".into(),
                cutoff_ranks: RoundCutoffs {
                    round1: Some(15_000),
                    round2: None,
                    round3: Some(17_250),
                },
            }],
        };
        assert_eq!(
            college_info(&info),
            "**R V College of Engineering**\nTotal Branches: 1\n\n\
             | Branch | Round 1 | Round 2 | Round 3 |\n\
             |--------|---------|---------|---------|\n\
             | Civil Engineering | 15,000 | - | 17,250 |"
        );
    }

    #[test]
    fn comparison_columns() {
        let college = |code: &str, name: &str| CollegeComparison {
            college_code: code.into(),
            college_name: name.into(),
            total_branches: 4,
            best_cutoff: Some(1_200),
            avg_cutoff: Some(4_550),
            worst_cutoff: Some(9_000),
            best_branch: Some("Computer Science and Engineering".into()),
            worst_branch: None,
            branches: vec![],
        };
        let text = compare_colleges(&Comparison {
            comparison: vec![
                college("E005", "R V College of Engineering"),
                college("E012", "B M S College of Engineering"),
            ],
            round: 1,
        });
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[2], "| Metric | R V College of Engineerin | B M S College of Engineer |");
        assert_eq!(lines[3], "|--------|-------|-------|");
        assert_eq!(lines[4], "| Code | E005 | E012 |");
        assert_eq!(lines[6], "| Best Cutoff | 1,200 | 1,200 |");
        assert_eq!(lines[9], "| Best Branch | Computer Science ... | Computer Science ... |");
    }

    #[test]
    fn rank_analysis_sections() {
        let option = RankOption {
            college_name: "B M S College of Engineering".into(),
            college_code: "E012".into(),
            branch: "Mechanical Engineering".into(),
            cutoff_rank: 22_000,
        };
        let analysis = RankAnalysis {
            rank: 10_000,
            round: 1,
            percentile: "72.4%".into(),
            total_options: 1,
            summary: RankSummary {
                best_options: 1,
                good_options: 0,
                moderate_options: 0,
                reach_options: 0,
            },
            categories: RankCategories {
                best: vec![option],
                good: vec![],
                moderate: vec![],
                reach: vec![],
            },
        };
        let text = analyze_rank(&analysis);
        assert!(text.starts_with("**Rank Analysis: 10,000** (Round 1)\n\nPercentile: 72.4%\nTotal Options: 1"));
        assert!(text.contains("- Safe (Best): 1 colleges"));
        assert!(text.contains("| B M S College of Engineering | Mechanical Engine... | 22,000 |"));
        assert!(!text.contains("**Good Options:**"));

        let none = RankAnalysis {
            total_options: 0,
            ..analysis
        };
        assert_eq!(
            analyze_rank(&none),
            "No colleges found for rank 10,000. The rank may be too low for available options."
        );
    }

    #[test]
    fn trends_table() {
        let trends = CutoffTrends {
            college_code: "E005".into(),
            college_name: "R V College of Engineering".into(),
            branch_name: "Civil Engineering".into(),
            cutoff_trends: RoundCutoffs {
                round1: Some(15_000),
                round2: Some(16_100),
                round3: None,
            },
        };
        assert!(cutoff_trends(&trends).ends_with("| Round 2 | 16,100 |\n| Round 3 | - |"));
    }
}
