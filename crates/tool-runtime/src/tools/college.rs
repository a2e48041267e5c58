//! Read-only college data tools.

use std::sync::Arc;

use async_trait::async_trait;
use pathfinder_core::data::{BranchPopularity, SortOrder};
use pathfinder_core::text::format_number;
use pathfinder_core::CollegeData;
use serde_json::{json, Value};

use super::{arg_i64, arg_limit, arg_round, arg_str, arg_str_list};
use crate::tool::{Tool, ToolCallResult, ToolContext, ToolDefinition, ToolError, ToolFamily};

/// Every college tool over one data backend.
pub fn all(data: Arc<dyn CollegeData>) -> Vec<Arc<dyn Tool>> {
    vec![
        Arc::new(CollegesByRankTool::new(data.clone())),
        Arc::new(CollegesByBranchTool::new(data.clone())),
        Arc::new(SearchCollegesTool::new(data.clone())),
        Arc::new(AllBranchesTool::new(data.clone())),
        Arc::new(CollegeBranchesTool::new(data.clone())),
        Arc::new(SearchCollegeByNameTool::new(data.clone())),
        Arc::new(MatchBranchNamesTool::new(data.clone())),
        Arc::new(CompareCollegesTool::new(data.clone())),
        Arc::new(AnalyzeRankTool::new(data.clone())),
        Arc::new(BranchPopularityTool::new(data.clone())),
        Arc::new(CutoffTrendsTool::new(data)),
    ]
}

fn round_property() -> Value {
    json!({"type": "integer", "description": "Counseling round (1, 2 or 3). Defaults to 1."})
}

fn limit_property(default: usize) -> Value {
    json!({"type": "integer", "description": format!("Maximum number of results (1-200). Defaults to {}.", default)})
}

fn required_i64(input: &Value, key: &str) -> Result<i64, ToolError> {
    arg_i64(input, key).ok_or_else(|| ToolError::InvalidInput(format!("'{}' must be a number", key)))
}

fn required_str<'a>(input: &'a Value, key: &str) -> Result<&'a str, ToolError> {
    arg_str(input, key).ok_or_else(|| ToolError::InvalidInput(format!("'{}' must not be empty", key)))
}

macro_rules! data_tool {
    ($name:ident) => {
        pub struct $name {
            data: Arc<dyn CollegeData>,
        }

        impl $name {
            pub fn new(data: Arc<dyn CollegeData>) -> Self {
                Self { data }
            }
        }
    };
}

data_tool!(CollegesByRankTool);
data_tool!(CollegesByBranchTool);
data_tool!(SearchCollegesTool);
data_tool!(AllBranchesTool);
data_tool!(CollegeBranchesTool);
data_tool!(SearchCollegeByNameTool);
data_tool!(MatchBranchNamesTool);
data_tool!(CompareCollegesTool);
data_tool!(AnalyzeRankTool);
data_tool!(BranchPopularityTool);
data_tool!(CutoffTrendsTool);

#[async_trait]
impl Tool for CollegesByRankTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_colleges_by_rank".to_string(),
            description: "List college/branch options whose cutoff rank is at or above the student's rank, \
                          i.e. seats the student can realistically get."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "rank": {"type": "integer", "description": "Student's KCET rank"},
                    "round": round_property(),
                    "limit": limit_property(20),
                    "sort_order": {"type": "string", "enum": ["asc", "desc"], "description": "Order by cutoff rank"}
                },
                "required": ["rank"]
            }),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let rank = required_i64(&input, "rank")?;
        let round = arg_round(&input, "round");
        let sort_order = arg_str(&input, "sort_order")
            .and_then(|s| s.parse::<SortOrder>().ok())
            .unwrap_or_default();
        let rows = self
            .data
            .get_colleges_by_rank(rank, round, arg_limit(&input, 20), sort_order)
            .await?;
        let summary = format!("Found {} colleges for rank {}", rows.len(), format_number(rank));
        Ok(ToolCallResult::success(rows, summary))
    }
}

#[async_trait]
impl Tool for CollegesByBranchTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_colleges_by_branch".to_string(),
            description: "List colleges offering an exact branch name, most competitive first. \
                          Use match_branch_names first to get the exact name."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "branch": {"type": "string", "description": "Exact branch name"},
                    "round": round_property(),
                    "limit": limit_property(20)
                },
                "required": ["branch"]
            }),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let branch = required_str(&input, "branch")?;
        let rows = self
            .data
            .get_colleges_by_branch(branch, arg_round(&input, "round"), arg_limit(&input, 20))
            .await?;
        let summary = format!("Found {} colleges offering {}", rows.len(), branch);
        Ok(ToolCallResult::success(rows, summary))
    }
}

#[async_trait]
impl Tool for SearchCollegesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_colleges".to_string(),
            description: "Search options reachable at a rank, optionally restricted to a list of exact branch names."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "min_rank": {"type": "integer", "description": "Student's rank; only options with cutoff at or above it"},
                    "branches": {"type": "array", "items": {"type": "string"}, "description": "Exact branch names"},
                    "round": round_property(),
                    "limit": limit_property(20)
                }
            }),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let min_rank = arg_i64(&input, "min_rank").or_else(|| arg_i64(&input, "max_rank"));
        let branches = arg_str_list(&input, "branches");
        let rows = self
            .data
            .search_colleges(min_rank, &branches, arg_round(&input, "round"), arg_limit(&input, 20))
            .await?;
        let summary = format!("Found {} matching options", rows.len());
        Ok(ToolCallResult::success(rows, summary))
    }
}

#[async_trait]
impl Tool for AllBranchesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_all_branches".to_string(),
            description: "List every engineering branch in the dataset.".to_string(),
            input_schema: json!({"type": "object", "properties": {}}),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, _input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let branches = self.data.get_all_branches().await?;
        let summary = format!("Found {} branches", branches.len());
        Ok(ToolCallResult::success(branches, summary))
    }
}

#[async_trait]
impl Tool for CollegeBranchesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_college_branches".to_string(),
            description: "All branches offered by one college with cutoff ranks for rounds 1-3. \
                          Use search_college_by_name first to get the college code."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "college_code": {"type": "string", "description": "College code, e.g. E005"}
                },
                "required": ["college_code"]
            }),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let code = required_str(&input, "college_code")?;
        let info = self.data.get_college_branches(code).await?;
        let summary = format!("{} offers {} branches", info.college_name, info.branches.len());
        Ok(ToolCallResult::success(info, summary))
    }
}

#[async_trait]
impl Tool for SearchCollegeByNameTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_college_by_name".to_string(),
            description: "Fuzzy-match a college name, abbreviation or code (\"RV\", \"BMS\", \"ramaiah\") \
                          to college codes with a match score."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "College name as the student wrote it"},
                    "limit": limit_property(5)
                },
                "required": ["query"]
            }),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let query = required_str(&input, "query")?;
        let matches = self.data.search_college_by_name(query, arg_limit(&input, 5)).await?;
        let summary = format!("Found {} colleges matching '{}'", matches.len(), query);
        Ok(ToolCallResult::success(matches, summary))
    }
}

#[async_trait]
impl Tool for MatchBranchNamesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "match_branch_names".to_string(),
            description: "Fuzzy-match a casual branch name (\"CS\", \"AIML\", \"ECE\") to exact branch names."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {"type": "string", "description": "Branch name as the student wrote it"},
                    "limit": limit_property(5)
                },
                "required": ["query"]
            }),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let query = required_str(&input, "query")?;
        let matches = self.data.match_branch_names(query, arg_limit(&input, 5)).await?;
        let summary = format!("Found {} branches matching '{}'", matches.len(), query);
        Ok(ToolCallResult::success(matches, summary))
    }
}

#[async_trait]
impl Tool for CompareCollegesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "compare_colleges".to_string(),
            description: "Compare two to four colleges by code: branch count and best, average and worst cutoffs."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "college_codes": {"type": "array", "items": {"type": "string"}, "description": "College codes, e.g. [\"E005\", \"E012\"]"},
                    "round": round_property()
                },
                "required": ["college_codes"]
            }),
            family: ToolFamily::Comparison,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let codes = arg_str_list(&input, "college_codes");
        if codes.len() < 2 {
            return Err(ToolError::InvalidInput("at least two college codes are required".into()));
        }
        let comparison = self
            .data
            .compare_colleges(&codes, arg_round(&input, "round"))
            .await?;
        let summary = format!("Compared {} colleges", comparison.comparison.len());
        Ok(ToolCallResult::success(comparison, summary))
    }
}

#[async_trait]
impl Tool for AnalyzeRankTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "analyze_rank_prospects".to_string(),
            description: "Overview of a rank: percentile and options grouped into best, good, moderate and reach."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "rank": {"type": "integer", "description": "Student's KCET rank"},
                    "round": round_property()
                },
                "required": ["rank"]
            }),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let rank = required_i64(&input, "rank")?;
        let analysis = self
            .data
            .analyze_rank_prospects(rank, arg_round(&input, "round"))
            .await?;
        let summary = format!(
            "Found {} options for rank {}",
            analysis.total_options,
            format_number(rank)
        );
        Ok(ToolCallResult::success(analysis, summary))
    }
}

#[async_trait]
impl Tool for BranchPopularityTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_branch_popularity".to_string(),
            description: "How competitive branches are: college count, cutoff range and demand level. \
                          Pass branch_name for a single branch."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "branch_name": {"type": "string", "description": "Exact branch name (optional)"},
                    "round": round_property()
                }
            }),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let popularity = self
            .data
            .get_branch_popularity(arg_str(&input, "branch_name"), arg_round(&input, "round"))
            .await?;
        let summary = match &popularity {
            BranchPopularity::Branch(detail) => format!(
                "{} is offered by {} colleges",
                detail.branch_name, detail.total_colleges
            ),
            BranchPopularity::All(overview) => {
                format!("Analyzed popularity of {} branches", overview.branches.len())
            }
        };
        Ok(ToolCallResult::success(popularity, summary))
    }
}

#[async_trait]
impl Tool for CutoffTrendsTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "get_cutoff_trends".to_string(),
            description: "Cutoff ranks of one college and branch across rounds 1-3.".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "college_code": {"type": "string", "description": "College code, e.g. E005"},
                    "branch_name": {"type": "string", "description": "Exact branch name"}
                },
                "required": ["college_code", "branch_name"]
            }),
            family: ToolFamily::Query,
        }
    }

    async fn execute(&self, input: Value, _ctx: &ToolContext) -> Result<ToolCallResult, ToolError> {
        let code = required_str(&input, "college_code")?;
        let branch = required_str(&input, "branch_name")?;
        let trends = self.data.get_cutoff_trends(code, branch).await?;
        let summary = format!(
            "Cutoff trends for {} at {}",
            trends.branch_name, trends.college_name
        );
        Ok(ToolCallResult::success(trends, summary))
    }
}
