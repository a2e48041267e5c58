//! Fixed text: model instructions, greetings and per-tool progress lines.

use serde_json::Value;

/// System instruction for the tool-calling counselor.
pub const SYSTEM_PROMPT: &str = r#"You are a KCET (Karnataka Common Entrance Test) admission counselor helping students choose engineering colleges in Karnataka.

Ground rules:
1. Every college name, branch and cutoff rank you mention must come from a tool result. Never invent data.
2. Call tools before answering. Do not announce that you are going to search; search, then present the results.
3. Several tools may be called in one response when the question needs it (match a branch, then search, then compare).
4. Resolve free-text names yourself: use match_branch_names for branch terms and search_college_by_name for college names instead of asking the student to spell them out.
5. Remember facts the student already gave (rank, category, preferred branches) for the rest of the conversation.

Interpreting requests:
- "CS", "CSE" or "computer" means Computer Science and Engineering; "ECE" means Electronics and Communication Engineering.
- "3k" means 3000 and "32k" means 32000.
- The round is 1 unless the student names another round (1, 2 or 3).
- A college is reachable when its cutoff rank is greater than or equal to the student's rank.
- Only ask a clarifying question when the request is truly ambiguous, for example "engineering" with no branch.

Email:
- When the student asks for a report by email, send it right away with the most fitting send_* tool.
- The recipient defaults to the signed-in student's address; the student name and rank can be taken from the conversation.
- After sending, confirm in one sentence. Report failures plainly.

Formatting:
- Use markdown tables for lists of colleges and for comparisons (columns such as College, Branch, Cutoff, Chance).
- Format ranks with thousands separators (12,345).
- Keep answers focused: a short lead sentence, the table, then one or two practical suggestions.
- Admission chances: margin above 5,000 is good, 2,000 to 5,000 is moderate, below 2,000 is a reach.

Counselling advice (choice filling, document checklists, branch trade-offs) can be answered directly without tools, but any concrete number still needs a tool call."#;

/// Instruction for the one-shot intent classifier. The reply must be a single JSON object.
pub const EXTRACTION_PROMPT: &str = r#"Classify a message sent to a KCET college counseling assistant and extract its parameters.
Reply with one JSON object and nothing else.

Intents:
- colleges_by_rank: colleges reachable with a given rank
- colleges_by_branch: colleges offering a given branch
- colleges_by_rank_and_branch: colleges for a rank restricted to some branches
- college_info: details about one named college
- compare_colleges: two or more named colleges side by side
- analyze_rank: prospects and percentile for a rank
- branch_popularity: how competitive branches are
- list_branches: every available branch
- cutoff_trends: cutoff ranks of one college and branch across rounds
- email_report: the student wants something sent by email
- conversational: greetings, advice, opinions, anything else

Rules:
- "3k" means 3000 and "32k" means 32000.
- round is 1, 2 or 3 and defaults to 1; limit defaults to 20.
- Keep college names exactly as written; they are matched later.
- "CS related" expands to ["computer science", "information science", "artificial intelligence", "data science", "machine learning"].
- "core branches" expands to ["computer science", "electronics", "electrical", "mechanical", "civil"].
- "IT related" expands to ["computer science", "information science", "information technology"].
- needs_llm_response is true for conversational, advice and opinion questions and for anything the fields cannot capture.

Output shape:
{"intent": "...", "rank": number|null, "round": 1|2|3, "limit": number, "branches": [..]|null, "college_names": [..]|null, "email": string|null, "query": string|null, "needs_llm_response": true|false}

Examples:
"show me top 50 colleges for rank 10000"
{"intent": "colleges_by_rank", "rank": 10000, "round": 1, "limit": 50, "branches": null, "college_names": null, "email": null, "query": null, "needs_llm_response": false}
"top 30 CS colleges for rank 3k"
{"intent": "colleges_by_rank_and_branch", "rank": 3000, "round": 1, "limit": 30, "branches": ["computer science"], "college_names": null, "email": null, "query": null, "needs_llm_response": false}
"compare RV and PES"
{"intent": "compare_colleges", "rank": null, "round": 1, "limit": 20, "branches": null, "college_names": ["RV", "PES"], "email": null, "query": null, "needs_llm_response": false}
"hello"
{"intent": "conversational", "rank": null, "round": 1, "limit": 20, "branches": null, "college_names": null, "email": null, "query": null, "needs_llm_response": true}"#;

pub const WELCOME_MESSAGE: &str = "👋 Hello! I'm your AI KCET College Counselor.

I can help you with:
- Finding colleges based on your rank
- Exploring different engineering branches
- Comparing cutoff trends across rounds
- Understanding admission chances
- Counselling strategy and guidance

**To get started**, you can tell me your rank and preferences, or ask me any questions about KCET admissions!

Example questions:
- \"I got rank 5000, which colleges can I get?\"
- \"Show me computer science colleges\"
- \"Compare cutoffs for RV College across all rounds\"
- \"What are the emerging tech branches available?\"";

/// Generic apology shown whenever a turn cannot produce an answer.
pub const ERROR_MESSAGE: &str = "I apologize, but I encountered an error while processing your request. \n\nCould you please:\n- Rephrase your question, or\n- Provide more specific details\n\nI'm here to help! 😊";

pub const UNDERSTANDING_STEP: &str = "💭 Understanding your question...";
pub const FAST_PATH_STEP: &str = "Processing your request...";
pub const EMPTY_ANSWER: &str = "I apologize, but I couldn't generate a response.";
pub const EXHAUSTED_MESSAGE: &str =
    "I've reached the maximum number of attempts to answer your question. Please try rephrasing.";

const TOOL_CALL_MESSAGES: &[(&str, &str)] = &[
    ("get_colleges_by_rank", "🔍 Searching colleges for rank {rank}..."),
    ("get_all_branches", "📚 Fetching all available engineering branches..."),
    ("search_colleges", "🔎 Running advanced search with your filters..."),
    ("get_colleges_by_branch", "🏫 Finding colleges offering {branch}..."),
    ("get_cutoff_trends", "📊 Analyzing cutoff trends..."),
    ("get_college_branches", "🎓 Getting all branches offered..."),
    ("search_college_by_name", "🔍 Searching for college '{query}'..."),
    ("match_branch_names", "📝 Matching branch name '{query}'..."),
    ("analyze_rank_prospects", "📊 Analyzing prospects for rank {rank}..."),
    ("compare_colleges", "⚖️ Comparing colleges..."),
    ("get_branch_popularity", "📈 Analyzing branch popularity..."),
    (
        "send_comprehensive_report_email",
        "📧 Preparing comprehensive KCET analysis report for {email}...",
    ),
    ("send_prediction_summary_email", "📧 Sending college predictions to {email}..."),
    ("send_detailed_analysis_email", "📧 Preparing detailed report for {email}..."),
    ("send_comparison_email", "📧 Emailing comparison report to {email}..."),
    ("send_branch_analysis_email", "📧 Sending branch analysis to {email}..."),
    ("send_admission_tips_email", "📧 Emailing counseling tips to {email}..."),
    ("send_cutoff_trends_email", "📧 Sending trends analysis to {email}..."),
];

/// Progress line shown when `tool` starts.
///
/// Placeholders are filled from `params`; if any of them is missing the raw
/// template is returned.
pub fn tool_call_message(tool: &str, params: &Value) -> String {
    let Some((_, template)) = TOOL_CALL_MESSAGES.iter().find(|(name, _)| *name == tool) else {
        return format!("🔧 Using {}...", tool);
    };
    interpolate(template, params).unwrap_or_else(|| template.to_string())
}

fn interpolate(template: &str, params: &Value) -> Option<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let end = rest[start..].find('}')? + start;
        let key = &rest[start + 1..end];
        let value = match params.get(key)? {
            Value::String(s) => s.clone(),
            Value::Null => return None,
            other => other.to_string(),
        };
        out.push_str(&value);
        rest = &rest[end + 1..];
    }
    out.push_str(rest);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interpolates_parameters() {
        assert_eq!(
            tool_call_message("get_colleges_by_rank", &json!({"rank": 5000, "round": 1})),
            "🔍 Searching colleges for rank 5000..."
        );
        assert_eq!(
            tool_call_message("search_college_by_name", &json!({"query": "RVCE"})),
            "🔍 Searching for college 'RVCE'..."
        );
    }

    #[test]
    fn missing_parameter_keeps_template() {
        assert_eq!(
            tool_call_message("send_comparison_email", &json!({})),
            "📧 Emailing comparison report to {email}..."
        );
    }

    #[test]
    fn unknown_tool_falls_back() {
        assert_eq!(tool_call_message("mystery", &json!({})), "🔧 Using mystery...");
        assert_eq!(
            tool_call_message("compare_colleges", &json!({"college_codes": ["E005"]})),
            "⚖️ Comparing colleges..."
        );
    }
}
