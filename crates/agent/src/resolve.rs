//! Resolution of free-text branch and college terms to canonical names and codes.

use std::sync::Arc;

use pathfinder_core::CollegeData;
use tracing::{debug, warn};

/// Minimum fuzzy score for a term to count as resolved.
pub const MATCH_THRESHOLD: f64 = 0.5;

const BRANCH_CANDIDATES: usize = 3;

#[derive(Clone)]
pub struct Resolver {
    data: Arc<dyn CollegeData>,
}

impl Resolver {
    pub fn new(data: Arc<dyn CollegeData>) -> Self {
        Self { data }
    }

    /// Canonical branch names for `terms`, in first-seen order without duplicates.
    ///
    /// Each term may contribute up to three branches ("electronics" matches
    /// both ECE and EEE).
    pub async fn resolve_branches(&self, terms: &[String]) -> Vec<String> {
        let mut resolved: Vec<String> = Vec::new();
        for term in terms {
            let matches = match self.data.match_branch_names(term, BRANCH_CANDIDATES).await {
                Ok(matches) => matches,
                Err(e) => {
                    warn!(term = %term, error = %e, "branch resolution failed");
                    continue;
                }
            };
            for m in matches.into_iter().filter(|m| m.match_score > MATCH_THRESHOLD) {
                if !resolved.contains(&m.branch_name) {
                    resolved.push(m.branch_name);
                }
            }
        }
        debug!(?terms, ?resolved, "branches resolved");
        resolved
    }

    /// College codes for `names`; each name contributes at most its best match.
    pub async fn resolve_college_codes(&self, names: &[String]) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for name in names {
            match self.data.search_college_by_name(name, 1).await {
                Ok(matches) => {
                    if let Some(best) = matches.into_iter().next() {
                        if best.match_score > MATCH_THRESHOLD && !codes.contains(&best.college_code) {
                            codes.push(best.college_code);
                        }
                    }
                }
                Err(e) => warn!(name = %name, error = %e, "college resolution failed"),
            }
        }
        debug!(?names, ?codes, "colleges resolved");
        codes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pathfinder_core::MemoryCollegeData;

    fn resolver() -> Resolver {
        Resolver::new(Arc::new(MemoryCollegeData::builtin().unwrap()))
    }

    #[tokio::test]
    async fn branches_resolve_and_dedupe() {
        let resolved = resolver()
            .resolve_branches(&["cse".to_string(), "computer science".to_string()])
            .await;
        assert_eq!(resolved[0], "Computer Science and Engineering");
        assert_eq!(
            resolved
                .iter()
                .filter(|b| *b == "Computer Science and Engineering")
                .count(),
            1
        );

        assert!(resolver().resolve_branches(&["zzzz".to_string()]).await.is_empty());
    }

    #[tokio::test]
    async fn college_names_resolve_to_codes() {
        let codes = resolver()
            .resolve_college_codes(&["RVCE".to_string(), "qqqq".to_string()])
            .await;
        assert_eq!(codes, vec!["E005"]);
    }
}
