use thiserror::Error;

/// Failures surfaced by a [`crate::data::CollegeData`] backend.
///
/// `CollegeNotFound` and `NoDataFound` carry user-presentable text; the
/// fast path returns their message verbatim.
#[derive(Error, Debug)]
pub enum DataError {
    #[error("{0}")]
    CollegeNotFound(String),

    #[error("{0}")]
    NoDataFound(String),

    #[error("Data backend error: {0}")]
    Backend(String),
}

impl DataError {
    pub fn college_not_found(code: &str) -> Self {
        Self::CollegeNotFound(format!("College with code '{}' not found.", code))
    }

    /// True for the two kinds whose message can be shown to the user as-is.
    pub fn is_presentable(&self) -> bool {
        matches!(self, Self::CollegeNotFound(_) | Self::NoDataFound(_))
    }
}

impl From<std::io::Error> for DataError {
    fn from(e: std::io::Error) -> Self {
        Self::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(e: serde_json::Error) -> Self {
        Self::Backend(format!("Serialization error: {}", e))
    }
}
