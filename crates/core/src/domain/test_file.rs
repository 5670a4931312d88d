use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// A generated test file as returned by the generation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TestFile {
    #[serde(rename = "testname")]
    pub name: String,
    #[serde(rename = "testfilepath")]
    pub path: String,
    #[serde(rename = "parentpath", default)]
    pub parent_path: String,
    pub code: String,
}

impl TestFile {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        parent_path: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            parent_path: parent_path.into(),
            code: code.into(),
        }
    }

    /// Repository-relative path, without a leading slash.
    pub fn repo_path(&self) -> &str {
        self.path.trim_start_matches('/')
    }
}
