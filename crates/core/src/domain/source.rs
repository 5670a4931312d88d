use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Placeholder content for a file or dependency that could not be fetched.
pub const FETCH_ERROR_SENTINEL: &str = "Error fetching content";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Dependency {
    pub name: String,
    pub content: String,
}

impl Dependency {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    pub fn unavailable(name: impl Into<String>) -> Self {
        Self::new(name, FETCH_ERROR_SENTINEL)
    }

    pub fn is_unavailable(&self) -> bool {
        self.content == FETCH_ERROR_SENTINEL
    }
}

/// A changed file together with the content of the files it depends on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    #[serde(default)]
    pub dependencies: Vec<Dependency>,
}

impl SourceFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            content: content.into(),
            dependencies: Vec::new(),
        }
    }

    pub fn unavailable(path: impl Into<String>) -> Self {
        Self::new(path, FETCH_ERROR_SENTINEL)
    }

    pub fn with_dependencies(mut self, dependencies: Vec<Dependency>) -> Self {
        self.dependencies = dependencies;
        self
    }

    pub fn is_unavailable(&self) -> bool {
        self.content == FETCH_ERROR_SENTINEL
    }
}
