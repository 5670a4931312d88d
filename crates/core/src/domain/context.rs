use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::{SourceFile, TestFile};

/// The cacheable unit: the sources a generation was run on and its tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerationContext {
    #[serde(default)]
    pub sources: Vec<SourceFile>,
    #[serde(default)]
    pub tests: Vec<TestFile>,
}

impl GenerationContext {
    pub fn new(sources: Vec<SourceFile>, tests: Vec<TestFile>) -> Self {
        Self { sources, tests }
    }

    /// Keeps the sources and swaps in a fresh set of tests.
    pub fn with_tests(self, tests: Vec<TestFile>) -> Self {
        Self {
            sources: self.sources,
            tests,
        }
    }
}
