//! Directives embedded in a pull request description.
//!
//! ```text
//! $file: scheduling/schedule_manager.py
//! $dependencies: date_utils.py, scheduling/calendar.py
//! $context: Adds date helpers used by the scheduler.
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

const FILE_PREFIX: &str = "$file:";
const DEPENDENCIES_PREFIX: &str = "$dependencies:";
const CONTEXT_PREFIX: &str = "$context:";

/// Maps a changed file path to the names of the files it depends on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyDirectives(HashMap<String, Vec<String>>);

impl DependencyDirectives {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<String>, dependencies: Vec<String>) {
        self.0.entry(path.into()).or_default().extend(dependencies);
    }

    /// Dependencies declared for `path`; a file without directives has none.
    pub fn for_file(&self, path: &str) -> &[String] {
        self.0.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl FromIterator<(String, Vec<String>)> for DependencyDirectives {
    fn from_iter<I: IntoIterator<Item = (String, Vec<String>)>>(iter: I) -> Self {
        let mut directives = Self::new();
        for (path, deps) in iter {
            directives.insert(path, deps);
        }
        directives
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DescriptionDirectives {
    pub dependencies: DependencyDirectives,
    pub context: String,
}

pub fn parse_description(description: &str) -> DescriptionDirectives {
    let mut parsed = DescriptionDirectives::default();
    let mut current_file: Option<String> = None;

    for line in description.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix(FILE_PREFIX) {
            let path = rest.trim();
            current_file = (!path.is_empty()).then(|| path.to_string());
        } else if let Some(rest) = line.strip_prefix(DEPENDENCIES_PREFIX) {
            // Dependencies before the first `$file:` have no owner.
            let Some(file) = &current_file else {
                continue;
            };
            let names: Vec<String> = rest
                .split(',')
                .map(str::trim)
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect();
            parsed.dependencies.insert(file.clone(), names);
        } else if let Some(rest) = line.strip_prefix(CONTEXT_PREFIX) {
            parsed.context = rest.trim().to_string();
        }
    }

    parsed
}
