use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::{CoreError, Result};

/// Per-repository settings file, read at the merge commit.
pub const SETTINGS_FILE: &str = "testsmith-config.yml";

/// Per-repository settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepoSettings {
    #[serde(default)]
    pub configuration: TestingSettings,
    #[serde(default)]
    pub environment: EnvironmentSettings,
    #[serde(default)]
    pub caching: CachingSettings,
    #[serde(default)]
    pub extras: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct TestingSettings {
    pub test_directory: String,
    pub comments: bool,
    pub testing_branch: String,
    pub testing_framework: String,
    pub water_mark: bool,
}

impl Default for TestingSettings {
    fn default() -> Self {
        Self {
            test_directory: "/tests".to_string(),
            comments: true,
            testing_branch: "testing".to_string(),
            testing_framework: "pytest".to_string(),
            water_mark: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct EnvironmentSettings {
    pub python_version: String,
}

impl Default for EnvironmentSettings {
    fn default() -> Self {
        Self {
            python_version: "3.12".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CachingSettings {
    pub enabled: bool,
}

impl Default for RepoSettings {
    fn default() -> Self {
        Self {
            configuration: TestingSettings::default(),
            environment: EnvironmentSettings::default(),
            caching: CachingSettings::default(),
            extras: HashMap::new(),
        }
    }
}

impl RepoSettings {
    pub fn from_yaml(content: &str) -> Result<Self> {
        let settings: Self = serde_yaml::from_str(content)
            .map_err(|e| CoreError::InvalidSettings(e.to_string()))?;

        if settings.configuration.testing_branch.trim().is_empty() {
            return Err(CoreError::InvalidSettings(
                "testing-branch must not be empty".to_string(),
            ));
        }

        Ok(settings)
    }

    pub fn testing_branch(&self) -> &str {
        &self.configuration.testing_branch
    }

    pub fn caching_enabled(&self) -> bool {
        self.caching.enabled
    }

    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            test_directory: self.configuration.test_directory.clone(),
            comments: self.configuration.comments,
            testing_framework: self.configuration.testing_framework.clone(),
            water_mark: self.configuration.water_mark,
            extras: self.extras.clone(),
        }
    }
}

/// Knobs forwarded to the generation engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct GenerationOptions {
    pub test_directory: String,
    pub comments: bool,
    pub testing_framework: String,
    pub water_mark: bool,
    #[serde(default)]
    pub extras: HashMap<String, String>,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        RepoSettings::default().generation_options()
    }
}
