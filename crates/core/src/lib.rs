pub mod directives;
pub mod domain;
pub mod error;
pub mod settings;

pub use directives::{parse_description, DependencyDirectives, DescriptionDirectives};
pub use domain::*;
pub use error::{CoreError, Result};
pub use settings::{GenerationOptions, RepoSettings, SETTINGS_FILE};
