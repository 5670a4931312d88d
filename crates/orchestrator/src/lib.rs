pub mod engine;
pub mod error;
mod flows;
mod orchestrator;
pub mod outcome;
pub mod pipeline;
pub mod publisher;
pub mod state_machine;

#[cfg(test)]
mod testing;

pub use engine::{GenerationEngine, GenerationRequest, HttpGenerationEngine, RetryRequest};
pub use error::{OrchestratorError, Result};
pub use orchestrator::{Orchestrator, OrchestratorConfig};
pub use outcome::{CacheOutcome, FlowOutcome};
pub use pipeline::ContentResolver;
pub use state_machine::{EventRouter, Route, DEFAULT_WORKFLOW_NAME};
