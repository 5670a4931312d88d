//! Content resolution: hydrates changed files and their declared
//! dependencies from the source repository.
//!
//! Two stages joined by a bounded channel. Stage 1 fetches every changed file
//! concurrently; stage 2 takes files off the channel as they arrive and
//! fetches each file's dependencies concurrently before emitting it. A failed
//! fetch never aborts the run; the content becomes
//! [`FETCH_ERROR_SENTINEL`](testsmith_core::FETCH_ERROR_SENTINEL).

use std::collections::HashMap;
use std::sync::Arc;

use futures::future::join_all;
use github::{ChangedFile, SourceRepository};
use testsmith_core::{Dependency, DependencyDirectives, RepoRef, SourceFile};
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{OrchestratorError, Result};

const DEFAULT_CAPACITY: usize = 16;

pub struct ContentResolver {
    repository: Arc<dyn SourceRepository>,
    capacity: usize,
}

impl ContentResolver {
    pub fn new(repository: Arc<dyn SourceRepository>) -> Self {
        Self {
            repository,
            capacity: DEFAULT_CAPACITY,
        }
    }

    /// Bound of the hand-off queue between the two stages.
    pub fn with_capacity(mut self, capacity: usize) -> Self {
        self.capacity = capacity.max(1);
        self
    }

    /// Returns exactly one [`SourceFile`] per entry of `files`, in no
    /// particular order.
    pub async fn resolve(
        &self,
        files: &[ChangedFile],
        directives: &DependencyDirectives,
        at: &RepoRef,
        cancel: &CancellationToken,
    ) -> Result<Vec<SourceFile>> {
        debug!(files = files.len(), "Resolving content at {}", at.git_ref);

        let (tx, rx) = mpsc::channel(self.capacity);
        let mut fetches = JoinSet::new();

        for file in files {
            let repository = Arc::clone(&self.repository);
            let at = at.clone();
            let path = file.filename.clone();
            let tx = tx.clone();

            fetches.spawn(async move {
                let hydrated = match repository.fetch_file(&at, &path).await {
                    Ok(content) => SourceFile::new(path, content),
                    Err(e) => {
                        warn!(path = %path, error = %e, "Failed to fetch changed file");
                        SourceFile::unavailable(path)
                    }
                };
                // The receiver only goes away when the whole run is dropped.
                let _ = tx.send(hydrated).await;
            });
        }
        // The channel closes once the last fetch task drops its sender.
        drop(tx);

        let stage_one = async {
            while let Some(joined) = fetches.join_next().await {
                if let Err(e) = joined {
                    warn!(error = %e, "File fetch task failed");
                }
            }
        };
        let stage_two = self.hydrate_dependencies(rx, directives, at);

        // Dropping `fetches` on cancellation aborts every in-flight fetch.
        let mut resolved = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(OrchestratorError::Cancelled),
            (_, resolved) = async { tokio::join!(stage_one, stage_two) } => resolved,
        };

        fill_missing(files, &mut resolved);
        Ok(resolved)
    }

    async fn hydrate_dependencies(
        &self,
        mut rx: mpsc::Receiver<SourceFile>,
        directives: &DependencyDirectives,
        at: &RepoRef,
    ) -> Vec<SourceFile> {
        let mut resolved = Vec::new();

        while let Some(file) = rx.recv().await {
            let names = directives.for_file(&file.path);
            let dependencies = join_all(names.iter().map(|name| self.fetch_dependency(at, name))).await;
            resolved.push(file.with_dependencies(dependencies));
        }

        resolved
    }

    async fn fetch_dependency(&self, at: &RepoRef, name: &str) -> Dependency {
        match self.repository.fetch_file(at, name).await {
            Ok(content) => Dependency::new(name, content),
            Err(e) => {
                warn!(dependency = %name, error = %e, "Failed to fetch dependency");
                Dependency::unavailable(name)
            }
        }
    }
}

/// A fetch task that died without reporting still owes its caller a record.
fn fill_missing(files: &[ChangedFile], resolved: &mut Vec<SourceFile>) {
    let mut reported: HashMap<&str, usize> = HashMap::new();
    for file in resolved.iter() {
        *reported.entry(file.path.as_str()).or_default() += 1;
    }

    let mut missing = Vec::new();
    for file in files {
        match reported.get_mut(file.filename.as_str()) {
            Some(count) if *count > 0 => *count -= 1,
            _ => missing.push(SourceFile::unavailable(file.filename.clone())),
        }
    }

    resolved.extend(missing);
}
