//! Workflow job log retrieval.

use serde::Deserialize;

/// Width of the `2024-01-01T00:00:00.0000000Z ` prefix on every log line.
pub const TIMESTAMP_PREFIX_LEN: usize = 29;

#[derive(Debug, Deserialize)]
pub(crate) struct JobList {
    #[serde(default)]
    pub jobs: Vec<Job>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Job {
    pub id: u64,
}

/// Splits a raw job log into lines without their timestamp prefix. Lines no
/// longer than the prefix carry no message and are dropped. The cut is by
/// byte, so a character split by it is replaced rather than losing the line.
pub fn strip_timestamps(raw: &str) -> Vec<String> {
    raw.lines()
        .filter(|line| line.len() > TIMESTAMP_PREFIX_LEN)
        .map(|line| {
            String::from_utf8_lossy(&line.as_bytes()[TIMESTAMP_PREFIX_LEN..]).into_owned()
        })
        .collect()
}
