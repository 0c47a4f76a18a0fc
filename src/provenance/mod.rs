//! Provenance records for pipeline runs.
//!
//! Each stage that performs work produces an [`ActivityRecord`]. The
//! orchestrator collects them in a [`ProvenanceBuilder`], which is closed and
//! written to disk exactly once per run as a [`ProvenanceChain`].

use crate::error::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Version string recorded on every activity.
pub const SOFTWARE_VERSION: &str = env!("CARGO_PKG_VERSION");

/// One timed processing step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityRecord {
    pub activity_name: String,
    pub activity_description: String,
    pub input_data: Value,
    pub output_data: Value,
    /// Snapshot of the configuration used.
    pub parameters: Value,
    pub software_version: String,
    pub start_time_unix_ms: i64,
    pub processing_time_ms: u64,
}

impl ActivityRecord {
    /// Start timing a new activity.
    pub fn start(
        name: impl Into<String>,
        description: impl Into<String>,
        input_data: Value,
        parameters: Value,
    ) -> PendingActivity {
        PendingActivity {
            activity_name: name.into(),
            activity_description: description.into(),
            input_data,
            parameters,
            start_time_unix_ms: now_unix_ms(),
            timer: Instant::now(),
        }
    }
}

/// An activity that has started but not yet completed.
#[derive(Debug)]
pub struct PendingActivity {
    activity_name: String,
    activity_description: String,
    input_data: Value,
    parameters: Value,
    start_time_unix_ms: i64,
    timer: Instant,
}

impl PendingActivity {
    /// Stop the timer and produce the finished record.
    pub fn finish(self, output_data: Value) -> ActivityRecord {
        ActivityRecord {
            activity_name: self.activity_name,
            activity_description: self.activity_description,
            input_data: self.input_data,
            output_data,
            parameters: self.parameters,
            software_version: SOFTWARE_VERSION.to_string(),
            start_time_unix_ms: self.start_time_unix_ms,
            processing_time_ms: elapsed_ms(self.timer),
        }
    }
}

/// The persisted provenance document of one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceChain {
    pub activity_name: String,
    pub activity_description: String,
    pub input_data: Value,
    pub output_data: Value,
    pub parameters: Value,
    /// Component name to version.
    pub software_version: BTreeMap<String, String>,
    pub start_time_unix_ms: i64,
    pub processing_time_ms: u64,
    /// Child activities in execution order.
    pub steps: Vec<ActivityRecord>,
}

impl ProvenanceChain {
    /// Sum of the child activities' processing times.
    pub fn steps_processing_time_ms(&self) -> u64 {
        self.steps.iter().map(|s| s.processing_time_ms).sum()
    }

    /// Read a persisted chain back from disk.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// Open, append-only accumulator for a run's provenance.
///
/// Consumed by [`ProvenanceBuilder::close_and_persist`], so a chain can only be
/// finalized once.
#[derive(Debug)]
pub struct ProvenanceBuilder {
    activity_name: String,
    activity_description: String,
    input_data: Value,
    parameters: Value,
    software_version: BTreeMap<String, String>,
    start_time_unix_ms: i64,
    timer: Instant,
    steps: Vec<ActivityRecord>,
}

impl ProvenanceBuilder {
    /// Start the top-level record's timer.
    pub fn open(
        name: impl Into<String>,
        description: impl Into<String>,
        input_data: Value,
        parameters: Value,
        software_version: BTreeMap<String, String>,
    ) -> Self {
        Self {
            activity_name: name.into(),
            activity_description: description.into(),
            input_data,
            parameters,
            software_version,
            start_time_unix_ms: now_unix_ms(),
            timer: Instant::now(),
            steps: Vec::new(),
        }
    }

    /// Append a completed activity.
    pub fn append(&mut self, record: ActivityRecord) {
        debug!(activity = %record.activity_name, "Appending provenance step");
        self.steps.push(record);
    }

    /// Steps collected so far.
    pub fn steps(&self) -> &[ActivityRecord] {
        &self.steps
    }

    /// Stop the top-level timer, write the chain to `destination` and return it.
    pub fn close_and_persist(self, output_data: Value, destination: &Path) -> Result<ProvenanceChain> {
        let chain = ProvenanceChain {
            activity_name: self.activity_name,
            activity_description: self.activity_description,
            input_data: self.input_data,
            output_data,
            parameters: self.parameters,
            software_version: self.software_version,
            start_time_unix_ms: self.start_time_unix_ms,
            processing_time_ms: elapsed_ms(self.timer),
            steps: self.steps,
        };

        if let Some(parent) = destination.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(destination, serde_json::to_string_pretty(&chain)?)?;
        info!(
            "Persisted provenance ({} steps, {} ms) to {}",
            chain.steps.len(),
            chain.processing_time_ms,
            destination.display()
        );

        Ok(chain)
    }
}

/// Versions of the components that took part in a run.
pub fn software_versions(worker_id: &str) -> BTreeMap<String, String> {
    BTreeMap::from([(worker_id.to_string(), SOFTWARE_VERSION.to_string())])
}

fn now_unix_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

fn elapsed_ms(timer: Instant) -> u64 {
    u64::try_from(timer.elapsed().as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(name: &str) -> ActivityRecord {
        ActivityRecord::start(name, "test step", json!({"in": 1}), json!({}))
            .finish(json!({"out": 1}))
    }

    #[test]
    fn test_pending_activity_finish() {
        let pending = ActivityRecord::start("download", "fetch", json!({"input_uri": "s3://a/b"}), json!({}));
        std::thread::sleep(std::time::Duration::from_millis(5));
        let record = pending.finish(json!({"file_path": "/tmp/b"}));

        assert_eq!(record.activity_name, "download");
        assert_eq!(record.software_version, SOFTWARE_VERSION);
        assert!(record.processing_time_ms >= 5);
        assert!(record.start_time_unix_ms > 0);
        assert_eq!(record.output_data["file_path"], "/tmp/b");
    }

    #[test]
    fn test_chain_keeps_append_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provenance").join("asset.json");

        let mut builder = ProvenanceBuilder::open(
            "worker",
            "test run",
            json!({"input_file_path": "x"}),
            json!({}),
            software_versions("worker"),
        );
        builder.append(record("download"));
        builder.append(record("video2audio"));
        assert_eq!(builder.steps().len(), 2);

        let chain = builder.close_and_persist(json!({"output_path": "y"}), &path).unwrap();
        let names: Vec<_> = chain.steps.iter().map(|s| s.activity_name.as_str()).collect();
        assert_eq!(names, vec!["download", "video2audio"]);
        assert!(chain.processing_time_ms >= chain.steps_processing_time_ms());
    }

    #[test]
    fn test_persisted_chain_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("asset.json");

        let mut builder =
            ProvenanceBuilder::open("worker", "run", json!({}), json!({"mono": true}), software_versions("worker"));
        builder.append(record("video2audio"));
        let chain = builder.close_and_persist(json!({}), &path).unwrap();

        let loaded = ProvenanceChain::load(&path).unwrap();
        assert_eq!(loaded, chain);
        assert_eq!(loaded.software_version["worker"], SOFTWARE_VERSION);
    }
}
