use crate::coverage::CoverageMatrix;
use crate::guidance::CampaignManager;
use crate::individual::Individual;
use crate::runner::{Failure, TestReport};
use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

/// Errors raised while persisting campaign artifacts.
#[derive(Error, Debug)]
pub enum OutputError {
    /// An I/O error occurred while creating directories or writing artifact
    /// files. Contains a string describing the underlying error.
    #[error("Output I/O error: {0}")]
    Io(String),

    /// Serializing a statistics record to JSON failed.
    #[error("Output serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for OutputError {
    fn from(err: std::io::Error) -> Self {
        OutputError::Io(err.to_string())
    }
}
impl From<serde_json::Error> for OutputError {
    fn from(err: serde_json::Error) -> Self {
        OutputError::Serialization(format!("JSON operation error: {}", err))
    }
}

/// On-disk layout of one campaign: a corpus directory for archived
/// recordings, a failures directory for crash reproducers, a rendered
/// directory for human-readable renderings, and an append-only statistics
/// file.
///
/// Creating a `CampaignOutput` claims the directory for a fresh campaign:
/// corpus, failures and rendered are emptied and the statistics file is
/// deleted, so stale artifacts from an earlier run never mix with new ones.
pub struct CampaignOutput {
    corpus_dir: PathBuf,
    failures_dir: PathBuf,
    rendered_dir: PathBuf,
    statistics_path: PathBuf,
    corpus_count: u64,
    failure_count: u64,
}

impl CampaignOutput {
    const STATISTICS_FILENAME: &'static str = "statistics.jsonl";

    pub fn new(root: &Path) -> Result<Self, OutputError> {
        let corpus_dir = root.join("corpus");
        let failures_dir = root.join("failures");
        let rendered_dir = root.join("rendered");
        let statistics_path = root.join(Self::STATISTICS_FILENAME);
        ensure_empty_dir(&corpus_dir)?;
        ensure_empty_dir(&failures_dir)?;
        ensure_empty_dir(&rendered_dir)?;
        if statistics_path.exists() {
            fs::remove_file(&statistics_path).map_err(|e| {
                OutputError::Io(format!(
                    "Failed to remove stale statistics file {:?}: {}",
                    statistics_path, e
                ))
            })?;
        }
        Ok(Self {
            corpus_dir,
            failures_dir,
            rendered_dir,
            statistics_path,
            corpus_count: 0,
            failure_count: 0,
        })
    }

    /// Writes raw recording bytes into the corpus directory, returning the
    /// sequential id used in the filename.
    pub fn save_to_corpus(&mut self, bytes: &[u8]) -> Result<u64, OutputError> {
        let id = self.corpus_count;
        write_artifact(&self.corpus_dir, id, bytes)?;
        self.corpus_count += 1;
        Ok(id)
    }

    /// Writes a failing recording into the failures directory.
    pub fn save_to_failures(&mut self, bytes: &[u8]) -> Result<u64, OutputError> {
        let id = self.failure_count;
        write_artifact(&self.failures_dir, id, bytes)?;
        self.failure_count += 1;
        Ok(id)
    }

    /// Writes the rendering of a corpus entry next to its raw bytes, keyed by
    /// the same id.
    pub fn save_rendered(&mut self, id: u64, rendered: &str) -> Result<(), OutputError> {
        let path = self.rendered_dir.join(format!("id_{:06}.txt", id));
        fs::write(&path, rendered).map_err(|e| {
            OutputError::Io(format!("Failed to write rendering {:?}: {}", path, e))
        })?;
        Ok(())
    }

    /// Appends one line to the statistics file.
    pub fn write_statistics(&mut self, line: &str) -> Result<(), OutputError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.statistics_path)
            .map_err(|e| {
                OutputError::Io(format!(
                    "Failed to open statistics file {:?}: {}",
                    self.statistics_path, e
                ))
            })?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    pub fn corpus_size(&self) -> u64 {
        self.corpus_count
    }

    pub fn failures_size(&self) -> u64 {
        self.failure_count
    }
}

fn ensure_empty_dir(dir: &Path) -> Result<(), OutputError> {
    if dir.exists() {
        fs::remove_dir_all(dir).map_err(|e| {
            OutputError::Io(format!("Failed to clear directory {:?}: {}", dir, e))
        })?;
    }
    fs::create_dir_all(dir).map_err(|e| {
        OutputError::Io(format!("Failed to create directory {:?}: {}", dir, e))
    })?;
    Ok(())
}

fn write_artifact(dir: &Path, id: u64, bytes: &[u8]) -> Result<(), OutputError> {
    let path = dir.join(format!("id_{:06}.dat", id));
    let mut file = File::create(&path)
        .map_err(|e| OutputError::Io(format!("Failed to create artifact {:?}: {}", path, e)))?;
    file.write_all(bytes)
        .map_err(|e| OutputError::Io(format!("Failed to write artifact {:?}: {}", path, e)))?;
    Ok(())
}

/// One statistics line, serialized as JSON.
#[derive(Serialize, Debug)]
pub struct StatsRecord {
    pub executions: u64,
    pub corpus: u64,
    pub failures: u64,
    pub execs_per_sec: f64,
    pub elapsed_ms: u64,
}

/// The standard campaign manager: bounds the campaign by iteration count and
/// wall clock, persists archived individuals and deduplicated failures, and
/// appends periodic statistics.
///
/// Failures are deduplicated by the digest of their failure message, so a
/// crash site that fires on every mutant produces one reproducer instead of
/// thousands.
pub struct FileManager {
    output: CampaignOutput,
    max_iterations: u64,
    deadline: Option<Instant>,
    stats_interval: u64,
    started: Instant,
    executions: u64,
    seen_failures: HashSet<[u8; 16]>,
}

impl FileManager {
    pub fn new(
        root: &Path,
        max_iterations: u64,
        time_budget: Option<Duration>,
        stats_interval: u64,
    ) -> Result<Self, OutputError> {
        let started = Instant::now();
        Ok(Self {
            output: CampaignOutput::new(root)?,
            max_iterations,
            deadline: time_budget.map(|budget| started + budget),
            stats_interval: stats_interval.max(1),
            started,
            executions: 0,
            seen_failures: HashSet::new(),
        })
    }

    pub fn executions(&self) -> u64 {
        self.executions
    }

    pub fn output(&self) -> &CampaignOutput {
        &self.output
    }

    fn record_statistics(&mut self) -> Result<(), OutputError> {
        let elapsed = self.started.elapsed();
        let record = StatsRecord {
            executions: self.executions,
            corpus: self.output.corpus_size(),
            failures: self.output.failures_size(),
            execs_per_sec: self.executions as f64 / elapsed.as_secs_f64().max(f64::EPSILON),
            elapsed_ms: elapsed.as_millis() as u64,
        };
        let line = serde_json::to_string(&record)?;
        self.output.write_statistics(&line)
    }
}

impl CampaignManager for FileManager {
    fn unexpired(&mut self) -> bool {
        if self.executions >= self.max_iterations {
            return false;
        }
        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                return false;
            }
        }
        true
    }

    fn finished_execution(
        &mut self,
        report: &TestReport,
        _coverage: &CoverageMatrix,
        saved: Option<&Arc<Individual>>,
    ) -> Result<()> {
        self.executions += 1;

        if let Some(individual) = saved {
            let id = self.output.save_to_corpus(individual.input().as_slice())?;
            if let Some(rendered) = individual.rendered() {
                self.output.save_rendered(id, rendered)?;
            }
        }

        if let Some(failure) = &report.failure {
            let digest = md5::compute(failure.to_string().as_bytes()).0;
            if self.seen_failures.insert(digest) {
                log::warn!("new failure: {}", failure);
                self.output
                    .save_to_failures(report.recording.as_slice())?;
                if matches!(failure, Failure::ResourceExhausted(_)) {
                    log::warn!("failure is a resource exhaustion, reproducer saved but not archived");
                }
            }
        }

        if self.executions % self.stats_interval == 0 {
            self.record_statistics()?;
        }
        Ok(())
    }
}
