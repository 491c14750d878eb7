use crate::bytes::ByteSequence;
use crate::coverage::{CoverageCollector, CoverageMatrix, TimeoutSignal};
use crate::generator::{GenerateError, Generator};
use crate::source::BiasedRandomSource;
use std::any::Any;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Failure classes a single trial can end with.
///
/// `Crash` and `Timeout` inputs may be archived when they also produce new
/// coverage; `ResourceExhausted` inputs are reported but categorically
/// excluded from the archive, so expensive-to-replay inputs never poison the
/// corpus.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    #[error("target failed: {0}")]
    Crash(String),
    #[error("trial exceeded its time budget")]
    Timeout,
    #[error("target exhausted a resource: {0}")]
    ResourceExhausted(String),
}

impl Failure {
    pub fn is_fatal(&self) -> bool {
        matches!(self, Failure::ResourceExhausted(_))
    }
}

/// Per-trial outcome reported by a target.
#[derive(Error, Debug)]
pub enum TargetError {
    #[error("{0}")]
    Failure(String),
    #[error("assumption violated: {0}")]
    AssumptionViolated(String),
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),
}

/// Infrastructure failures: the runner could not execute the target at all.
/// Unlike per-trial errors these propagate and terminate the campaign.
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("target setup failed: {0}")]
    Setup(String),
}

/// The target under test.
///
/// `run` receives the rendered structured value and the collector through
/// which instrumentation reports probe hits. It must present a synchronous,
/// single-result view: any internal concurrency completes (or times out)
/// before it returns.
pub trait FuzzTarget: Send {
    /// Clears any per-trial target state. Called before every invocation so
    /// no failure or skip state leaks between trials.
    fn reset(&mut self) -> Result<(), RunnerError> {
        Ok(())
    }

    fn run(&mut self, rendered: &str, coverage: &CoverageCollector) -> Result<(), TargetError>;
}

/// Everything one execution produced. Transient: consumed once by the
/// population tracker update and then discarded.
#[derive(Debug)]
pub struct TestReport {
    /// The target failure, if any.
    pub failure: Option<Failure>,
    /// Set when the trial was non-informative (entropy exhaustion or an
    /// explicit skip); such trials are counted but never archived and never
    /// reported as failing.
    pub skipped: Option<String>,
    /// The bytes actually consumed while generating the value.
    pub recording: ByteSequence,
    /// Rendering of the generated value; absent when generation ended early.
    pub rendered: Option<String>,
}

impl TestReport {
    pub fn succeeded(&self) -> bool {
        self.failure.is_none() && self.skipped.is_none()
    }
}

/// Executes one candidate byte sequence end to end: generation, target
/// execution, outcome classification and coverage snapshot.
pub struct TestRunner {
    generator: Box<dyn Generator>,
    target: Box<dyn FuzzTarget>,
    collector: Arc<CoverageCollector>,
    trial_budget: Option<Duration>,
}

impl TestRunner {
    pub fn new(
        generator: Box<dyn Generator>,
        target: Box<dyn FuzzTarget>,
        collector: Arc<CoverageCollector>,
        trial_budget: Option<Duration>,
    ) -> Self {
        Self {
            generator,
            target,
            collector,
            trial_budget,
        }
    }

    pub fn collector(&self) -> &Arc<CoverageCollector> {
        &self.collector
    }

    /// Runs one trial. All per-trial errors are folded into the report; only
    /// infrastructure failures escape as `RunnerError`.
    pub fn run(
        &mut self,
        candidate: ByteSequence,
    ) -> Result<(TestReport, CoverageMatrix), RunnerError> {
        self.target.reset()?;
        self.collector.start(self.trial_budget);

        let mut source = BiasedRandomSource::new(candidate);
        let rendered = match self.generator.generate(&mut source) {
            Ok(rendered) => rendered,
            Err(error) => {
                let recording = source.recording();
                let matrix = self.collector.done();
                let report = match error {
                    GenerateError::Exhausted(_) => TestReport {
                        failure: None,
                        skipped: Some("random source exhausted".to_string()),
                        recording,
                        rendered: None,
                    },
                    GenerateError::Skip(reason) | GenerateError::Invalid(reason) => TestReport {
                        failure: None,
                        skipped: Some(reason),
                        recording,
                        rendered: None,
                    },
                    GenerateError::ResourceExhausted(reason) => TestReport {
                        failure: Some(Failure::ResourceExhausted(reason)),
                        skipped: None,
                        recording,
                        rendered: None,
                    },
                };
                return Ok((report, matrix));
            }
        };
        let recording = source.recording();

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.target.run(&rendered, &self.collector)
        }));
        let (failure, skipped) = match outcome {
            Ok(Ok(())) => (None, None),
            Ok(Err(TargetError::Failure(message))) => (Some(Failure::Crash(message)), None),
            Ok(Err(TargetError::AssumptionViolated(reason))) => (None, Some(reason)),
            Ok(Err(TargetError::ResourceExhausted(message))) => {
                (Some(Failure::ResourceExhausted(message)), None)
            }
            Err(payload) => (Some(classify_panic(payload)), None),
        };

        let matrix = self.collector.done();
        let report = TestReport {
            failure,
            skipped,
            recording,
            rendered: Some(rendered),
        };
        Ok((report, matrix))
    }
}

fn classify_panic(payload: Box<dyn Any + Send>) -> Failure {
    if let Some(signal) = payload.downcast_ref::<TimeoutSignal>() {
        log::debug!("trial timed out after {:?}", signal.elapsed);
        return Failure::Timeout;
    }
    let message = if let Some(text) = payload.downcast_ref::<&str>() {
        (*text).to_string()
    } else if let Some(text) = payload.downcast_ref::<String>() {
        text.clone()
    } else {
        "unknown panic type".to_string()
    };
    Failure::Crash(message)
}
