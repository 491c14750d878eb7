pub mod bytes;
pub mod config;
pub mod coverage;
pub mod generator;
pub mod guidance;
pub mod individual;
pub mod modify;
pub mod output;
pub mod runner;
pub mod select;
pub mod source;
pub mod tracker;

pub use bytes::ByteSequence;
pub use config::{CampaignSettings, OutputConfig, ParafuzzConfig};
pub use coverage::{CoverageCollector, CoverageMatrix, TimeoutSignal};
pub use generator::{ExprGenerator, GenerateError, Generator};
pub use guidance::{CampaignManager, GuidanceError, MAX_INITIAL_SIZE, ParametricGuidance};
pub use individual::Individual;
pub use modify::{HavocModifier, Modifier};
pub use output::{CampaignOutput, FileManager, OutputError, StatsRecord};
pub use runner::{Failure, FuzzTarget, RunnerError, TargetError, TestReport, TestRunner};
pub use select::{RandomSelector, SelectError, Selector};
pub use source::{BiasedRandomSource, SourceExhausted};
pub use tracker::{InitHook, PopulationTracker};
