use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// How many hit events pass between elapsed-time checks. Timeouts are only
/// detected at this granularity; there is no timer interrupt.
const TIMEOUT_CHECK_INTERVAL: u64 = 1024;

/// Panic payload raised from inside an instrumented execution when the trial
/// exceeds its time budget. The test runner catches it and classifies the
/// trial as a timeout failure.
#[derive(Debug, Clone, Copy)]
pub struct TimeoutSignal {
    pub elapsed: Duration,
}

/// Per-execution snapshot of which probes fired, grouped by component.
///
/// The shape of the matrix may grow across a campaign (new components or
/// probes seen for the first time) but existing indices are never renumbered
/// or removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoverageMatrix {
    components: Vec<Vec<bool>>,
}

impl CoverageMatrix {
    pub fn new(components: Vec<Vec<bool>>) -> Self {
        Self { components }
    }

    pub fn components(&self) -> &[Vec<bool>] {
        &self.components
    }

    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Total number of probes that fired.
    pub fn hit_count(&self) -> usize {
        self.components
            .iter()
            .map(|probes| probes.iter().filter(|hit| **hit).count())
            .sum()
    }
}

struct CollectorState {
    hits: Vec<Vec<bool>>,
    started: Option<Instant>,
    budget: Option<Duration>,
}

/// Records probe hits for exactly one in-flight execution.
///
/// The collector is shared between the test runner (which drives the
/// `start`/`done` lifecycle) and the running target (which reports hits), so
/// it uses interior mutability. Only one execution is in flight at a time by
/// design; the lock exists for sharing, not for cross-trial concurrency.
pub struct CoverageCollector {
    state: Mutex<CollectorState>,
    events: AtomicU64,
}

impl CoverageCollector {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(CollectorState {
                hits: Vec::new(),
                started: None,
                budget: None,
            }),
            events: AtomicU64::new(0),
        }
    }

    // A panicking target can poison the lock mid-hit; the partial hit state
    // is still well formed, so recover it rather than abort the campaign.
    fn lock(&self) -> std::sync::MutexGuard<'_, CollectorState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Registers a component with a fixed probe count and returns its index.
    /// Components are append-only; indices stay stable for the campaign.
    pub fn register_component(&self, probe_count: usize) -> usize {
        let mut state = self.lock();
        state.hits.push(vec![false; probe_count]);
        state.hits.len() - 1
    }

    /// Begins a new observation window. Clears all hit state from the
    /// previous trial so the next snapshot reflects one execution only.
    pub fn start(&self, budget: Option<Duration>) {
        let mut state = self.lock();
        for probes in &mut state.hits {
            probes.fill(false);
        }
        state.started = Some(Instant::now());
        state.budget = budget;
        self.events.store(0, Ordering::Relaxed);
    }

    /// Marks a probe as hit. Rows grow on demand when a probe index beyond
    /// the registered count is reported; they never shrink.
    ///
    /// Raises [`TimeoutSignal`] (as a panic, unwinding out of the target)
    /// when the trial budget is exceeded, checked once every
    /// `TIMEOUT_CHECK_INTERVAL` events.
    pub fn hit(&self, component: usize, probe: usize) {
        let deadline_state = {
            let mut state = self.lock();
            while state.hits.len() <= component {
                state.hits.push(Vec::new());
            }
            let row = &mut state.hits[component];
            if row.len() <= probe {
                row.resize(probe + 1, false);
            }
            row[probe] = true;
            (state.started, state.budget)
        };

        let events = self.events.fetch_add(1, Ordering::Relaxed) + 1;
        if events % TIMEOUT_CHECK_INTERVAL == 0 {
            if let (Some(started), Some(budget)) = deadline_state {
                let elapsed = started.elapsed();
                if elapsed > budget {
                    std::panic::panic_any(TimeoutSignal { elapsed });
                }
            }
        }
    }

    /// Ends the observation window and returns the snapshot for the trial
    /// that just finished. Hit state is cleared; nothing carries over.
    pub fn done(&self) -> CoverageMatrix {
        let mut state = self.lock();
        let snapshot = state.hits.clone();
        for probes in &mut state.hits {
            probes.fill(false);
        }
        state.started = None;
        state.budget = None;
        CoverageMatrix::new(snapshot)
    }
}

impl Default for CoverageCollector {
    fn default() -> Self {
        Self::new()
    }
}
