//! Per-function timing state.

use std::collections::HashMap;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// How a function's calls reach its timing record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Mechanism {
    /// Calls go through a wrapper returned by [`Tracer::wrap`](crate::Tracer::wrap)
    Wrapped,
    /// Calls are observed by the process-wide interception hook
    Watched,
}

/// Mutable timing state for one function.
///
/// `begin` and `end` come in pairs around every timed invocation. Each thread
/// has its own start stack, whose depth equals the number of timed
/// invocations that thread has in flight. That depth is how recursive calls
/// are told apart from outermost ones.
#[derive(Debug, Clone)]
pub(crate) struct TimingRecord {
    enabled: bool,
    summ_recursive: bool,
    mechanism: Mechanism,
    start_times: HashMap<ThreadId, Vec<Instant>>,
    runs: Vec<Duration>,
}

impl TimingRecord {
    /// Create an enabled record for the given mechanism.
    pub(crate) fn new(mechanism: Mechanism) -> Self {
        Self {
            enabled: true,
            summ_recursive: false,
            mechanism,
            start_times: HashMap::new(),
            runs: Vec::new(),
        }
    }

    /// Start timing an invocation.
    #[inline]
    pub(crate) fn begin(&mut self) {
        self.begin_at(Instant::now());
    }

    /// Finish timing the most recent invocation.
    ///
    /// Returns the duration that was appended to the runs, if any. With an
    /// empty start stack this does nothing: a reset may have happened while
    /// the call was in flight.
    #[inline]
    pub(crate) fn end(&mut self) -> Option<Duration> {
        self.end_at(Instant::now())
    }

    /// Drop the current thread's most recent start time without recording.
    ///
    /// Returns whether a start time was pending.
    pub(crate) fn discard(&mut self) -> bool {
        self.pop_start().is_some()
    }

    pub(crate) fn begin_at(&mut self, now: Instant) {
        self.start_times
            .entry(thread::current().id())
            .or_default()
            .push(now);
    }

    pub(crate) fn end_at(&mut self, now: Instant) -> Option<Duration> {
        let (start, outermost) = self.pop_start()?;

        // Inner frames of a recursive chain only count when summing.
        if self.summ_recursive || outermost {
            let elapsed = now.saturating_duration_since(start);
            self.runs.push(elapsed);
            Some(elapsed)
        } else {
            None
        }
    }

    /// Pop the current thread's top start time, noting whether its stack
    /// is now empty.
    fn pop_start(&mut self) -> Option<(Instant, bool)> {
        let id = thread::current().id();
        let stack = self.start_times.get_mut(&id)?;
        let start = stack.pop()?;
        let outermost = stack.is_empty();
        if outermost {
            self.start_times.remove(&id);
        }
        Some((start, outermost))
    }

    /// Whether timing is currently active.
    #[inline]
    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable timing with the given recursion policy.
    pub(crate) fn enable(&mut self, summ_recursive: bool) {
        self.enabled = true;
        self.summ_recursive = summ_recursive;
    }

    /// Stop recording future invocations.
    ///
    /// Pending start times are kept; an invocation already in flight may
    /// still complete its pair.
    pub(crate) fn disable(&mut self) {
        self.enabled = false;
    }

    /// Whether every recursive frame is recorded, not just the outermost.
    #[inline]
    pub(crate) fn summ_recursive(&self) -> bool {
        self.summ_recursive
    }

    #[inline]
    pub(crate) fn mechanism(&self) -> Mechanism {
        self.mechanism
    }

    /// Number of timed invocations the current thread has in flight.
    pub(crate) fn depth(&self) -> usize {
        self.start_times
            .get(&thread::current().id())
            .map_or(0, Vec::len)
    }


    /// Completed, recorded durations in completion order.
    #[inline]
    pub(crate) fn runs(&self) -> &[Duration] {
        &self.runs
    }

    /// Sum of all recorded durations.
    pub(crate) fn total(&self) -> Duration {
        self.runs.iter().sum()
    }

    /// Drop recorded runs and every thread's pending start times.
    pub(crate) fn reset(&mut self) {
        self.runs.clear();
        self.start_times.clear();
    }
}
