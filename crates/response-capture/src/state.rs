use tokio::time::{Duration, Instant};

/// Lifecycle of one reply capture.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapturePhase {
    AwaitingElement,
    Generating,
    Settled,
    TimedOut,
}

/// What a single poll concluded.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    Changed,
    /// Unchanged; carries the consecutive stable count.
    Stable(u32),
    /// A loading indicator was visible, so the tick did not count.
    Loading,
    Settled,
}

/// Shared settle policy: `threshold` consecutive identical snapshots with no
/// visible loading indicator.
#[derive(Clone, Debug)]
pub struct SettleDetector {
    threshold: u32,
    last: String,
    stable: u32,
}

impl SettleDetector {
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            last: String::new(),
            stable: 0,
        }
    }

    pub fn observe(&mut self, snapshot: &str, loading: bool) -> TickOutcome {
        if snapshot != self.last {
            self.last.clear();
            self.last.push_str(snapshot);
            self.stable = 0;
            return TickOutcome::Changed;
        }
        if loading {
            self.stable = 0;
            return TickOutcome::Loading;
        }
        self.stable += 1;
        if self.stable >= self.threshold {
            TickOutcome::Settled
        } else {
            TickOutcome::Stable(self.stable)
        }
    }

    pub fn last_snapshot(&self) -> &str {
        &self.last
    }

    pub fn stable_ticks(&self) -> u32 {
        self.stable
    }
}

/// Per-request capture state. Deadlines are fixed when their phase starts
/// and never pushed back by page activity.
#[derive(Clone, Debug)]
pub struct CaptureState {
    phase: CapturePhase,
    detector: SettleDetector,
    started_at: Instant,
    discovery_deadline: Instant,
    generating_since: Option<Instant>,
    generation_deadline: Option<Instant>,
    max_generation: Option<Duration>,
    ticks: u32,
}

impl CaptureState {
    pub fn new(
        stable_ticks: u32,
        discovery_timeout: Duration,
        max_generation: Option<Duration>,
    ) -> Self {
        let started_at = Instant::now();
        Self {
            phase: CapturePhase::AwaitingElement,
            detector: SettleDetector::new(stable_ticks),
            started_at,
            discovery_deadline: started_at + discovery_timeout,
            generating_since: None,
            generation_deadline: None,
            max_generation,
            ticks: 0,
        }
    }

    pub fn phase(&self) -> CapturePhase {
        self.phase
    }

    pub fn discovery_remaining(&self) -> Duration {
        self.discovery_deadline
            .saturating_duration_since(Instant::now())
    }

    pub fn enter_generating(&mut self) {
        let now = Instant::now();
        self.phase = CapturePhase::Generating;
        self.generating_since = Some(now);
        self.generation_deadline = self.max_generation.map(|cap| now + cap);
    }

    pub fn observe(&mut self, snapshot: &str, loading: bool) -> TickOutcome {
        self.ticks += 1;
        let outcome = self.detector.observe(snapshot, loading);
        if outcome == TickOutcome::Settled {
            self.phase = CapturePhase::Settled;
        }
        outcome
    }

    /// True once the generation cap has passed; moves to `TimedOut`.
    pub fn generation_expired(&mut self) -> bool {
        match self.generation_deadline {
            Some(deadline) if Instant::now() >= deadline => {
                self.phase = CapturePhase::TimedOut;
                true
            }
            _ => false,
        }
    }

    pub fn mark_timed_out(&mut self) {
        self.phase = CapturePhase::TimedOut;
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    pub fn last_snapshot(&self) -> &str {
        self.detector.last_snapshot()
    }

    pub fn elapsed(&self) -> Duration {
        self.started_at.elapsed()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed().as_millis() as u64
    }

    pub fn generating_ms(&self) -> u64 {
        self.generating_since
            .map(|since| since.elapsed().as_millis() as u64)
            .unwrap_or(0)
    }
}
