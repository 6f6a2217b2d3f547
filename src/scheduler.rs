use crate::config::PollConfig;
use crate::error::ConfigError;
use crate::estimator::{Delta, RateSample, classify};
use crate::gate::{AccessGate, Open};
use crate::ring::RingBuffer;
use crate::snapshot::{CounterSnapshot, SnapshotSource};
use spdlog::{debug, info, warn};
use std::sync::atomic::Ordering::{AcqRel, Acquire, Relaxed, Release};
use std::sync::atomic::{AtomicBool, AtomicU64};
use std::sync::mpsc::{RecvTimeoutError, Sender, channel};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// What a single tick ended up doing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Tick {
    Sampled(RateSample),
    /// First snapshot, stored as the baseline.
    Baselined,
    /// Counter went backwards; the snapshot became the new baseline.
    Reset,
    /// Snapshot used only to re-baseline: the first one after a resume or an
    /// unlock, or one captured before the baseline (clock stepped back).
    Resynced,
    Failed,
    /// Completed under an older generation, or while paused or locked.
    Stale,
    SkippedPaused,
    SkippedLocked,
    SkippedInFlight,
}

/// Counters describing the scheduler's life so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub ticks: u64,
    pub samples: u64,
    pub skipped: u64,
    pub failures: u64,
    pub resets: u64,
    pub stale: u64,
}

#[derive(Default)]
struct Counters {
    ticks: AtomicU64,
    samples: AtomicU64,
    skipped: AtomicU64,
    failures: AtomicU64,
    resets: AtomicU64,
    stale: AtomicU64,
}

struct PollState {
    baseline: Option<CounterSnapshot>,
    samples: RingBuffer<RateSample>,
    resync: bool,
}

struct Shared<S> {
    source: S,
    gate: Arc<dyn AccessGate>,
    state: Mutex<PollState>,
    generation: AtomicU64,
    paused: AtomicBool,
    in_flight: AtomicBool,
    counters: Counters,
}

enum Dispatch {
    Inline,
    Spawn,
}

impl<S: SnapshotSource> Shared<S> {
    fn tick(self: &Arc<Self>, dispatch: Dispatch) -> Option<Tick> {
        self.counters.ticks.fetch_add(1, Relaxed);
        // Loaded before the pause check: a pause landing after this load
        // always bumps past it.
        let generation = self.generation.load(Acquire);

        let skipped = if !self.gate.is_unlocked() {
            self.invalidate_for_lock();
            Some(Tick::SkippedLocked)
        } else if self.paused.load(Acquire) {
            Some(Tick::SkippedPaused)
        } else if self.in_flight.swap(true, AcqRel) {
            debug!("previous fetch still in flight, skipping tick");
            Some(Tick::SkippedInFlight)
        } else {
            None
        };
        if let Some(skip) = skipped {
            self.counters.skipped.fetch_add(1, Relaxed);
            return Some(skip);
        }

        match dispatch {
            Dispatch::Inline => Some(self.fetch_and_apply(generation)),
            Dispatch::Spawn => {
                let shared = self.clone();
                thread::spawn(move || {
                    shared.fetch_and_apply(generation);
                });
                None
            }
        }
    }

    fn fetch_and_apply(&self, generation: u64) -> Tick {
        let result = self.source.fetch();
        let tick = match result {
            Ok(snapshot) => self.apply(generation, snapshot),
            Err(err) => {
                self.counters.failures.fetch_add(1, Relaxed);
                debug!("snapshot fetch failed: {}", err);
                Tick::Failed
            }
        };
        self.in_flight.store(false, Release);
        tick
    }

    fn apply(&self, generation: u64, snapshot: CounterSnapshot) -> Tick {
        let mut state = self.state.lock().unwrap();

        let locked = !self.gate.is_unlocked();
        if locked {
            state.resync = state.baseline.is_some();
        }
        if self.generation.load(Acquire) != generation || self.paused.load(Acquire) || locked {
            self.counters.stale.fetch_add(1, Relaxed);
            debug!(
                "discarding snapshot captured at {} from generation {}",
                snapshot.captured_at, generation
            );
            return Tick::Stale;
        }

        let stepped_back = state
            .baseline
            .as_ref()
            .is_some_and(|b| snapshot.captured_at < b.captured_at);
        if stepped_back {
            warn!(
                "snapshot captured at {} precedes the baseline, re-baselining",
                snapshot.captured_at
            );
        }
        if state.resync || stepped_back {
            state.resync = false;
            state.baseline = Some(snapshot);
            return Tick::Resynced;
        }

        let tick = match classify(state.baseline.as_ref(), &snapshot) {
            Delta::Baseline => Tick::Baselined,
            Delta::Reset {
                prev_total,
                curr_total,
            } => {
                self.counters.resets.fetch_add(1, Relaxed);
                warn!(
                    "counter reset detected ({} -> {}), re-baselining",
                    prev_total, curr_total
                );
                Tick::Reset
            }
            Delta::Sample(sample) => {
                state.samples.push(sample);
                self.counters.samples.fetch_add(1, Relaxed);
                Tick::Sampled(sample)
            }
        };
        state.baseline = Some(snapshot);
        tick
    }

    fn bump_generation(&self) {
        self.generation.fetch_add(1, AcqRel);
    }

    /// A locked gate behaves like a pause: anything in flight is dropped and
    /// the first snapshot after unlocking re-baselines.
    fn invalidate_for_lock(&self) {
        let mut state = self.state.lock().unwrap();
        state.resync = state.baseline.is_some();
        self.bump_generation();
    }
}

struct Timer {
    stop: Sender<()>,
    handle: thread::JoinHandle<()>,
}

/// Drives fetch, rate estimation and the sparkline ring buffer on a single
/// cancellable timer.
///
/// The scheduler exclusively owns the baseline snapshot. Every pause, resume
/// and reconfiguration bumps a generation token; a fetch that completes under
/// an older generation is dropped instead of producing a sample.
pub struct Scheduler<S: SnapshotSource> {
    shared: Arc<Shared<S>>,
    config: PollConfig,
    timer: Option<Timer>,
}

impl<S: SnapshotSource> Scheduler<S> {
    pub fn new(source: S, config: PollConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let shared = Shared {
            source,
            gate: Arc::new(Open),
            state: Mutex::new(PollState {
                baseline: None,
                samples: RingBuffer::new(config.ring_capacity()),
                resync: false,
            }),
            generation: AtomicU64::new(0),
            paused: AtomicBool::new(false),
            in_flight: AtomicBool::new(false),
            counters: Counters::default(),
        };
        Ok(Self {
            shared: Arc::new(shared),
            config,
            timer: None,
        })
    }

    /// Replaces the access gate. Must be called before [`Scheduler::start`].
    pub fn with_gate(mut self, gate: Arc<dyn AccessGate>) -> Self {
        match Arc::get_mut(&mut self.shared) {
            Some(shared) => shared.gate = gate,
            None => warn!("gate can only be replaced before the scheduler starts"),
        }
        self
    }

    /// Starts polling. Any timer already running is cancelled first, so calling
    /// this repeatedly never stacks timers.
    pub fn start(&mut self) {
        self.stop_timer();

        let (stop_tx, stop_rx) = channel::<()>();
        let shared = self.shared.clone();
        let interval = Duration::from_millis(self.config.interval_ms);
        let handle = thread::spawn(move || {
            loop {
                shared.tick(Dispatch::Spawn);
                match stop_rx.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => continue,
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        });
        self.timer = Some(Timer {
            stop: stop_tx,
            handle,
        });
        info!("poller started, interval {}ms", self.config.interval_ms);
    }

    /// Cancels the timer. The baseline and samples are kept.
    pub fn stop(&mut self) {
        if self.stop_timer() {
            info!("poller stopped");
        }
    }

    fn stop_timer(&mut self) -> bool {
        let Some(timer) = self.timer.take() else {
            return false;
        };
        {
            let _state = self.shared.state.lock().unwrap();
            self.shared.bump_generation();
        }
        let _ = timer.stop.send(());
        if timer.handle.join().is_err() {
            warn!("poller thread panicked");
        }
        true
    }

    pub fn is_running(&self) -> bool {
        self.timer.is_some()
    }

    /// Stops issuing fetches. A fetch already in flight completes but its
    /// result is discarded.
    pub fn pause(&self) {
        let _state = self.shared.state.lock().unwrap();
        if !self.shared.paused.swap(true, AcqRel) {
            self.shared.bump_generation();
            debug!("poller paused");
        }
    }

    /// Resumes fetching. The first snapshot after resuming only re-baselines,
    /// so the requests accumulated while paused never show up as a spike.
    pub fn resume(&self) {
        let mut state = self.shared.state.lock().unwrap();
        if self.shared.paused.swap(false, AcqRel) {
            state.resync = state.baseline.is_some();
            self.shared.bump_generation();
            debug!("poller resumed");
        }
    }

    pub fn is_paused(&self) -> bool {
        self.shared.paused.load(Acquire)
    }

    /// Applies a new cadence: stop, resize the ring buffer, restart if the
    /// timer was running.
    pub fn set_interval_ms(&mut self, interval_ms: u64) -> Result<(), ConfigError> {
        let config = PollConfig {
            interval_ms,
            ..self.config.clone()
        };
        self.reconfigure(config)
    }

    pub fn set_window_seconds(&mut self, window_seconds: u64) -> Result<(), ConfigError> {
        let config = PollConfig {
            window_seconds,
            ..self.config.clone()
        };
        self.reconfigure(config)
    }

    fn reconfigure(&mut self, config: PollConfig) -> Result<(), ConfigError> {
        config.validate()?;
        let was_running = self.stop_timer();
        {
            let mut state = self.shared.state.lock().unwrap();
            state.samples.set_limit(config.ring_capacity());
            self.shared.bump_generation();
        }
        self.config = config;
        if was_running {
            self.start();
        }
        Ok(())
    }

    /// Runs one tick on the calling thread, outside the timer.
    pub fn tick_now(&self) -> Tick {
        self.shared
            .tick(Dispatch::Inline)
            .unwrap_or(Tick::SkippedInFlight)
    }

    pub fn config(&self) -> &PollConfig {
        &self.config
    }

    /// Copy of the current sparkline window, oldest first.
    pub fn samples(&self) -> Vec<RateSample> {
        self.shared.state.lock().unwrap().samples.to_vec()
    }

    pub fn latest(&self) -> Option<RateSample> {
        self.shared.state.lock().unwrap().samples.last().copied()
    }

    pub fn last_snapshot(&self) -> Option<CounterSnapshot> {
        self.shared.state.lock().unwrap().baseline.clone()
    }

    /// Milliseconds since the last successful snapshot was captured.
    pub fn staleness(&self, now_ms: u64) -> Option<u64> {
        self.shared
            .state
            .lock()
            .unwrap()
            .baseline
            .as_ref()
            .map(|b| now_ms.saturating_sub(b.captured_at))
    }

    pub fn generation(&self) -> u64 {
        self.shared.generation.load(Acquire)
    }

    pub fn stats(&self) -> SchedulerStats {
        let c = &self.shared.counters;
        SchedulerStats {
            ticks: c.ticks.load(Relaxed),
            samples: c.samples.load(Relaxed),
            skipped: c.skipped.load(Relaxed),
            failures: c.failures.load(Relaxed),
            resets: c.resets.load(Relaxed),
            stale: c.stale.load(Relaxed),
        }
    }
}

impl<S: SnapshotSource> Drop for Scheduler<S> {
    fn drop(&mut self) {
        self.stop_timer();
    }
}
