use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{watch, Semaphore};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

use crate::invoker::{InvocationResult, Outcome};

/// Scheduler lifecycle, observable through [`Scheduler::state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Running,
    Stopping,
    Stopped,
}

/// One point on the schedule: invocation `seq` was due at `due`.
///
/// Tick times are anchored to the start of the schedule (`start + seq * period`),
/// never to the completion of the previous invocation.
#[derive(Debug, Clone, Copy)]
pub struct Tick {
    pub seq: u64,
    pub due: Instant,
}

/// Totals for one schedule lifetime.
#[derive(Debug, Default, Clone, Copy)]
pub struct Summary {
    pub fired: u64,
    pub skipped: u64,
    pub failures: u64,
}

/// Fixed-cadence scheduler driving one action.
///
/// Each fired tick runs in its own task so a slow invocation never delays the
/// clock; a one-permit gate keeps at most one invocation in flight, and a tick
/// that finds the gate taken is skipped, not queued.
pub struct Scheduler {
    period: Duration,
    grace: Duration,
    state: watch::Sender<State>,
}

impl Scheduler {
    pub fn new(period: Duration, grace: Duration) -> Self {
        let (state, _) = watch::channel(State::Idle);
        Self { period, grace, state }
    }

    /// Watch lifecycle transitions.
    pub fn state(&self) -> watch::Receiver<State> {
        self.state.subscribe()
    }

    /// Perform a single invocation and return its result.
    pub async fn run_once<F, Fut>(fire: F) -> InvocationResult
    where
        F: FnOnce(Tick) -> Fut,
        Fut: Future<Output = InvocationResult>,
    {
        let res = fire(Tick { seq: 0, due: Instant::now() }).await;
        report(&res);
        res
    }

    /// Run the schedule until `shutdown` flips to true (or its sender drops).
    ///
    /// An in-flight invocation is allowed to finish naturally during shutdown,
    /// bounded by the grace period; the wait for the next tick is never
    /// entered once stopping.
    pub async fn run_forever<F, Fut>(
        self,
        mut fire: F,
        mut shutdown: watch::Receiver<bool>,
    ) -> Summary
    where
        F: FnMut(Tick) -> Fut,
        Fut: Future<Output = InvocationResult> + Send + 'static,
    {
        let gate = Arc::new(Semaphore::new(1));
        let failures = Arc::new(AtomicU64::new(0));
        let mut summary = Summary::default();
        let mut seq: u64 = 0;
        let mut next = Instant::now();

        self.state.send_replace(State::Running);
        info!("schedule running period={}s", self.period.as_secs());

        loop {
            tokio::select! {
                _ = time::sleep_until(next) => {
                    let tick = Tick { seq, due: next };
                    match gate.clone().try_acquire_owned() {
                        Ok(permit) => {
                            summary.fired += 1;
                            let fut = fire(tick);
                            let failures = failures.clone();
                            tokio::spawn(async move {
                                let res = fut.await;
                                report(&res);
                                if !res.outcome.is_success() {
                                    failures.fetch_add(1, Ordering::Relaxed);
                                }
                                drop(permit);
                            });
                        }
                        Err(_) => {
                            summary.skipped += 1;
                            debug!("tick {} skipped: previous invocation still in flight", seq);
                        }
                    }
                    seq += 1;
                    next += self.period;
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("schedule stopping");
                        break;
                    }
                }
            }
        }

        self.state.send_replace(State::Stopping);
        if time::timeout(self.grace, gate.acquire()).await.is_err() {
            warn!(
                "in-flight invocation outlived the {}s grace period, abandoning",
                self.grace.as_secs()
            );
        }
        summary.failures = failures.load(Ordering::Relaxed);
        self.state.send_replace(State::Stopped);
        info!(
            "schedule stopped fired={} skipped={} failures={}",
            summary.fired, summary.skipped, summary.failures
        );
        summary
    }
}

fn report(res: &InvocationResult) {
    match &res.outcome {
        Outcome::Success { items } => {
            info!("collect ok seq={} items={} took={:?}", res.tick_seq, items, res.took());
        }
        Outcome::Failure(reason) => {
            warn!("collect err seq={} took={:?} err={}", res.tick_seq, res.took(), reason);
        }
    }
}
