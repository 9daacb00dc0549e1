use std::future::Future;
use std::time::Duration;

use stats_core::action::Action;
use stats_core::collect::{CollectError, Fetcher};
use tokio::time::{self, Instant};
use tracing::debug;

use crate::scheduler::Tick;

/// What one invocation produced.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The action completed; `items` rows were collected.
    Success { items: usize },
    /// The action failed; the reason is carried for logging, never raised.
    Failure(String),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }
}

/// Record of a single invocation, consumed for logging and exit-code decisions.
#[derive(Debug, Clone)]
pub struct InvocationResult {
    pub tick_seq: u64,
    pub started_at: Instant,
    pub finished_at: Instant,
    pub outcome: Outcome,
}

impl InvocationResult {
    pub fn took(&self) -> Duration {
        self.finished_at.duration_since(self.started_at)
    }
}

/// Runs one named action per tick; every collection error becomes a Failure
/// outcome so a bad tick never takes the schedule down.
pub struct CollectInvoker {
    fetcher: Fetcher,
    action: Action,
    use_cache: bool,
    limit: Option<Duration>,
}

impl CollectInvoker {
    pub fn new(fetcher: Fetcher, action: Action, use_cache: bool, limit: Option<Duration>) -> Self {
        Self { fetcher, action, use_cache, limit }
    }

    pub async fn invoke(&self, tick: Tick) -> InvocationResult {
        let started = Instant::now();
        debug!(
            "invoke {} seq={} use_cache={}",
            self.action, tick.seq, self.use_cache
        );
        let outcome = bounded(self.limit, self.fetcher.run(self.action, self.use_cache)).await;
        InvocationResult {
            tick_seq: tick.seq,
            started_at: started,
            finished_at: Instant::now(),
            outcome,
        }
    }
}

async fn bounded<Fut>(limit: Option<Duration>, fut: Fut) -> Outcome
where
    Fut: Future<Output = Result<usize, CollectError>>,
{
    let res = match limit {
        Some(d) => match time::timeout(d, fut).await {
            Ok(r) => r,
            Err(_) => return Outcome::Failure(format!("timed out after {}s", d.as_secs())),
        },
        None => fut.await,
    };
    match res {
        Ok(items) => Outcome::Success { items },
        Err(e) => Outcome::Failure(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn bounded_marks_overlong_work_as_timeout() {
        let outcome = bounded(Some(Duration::from_secs(5)), async {
            time::sleep(Duration::from_secs(3600)).await;
            Ok::<usize, CollectError>(0)
        })
        .await;
        assert!(matches!(outcome, Outcome::Failure(ref r) if r.contains("timed out after 5s")));
    }

    #[tokio::test]
    async fn bounded_passes_success_through() {
        let outcome = bounded(None, async { Ok::<usize, CollectError>(32) }).await;
        assert!(matches!(outcome, Outcome::Success { items: 32 }));
    }

    #[tokio::test]
    async fn bounded_converts_errors_to_failures() {
        let outcome = bounded(Some(Duration::from_secs(5)), async {
            Err::<usize, CollectError>(CollectError::UnexpectedContents(
                "no teams block in response".to_string(),
            ))
        })
        .await;
        assert!(matches!(outcome, Outcome::Failure(ref r) if r.contains("no teams block")));
    }
}
