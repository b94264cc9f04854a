//! Per-provider request pacing.
//!
//! Callers enqueue a ticket and wait for the dispatcher to admit them with a
//! concurrency slot. A single dispatcher task per limiter drains the queue in
//! FIFO order and admits the next ticket only after the previous caller has
//! started its task. Each admitted caller waits on the shared GCRA pacer in
//! the same poll that invokes its task, so two consecutive task starts are at
//! least `min_interval` apart even when a caller is polled late.

use std::future::Future;
use std::num::NonZeroU32;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use governor::clock::DefaultClock;
use governor::state::direct::NotKeyed;
use governor::state::InMemoryState;
use governor::{Quota, RateLimiter as GcraLimiter};
use tokio::sync::{mpsc, oneshot, OwnedSemaphorePermit, Semaphore};

use crate::provider_policy::ProviderPolicy;
use crate::SourceError;

type Pacer = GcraLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Spacing and concurrency limits for one [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    pub min_interval: Duration,
    pub max_concurrent: usize,
}

impl From<&ProviderPolicy> for RateLimiterConfig {
    fn from(policy: &ProviderPolicy) -> Self {
        Self {
            min_interval: policy.min_interval,
            max_concurrent: policy.max_concurrent,
        }
    }
}

struct Ticket {
    admit: oneshot::Sender<Admission>,
}

/// Slot handed to the caller at the head of the queue. `started` is signalled
/// once the caller has passed the pacer and invoked its task.
struct Admission {
    slot: OwnedSemaphorePermit,
    started: oneshot::Sender<()>,
}

/// FIFO scheduler bounding request rate and concurrency toward one provider.
///
/// Cloning shares the same queue. The queue is unbounded: tasks are never
/// dropped, callers simply wait longer.
#[derive(Clone)]
pub struct RateLimiter {
    name: Arc<str>,
    queue: mpsc::UnboundedSender<Ticket>,
    slots: Arc<Semaphore>,
    pacer: Option<Arc<Pacer>>,
    max_concurrent: usize,
    pending: Arc<AtomicUsize>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("name", &self.name)
            .field("max_concurrent", &self.max_concurrent)
            .field("pending", &self.pending())
            .field("active", &self.active())
            .finish()
    }
}

impl RateLimiter {
    /// Creates the limiter and spawns its dispatcher task.
    ///
    /// Must be called from within a Tokio runtime. The dispatcher exits once
    /// every clone of the limiter has been dropped.
    pub fn new(name: impl Into<String>, config: RateLimiterConfig) -> Self {
        let name: Arc<str> = Arc::from(name.into());
        let max_concurrent = config.max_concurrent.max(1);
        let slots = Arc::new(Semaphore::new(max_concurrent));
        let pending = Arc::new(AtomicUsize::new(0));
        let (queue, tickets) = mpsc::unbounded_channel();

        tokio::spawn(dispatch(
            Arc::clone(&name),
            tickets,
            Arc::clone(&slots),
            Arc::clone(&pending),
        ));

        Self {
            name,
            queue,
            slots,
            pacer: pacer_for(config.min_interval).map(Arc::new),
            max_concurrent,
            pending,
        }
    }

    pub fn from_policy(policy: &ProviderPolicy) -> Self {
        Self::new(policy.provider_id.as_str(), RateLimiterConfig::from(policy))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Waits for this caller's turn, then runs `task` while holding a
    /// concurrency slot. The task's own outcome is returned unchanged.
    pub async fn schedule<T, F, Fut>(&self, task: F) -> Result<T, SourceError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, SourceError>>,
    {
        let (admit, admitted) = oneshot::channel();
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.queue.send(Ticket { admit }).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            return Err(self.stopped());
        }

        let Admission { slot, started } = admitted.await.map_err(|_| self.stopped())?;
        let _slot = slot;

        // The pacing cell is taken in the same poll that invokes the task.
        if let Some(pacer) = &self.pacer {
            pacer.until_ready().await;
        }
        let _ = started.send(());
        task().await
    }

    /// Tickets waiting for dispatch.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Tasks currently holding a concurrency slot.
    pub fn active(&self) -> usize {
        self.max_concurrent - self.slots.available_permits()
    }

    fn stopped(&self) -> SourceError {
        SourceError::internal(format!("rate limiter '{}' dispatcher stopped", self.name))
    }
}

async fn dispatch(
    name: Arc<str>,
    mut tickets: mpsc::UnboundedReceiver<Ticket>,
    slots: Arc<Semaphore>,
    pending: Arc<AtomicUsize>,
) {
    while let Some(ticket) = tickets.recv().await {
        pending.fetch_sub(1, Ordering::SeqCst);
        let Ok(slot) = Arc::clone(&slots).acquire_owned().await else {
            break;
        };

        if ticket.admit.is_closed() {
            continue;
        }

        let (started, start_ack) = oneshot::channel();
        if ticket.admit.send(Admission { slot, started }).is_err() {
            tracing::debug!(limiter = %name, "caller dropped before dispatch");
            continue;
        }

        // Next ticket waits until this caller has actually started.
        if start_ack.await.is_err() {
            tracing::debug!(limiter = %name, "caller dropped before starting");
        }
    }

    tracing::debug!(limiter = %name, "rate limiter dispatcher stopped");
}

/// Burst of one, replenished every `min_interval`.
fn pacer_for(min_interval: Duration) -> Option<Pacer> {
    let quota = Quota::with_period(min_interval)?.allow_burst(NonZeroU32::MIN);
    Some(GcraLimiter::direct(quota))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Instant;

    fn limiter(min_interval_ms: u64, max_concurrent: usize) -> RateLimiter {
        RateLimiter::new(
            "test",
            RateLimiterConfig {
                min_interval: Duration::from_millis(min_interval_ms),
                max_concurrent,
            },
        )
    }

    #[tokio::test]
    async fn spaces_dispatch_starts_by_min_interval() {
        let limiter = limiter(50, 1);
        let starts = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..5 {
            let limiter = limiter.clone();
            let starts = Arc::clone(&starts);
            handles.push(tokio::spawn(async move {
                limiter
                    .schedule(|| async {
                        starts.lock().expect("starts lock").push(Instant::now());
                        Ok::<_, SourceError>(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("task joins").expect("task succeeds");
        }

        let starts = starts.lock().expect("starts lock");
        assert_eq!(starts.len(), 5);
        for pair in starts.windows(2) {
            let delta = pair[1].duration_since(pair[0]);
            assert!(delta >= Duration::from_millis(45), "delta={delta:?}");
        }
    }

    #[tokio::test]
    async fn caps_concurrency() {
        let limiter = limiter(1, 2);
        let running = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..6 {
            let limiter = limiter.clone();
            let running = Arc::clone(&running);
            let peak = Arc::clone(&peak);
            handles.push(tokio::spawn(async move {
                limiter
                    .schedule(|| async {
                        let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                        peak.fetch_max(now, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(30)).await;
                        running.fetch_sub(1, Ordering::SeqCst);
                        Ok::<_, SourceError>(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("task joins").expect("task succeeds");
        }

        assert_eq!(peak.load(Ordering::SeqCst), 2);
        assert_eq!(limiter.active(), 0);
    }

    #[tokio::test]
    async fn forwards_task_errors_and_keeps_draining() {
        let limiter = limiter(0, 1);

        let failed = limiter
            .schedule(|| async { Err::<(), _>(SourceError::unavailable("upstream down")) })
            .await
            .expect_err("task error is forwarded");
        assert_eq!(failed.message(), "upstream down");

        let value = limiter
            .schedule(|| async { Ok::<_, SourceError>(7) })
            .await
            .expect("queue keeps draining");
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn dispatches_in_fifo_order() {
        let limiter = limiter(5, 1);
        let order = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for index in 0..4 {
            let limiter = limiter.clone();
            let order = Arc::clone(&order);
            handles.push(tokio::spawn(async move {
                limiter
                    .schedule(|| async {
                        order.lock().expect("order lock").push(index);
                        Ok::<_, SourceError>(())
                    })
                    .await
            }));
            tokio::task::yield_now().await;
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
        for handle in handles {
            handle.await.expect("task joins").expect("task succeeds");
        }

        assert_eq!(*order.lock().expect("order lock"), vec![0, 1, 2, 3]);
    }

    #[tokio::test]
    async fn late_polled_caller_still_spaces_task_starts() {
        let limiter = limiter(50, 1);
        let starts = Arc::new(Mutex::new(Vec::new()));

        let first = {
            let limiter = limiter.clone();
            let starts = Arc::clone(&starts);
            tokio::spawn(async move {
                limiter
                    .schedule(|| async {
                        starts.lock().expect("starts lock").push((0, Instant::now()));
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok::<_, SourceError>(())
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        // Enqueue the second caller, then leave it unpolled for a while.
        let late = limiter.schedule(|| async {
            starts.lock().expect("starts lock").push((1, Instant::now()));
            Ok::<_, SourceError>(())
        });
        tokio::pin!(late);
        let _ = tokio::time::timeout(Duration::from_millis(1), &mut late).await;

        let third = {
            let limiter = limiter.clone();
            let starts = Arc::clone(&starts);
            tokio::spawn(async move {
                limiter
                    .schedule(|| async {
                        starts.lock().expect("starts lock").push((2, Instant::now()));
                        Ok::<_, SourceError>(())
                    })
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(80)).await;
        late.await.expect("late caller succeeds");
        first.await.expect("task joins").expect("task succeeds");
        third.await.expect("task joins").expect("task succeeds");

        let starts = starts.lock().expect("starts lock");
        let order: Vec<_> = starts.iter().map(|(index, _)| *index).collect();
        assert_eq!(order, vec![0, 1, 2]);
        for pair in starts.windows(2) {
            let delta = pair[1].1.duration_since(pair[0].1);
            assert!(delta >= Duration::from_millis(45), "delta={delta:?}");
        }
    }
}
