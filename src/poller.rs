use parking_lot::Mutex;
use std::future::Future;
use std::ops::ControlFlow;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

struct RunningLoop {
    session: u64,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

impl RunningLoop {
    fn is_alive(&self) -> bool {
        !self.cancel.is_cancelled() && !self.handle.is_finished()
    }
}

/// Owns the periodic poll task. At most one task exists at a time and it runs
/// one tick at a time, so there is never more than one request in flight.
#[derive(Default)]
pub struct PollLoop {
    running: Mutex<Option<RunningLoop>>,
}

impl PollLoop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start ticking every `interval` on behalf of `session`. Returns `false`
    /// without doing anything if a loop for this or a newer session is already
    /// running; a loop left over from an older session is cancelled and replaced.
    ///
    /// `tick` is awaited to completion before the next tick; ticks that come
    /// due meanwhile are skipped. Returning `ControlFlow::Break` ends the loop.
    pub fn start<F, Fut>(
        &self,
        runtime: &Handle,
        session: u64,
        interval: Duration,
        mut tick: F,
    ) -> bool
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ControlFlow<()>> + Send + 'static,
    {
        let mut guard = self.running.lock();
        if let Some(running) = guard.as_ref().filter(|running| running.is_alive()) {
            if running.session >= session {
                log::debug!("Poll loop already running, not starting another");
                return false;
            }
            log::debug!("Replacing poll loop of session {}", running.session);
            running.cancel.cancel();
        }

        let cancel = CancellationToken::new();
        let task_cancel = cancel.clone();

        let handle = runtime.spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                // Dropping an in-flight tick on cancel drops its request with it
                let flow = tokio::select! {
                    biased;
                    _ = task_cancel.cancelled() => break,
                    flow = tick() => flow,
                };

                if flow.is_break() {
                    break;
                }
            }

            log::info!("Poll loop stopped");
        });

        *guard = Some(RunningLoop {
            session,
            cancel,
            handle,
        });
        true
    }

    /// Cancel the running loop. Safe to call from inside a tick.
    pub fn stop(&self) -> bool {
        match self.running.lock().take() {
            Some(running) => {
                running.cancel.cancel();
                true
            }
            None => false,
        }
    }

    /// Token cancelled together with the running loop, for work the loop spawns.
    pub fn child_token(&self) -> Option<CancellationToken> {
        self.running
            .lock()
            .as_ref()
            .filter(|running| running.is_alive())
            .map(|running| running.cancel.child_token())
    }

    pub fn is_running(&self) -> bool {
        self.running.lock().as_ref().is_some_and(RunningLoop::is_alive)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn counting_tick(
        count: Arc<AtomicUsize>,
        stop_after: usize,
    ) -> impl FnMut() -> std::future::Ready<ControlFlow<()>> + Send + 'static {
        move || {
            let n = count.fetch_add(1, Ordering::SeqCst) + 1;
            std::future::ready(if n >= stop_after {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            })
        }
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_on_interval_until_stopped() {
        let count = Arc::new(AtomicUsize::new(0));
        let poll_loop = PollLoop::new();
        assert!(poll_loop.start(
            &Handle::current(),
            1,
            Duration::from_millis(1000),
            counting_tick(count.clone(), usize::MAX),
        ));

        tokio::time::sleep(Duration::from_millis(2500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);

        assert!(poll_loop.stop());
        assert!(!poll_loop.is_running());
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 3);
        assert!(!poll_loop.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_is_ignored() {
        let count = Arc::new(AtomicUsize::new(0));
        let poll_loop = PollLoop::new();
        let runtime = Handle::current();
        let interval = Duration::from_millis(1000);

        assert!(poll_loop.start(&runtime, 1, interval, counting_tick(count.clone(), usize::MAX)));
        assert!(!poll_loop.start(&runtime, 1, interval, counting_tick(count.clone(), usize::MAX)));

        tokio::time::sleep(Duration::from_millis(1500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        poll_loop.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn break_ends_loop_and_allows_restart() {
        let count = Arc::new(AtomicUsize::new(0));
        let poll_loop = PollLoop::new();
        let runtime = Handle::current();
        let interval = Duration::from_millis(1000);

        poll_loop.start(&runtime, 1, interval, counting_tick(count.clone(), 1));
        tokio::time::sleep(Duration::from_millis(3000)).await;
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!poll_loop.is_running());

        assert!(poll_loop.start(&runtime, 1, interval, counting_tick(count.clone(), usize::MAX)));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
        poll_loop.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn newer_session_replaces_running_loop() {
        let old = Arc::new(AtomicUsize::new(0));
        let new = Arc::new(AtomicUsize::new(0));
        let poll_loop = PollLoop::new();
        let runtime = Handle::current();
        let interval = Duration::from_millis(1000);

        assert!(poll_loop.start(&runtime, 1, interval, counting_tick(old.clone(), usize::MAX)));
        tokio::time::sleep(Duration::from_millis(500)).await;
        assert!(poll_loop.start(&runtime, 3, interval, counting_tick(new.clone(), usize::MAX)));

        // A start from the older session arriving late changes nothing
        assert!(!poll_loop.start(&runtime, 1, interval, counting_tick(old.clone(), usize::MAX)));

        tokio::time::sleep(Duration::from_millis(2000)).await;
        assert_eq!(old.load(Ordering::SeqCst), 1);
        assert_eq!(new.load(Ordering::SeqCst), 3);
        assert!(poll_loop.is_running());
        poll_loop.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn child_token_is_cancelled_by_stop() {
        let poll_loop = PollLoop::new();
        assert!(poll_loop.child_token().is_none());

        poll_loop.start(
            &Handle::current(),
            1,
            Duration::from_millis(1000),
            counting_tick(Arc::new(AtomicUsize::new(0)), usize::MAX),
        );
        let child = poll_loop.child_token().unwrap();
        assert!(!child.is_cancelled());

        poll_loop.stop();
        assert!(child.is_cancelled());
    }
}
