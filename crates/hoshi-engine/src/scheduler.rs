//! Cancellable debounce timer.
//!
//! Each [`Debouncer::schedule`] call supersedes the previous one: only the
//! action scheduled last runs, and only if neither a newer schedule nor a
//! [`Debouncer::cancel`] happened before its delay elapsed. One worker
//! thread, started on first use, serves every schedule.

use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::warn;

use crate::logging::SESSION_TARGET;

/// Delay collapsing bursts of board changes into one endstate query.
pub const UPDATE_DEBOUNCE: Duration = Duration::from_millis(20);

type Action = Box<dyn FnOnce() + Send>;

struct Pending {
    deadline: Instant,
    action: Action,
}

#[derive(Default)]
struct TimerState {
    pending: Option<Pending>,
    worker_started: bool,
    shutdown: bool,
}

#[derive(Default)]
struct Timer {
    state: Mutex<TimerState>,
    wake: Condvar,
}

impl Timer {
    fn lock(&self) -> MutexGuard<'_, TimerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Waits for the pending deadline and runs its action unlocked.
    fn run(&self) {
        let mut state = self.lock();
        while !state.shutdown {
            let Some(deadline) = state.pending.as_ref().map(|pending| pending.deadline) else {
                state = self.wake.wait(state).unwrap_or_else(PoisonError::into_inner);
                continue;
            };
            let now = Instant::now();
            if now < deadline {
                state = self
                    .wake
                    .wait_timeout(state, deadline - now)
                    .unwrap_or_else(PoisonError::into_inner)
                    .0;
                continue;
            }
            if let Some(pending) = state.pending.take() {
                drop(state);
                (pending.action)();
                state = self.lock();
            }
        }
    }
}

/// Runs the most recently scheduled action after a fixed delay.
pub struct Debouncer {
    delay: Duration,
    timer: Arc<Timer>,
}

impl Debouncer {
    /// Creates a debouncer with the given delay.
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            timer: Arc::new(Timer::default()),
        }
    }

    /// Schedules `action`, superseding any pending one.
    pub fn schedule<F>(&self, action: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.timer.lock();
        state.pending = Some(Pending {
            deadline: Instant::now() + self.delay,
            action: Box::new(action),
        });
        if !state.worker_started {
            state.worker_started = self.spawn_worker();
        }
        drop(state);
        self.timer.wake.notify_one();
    }

    /// Discards any pending action.
    pub fn cancel(&self) {
        self.timer.lock().pending = None;
        self.timer.wake.notify_one();
    }

    fn spawn_worker(&self) -> bool {
        let timer = Arc::clone(&self.timer);
        match thread::Builder::new()
            .name(String::from("hoshi-debounce"))
            .spawn(move || timer.run())
        {
            Ok(_) => true,
            Err(error) => {
                warn!(target: SESSION_TARGET, %error, "failed to spawn debounce timer");
                false
            }
        }
    }
}

impl Default for Debouncer {
    fn default() -> Self {
        Self::new(UPDATE_DEBOUNCE)
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        let mut state = self.timer.lock();
        state.pending = None;
        state.shutdown = true;
        drop(state);
        self.timer.wake.notify_one();
    }
}

impl fmt::Debug for Debouncer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.timer.lock();
        f.debug_struct("Debouncer")
            .field("delay", &self.delay)
            .field("pending", &state.pending.is_some())
            .field("worker_started", &state.worker_started)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::PoisonError;

    use rstest::rstest;

    use super::*;

    const SETTLE: Duration = Duration::from_millis(300);

    fn log() -> Arc<Mutex<Vec<&'static str>>> {
        Arc::new(Mutex::new(Vec::new()))
    }

    fn push(log: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> impl FnOnce() + Send + 'static {
        let log = Arc::clone(log);
        move || log.lock().unwrap_or_else(PoisonError::into_inner).push(label)
    }

    fn entries(log: &Arc<Mutex<Vec<&'static str>>>) -> Vec<&'static str> {
        log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    #[rstest]
    fn runs_only_the_latest_action() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let seen = log();

        debouncer.schedule(push(&seen, "first"));
        debouncer.schedule(push(&seen, "second"));
        thread::sleep(SETTLE);

        assert_eq!(entries(&seen), vec!["second"]);
    }

    #[rstest]
    fn cancel_discards_pending_action() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let seen = log();

        debouncer.schedule(push(&seen, "cancelled"));
        debouncer.cancel();
        thread::sleep(SETTLE);

        assert!(entries(&seen).is_empty());
    }

    #[rstest]
    fn actions_after_the_delay_each_run() {
        let debouncer = Debouncer::new(Duration::from_millis(10));
        let seen = log();

        debouncer.schedule(push(&seen, "one"));
        thread::sleep(SETTLE);
        debouncer.schedule(push(&seen, "two"));
        thread::sleep(SETTLE);

        assert_eq!(entries(&seen), vec!["one", "two"]);
    }

    #[rstest]
    fn bursts_share_one_worker_thread() {
        let debouncer = Debouncer::new(Duration::from_millis(50));
        let seen = log();

        for label in ["a", "b", "c", "d", "e"] {
            debouncer.schedule(push(&seen, label));
        }
        assert!(debouncer.timer.lock().worker_started);
        // The test holds one handle and the worker holds the other.
        assert_eq!(Arc::strong_count(&debouncer.timer), 2);
        thread::sleep(SETTLE);

        assert_eq!(entries(&seen), vec!["e"]);
    }

    #[rstest]
    fn an_action_may_schedule_its_successor() {
        let debouncer = Arc::new(Debouncer::new(Duration::from_millis(10)));
        let seen = log();
        let chained = {
            let debouncer = Arc::clone(&debouncer);
            let follow_up = push(&seen, "second");
            let first = push(&seen, "first");
            move || {
                first();
                debouncer.schedule(follow_up);
            }
        };

        debouncer.schedule(chained);
        thread::sleep(SETTLE);

        assert_eq!(entries(&seen), vec!["first", "second"]);
    }
}
