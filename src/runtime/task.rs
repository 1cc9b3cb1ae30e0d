use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::debug;

use crate::domain::{DomainError, TaskKind};
use crate::runtime::Marshal;

/// One-shot background task executor.
///
/// Work runs on the blocking pool; exactly one of the two callbacks is
/// marshaled back to the owner context when it finishes — never both,
/// never zero, never more than one. A second task of the same kind is
/// rejected synchronously while the first is in flight.
#[derive(Clone)]
pub struct TaskRunner {
    marshal: Marshal,
    runtime: Handle,
    in_flight: Arc<Mutex<HashSet<TaskKind>>>,
}

impl TaskRunner {
    pub fn new(marshal: Marshal, runtime: Handle) -> Self {
        Self {
            marshal,
            runtime,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Whether a task of `kind` has started but not yet delivered its
    /// callback work.
    pub fn in_flight(&self, kind: TaskKind) -> bool {
        self.in_flight.lock().contains(&kind)
    }

    /// Start `work` on a worker context.
    ///
    /// Fails with `AlreadyInFlight` if a task of `kind` is still running;
    /// the rejection is returned to the caller, not routed through
    /// `on_error`. The in-flight mark is cleared before the callback is
    /// posted, so a new task of the same kind may legally be started from
    /// inside the callback.
    pub fn spawn<T, W, S, E>(
        &self,
        kind: TaskKind,
        work: W,
        on_success: S,
        on_error: E,
    ) -> Result<(), DomainError>
    where
        T: Send + 'static,
        W: FnOnce() -> Result<T, DomainError> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(DomainError) + Send + 'static,
    {
        {
            let mut in_flight = self.in_flight.lock();
            if !in_flight.insert(kind) {
                return Err(DomainError::AlreadyInFlight(kind));
            }
        }
        debug!(%kind, "task started");

        let marshal = self.marshal.clone();
        let in_flight = Arc::clone(&self.in_flight);
        self.runtime.spawn_blocking(move || {
            let result = work();
            in_flight.lock().remove(&kind);
            debug!(%kind, ok = result.is_ok(), "task finished");
            marshal.post(move || match result {
                Ok(value) => on_success(value),
                Err(err) => on_error(err),
            });
        });
        Ok(())
    }

    /// Wait until no task is in flight, up to `timeout`. Used during
    /// teardown; returns false if something was still running when the
    /// deadline passed.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        loop {
            if self.in_flight.lock().is_empty() {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(10));
        }
    }
}
