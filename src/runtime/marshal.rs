use tokio::sync::mpsc;
use tracing::debug;

type Job = Box<dyn FnOnce() + Send>;

/// Hands closures to the single designated owner ("UI") context.
///
/// Workers never touch shared state directly: they post a closure here and
/// the owner drains them, in posting order, from its own loop. The inline
/// variant runs closures synchronously on the posting thread instead, for
/// headless and test use where no serial context exists.
#[derive(Clone)]
pub struct Marshal {
    inner: MarshalInner,
}

#[derive(Clone)]
enum MarshalInner {
    Owned(mpsc::UnboundedSender<Job>),
    Inline,
}

impl Marshal {
    /// Create a marshal plus the pump its owner thread drains.
    pub fn channel() -> (Self, MarshalPump) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                inner: MarshalInner::Owned(tx),
            },
            MarshalPump { rx },
        )
    }

    /// A marshal that executes jobs synchronously on the posting thread.
    pub fn inline() -> Self {
        Self {
            inner: MarshalInner::Inline,
        }
    }

    /// Queue `job` for the owner context. Jobs posted after the pump has
    /// been dropped are discarded.
    pub fn post(&self, job: impl FnOnce() + Send + 'static) {
        match &self.inner {
            MarshalInner::Owned(tx) => {
                if tx.send(Box::new(job)).is_err() {
                    debug!("owner context gone, dropping marshaled job");
                }
            }
            MarshalInner::Inline => job(),
        }
    }
}

/// Receiving half of a marshal, owned by the serial context.
///
/// Exactly one of the drain methods should drive this; jobs run on the
/// calling thread, one at a time, in posting order.
pub struct MarshalPump {
    rx: mpsc::UnboundedReceiver<Job>,
}

impl MarshalPump {
    /// Run every job currently queued without blocking; returns how many
    /// ran.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }

    /// Block until the next job arrives, run it, and return true. Returns
    /// false once every marshal handle has been dropped. Must not be called
    /// from async context.
    pub fn run_one(&mut self) -> bool {
        match self.rx.blocking_recv() {
            Some(job) => {
                job();
                true
            }
            None => false,
        }
    }

    /// Async drain for embedding in an event loop.
    pub async fn run(&mut self) {
        while let Some(job) = self.rx.recv().await {
            job();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use parking_lot::Mutex;

    use super::*;

    #[test]
    fn test_inline_runs_on_caller() {
        let marshal = Marshal::inline();
        let ran = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&ran);
        marshal.post(move || {
            seen.fetch_add(1, Ordering::SeqCst);
        });
        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_owned_defers_until_drain_and_preserves_order() {
        let (marshal, mut pump) = Marshal::channel();
        let order = Arc::new(Mutex::new(Vec::new()));

        for i in 0..3 {
            let order = Arc::clone(&order);
            marshal.post(move || order.lock().push(i));
        }
        assert!(order.lock().is_empty());

        assert_eq!(pump.drain(), 3);
        assert_eq!(*order.lock(), vec![0, 1, 2]);
        assert_eq!(pump.drain(), 0);
    }

    #[test]
    fn test_posts_from_other_threads_are_serialized() {
        let (marshal, mut pump) = Marshal::channel();
        let count = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let marshal = marshal.clone();
                let count = Arc::clone(&count);
                std::thread::spawn(move || {
                    marshal.post(move || {
                        count.fetch_add(1, Ordering::SeqCst);
                    });
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(pump.drain(), 4);
        assert_eq!(count.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn test_post_after_pump_dropped_is_discarded() {
        let (marshal, pump) = Marshal::channel();
        drop(pump);
        // Must not panic or block.
        marshal.post(|| panic!("job should have been dropped"));
    }
}
