//! One-shot deferred callbacks.
//!
//! Each scheduled callback gets its own detached thread that sleeps for the
//! delay and then runs the callback exactly once. There is no cancellation;
//! callbacks must tolerate firing after the state they act on has moved on.

use std::io;
use std::thread;
use std::time::Duration;

/// Deferred one-shot timer.
pub struct DeferredTimer;

impl DeferredTimer {
    /// Run `f` once after `delay` on a detached thread.
    pub fn schedule<F>(delay: Duration, f: F) -> io::Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        thread::Builder::new()
            .name("lagg-timer".to_string())
            .spawn(move || {
                thread::sleep(delay);
                f();
            })?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::time::Instant;

    #[test]
    fn test_fires_once_after_delay() {
        let (tx, rx) = mpsc::channel();
        let start = Instant::now();

        DeferredTimer::schedule(Duration::from_millis(30), move || {
            tx.send(Instant::now()).expect("send");
        })
        .expect("schedule");

        let fired_at = rx.recv_timeout(Duration::from_secs(5)).expect("timer fired");
        assert!(fired_at.duration_since(start) >= Duration::from_millis(30));

        // Sender was moved into the callback and dropped after one call.
        assert!(rx.recv_timeout(Duration::from_millis(50)).is_err());
    }

    #[test]
    fn test_timers_are_independent() {
        let (tx, rx) = mpsc::channel();

        for (i, ms) in [(0u8, 40u64), (1, 10)] {
            let tx = tx.clone();
            DeferredTimer::schedule(Duration::from_millis(ms), move || {
                let _ = tx.send(i);
            })
            .expect("schedule");
        }

        let first = rx.recv_timeout(Duration::from_secs(5)).expect("first");
        let second = rx.recv_timeout(Duration::from_secs(5)).expect("second");
        assert_eq!((first, second), (1, 0));
    }
}
