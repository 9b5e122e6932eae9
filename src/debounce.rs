use std::time::{Duration, Instant};

/// Holds back a value until input has been quiet for `delay`. Polled from the
/// event loop.
#[derive(Debug)]
pub struct Debouncer<T> {
    delay: Duration,
    pending: Option<(T, Instant)>,
}

impl<T> Debouncer<T> {
    pub fn new(delay: Duration) -> Self {
        Debouncer {
            delay,
            pending: None,
        }
    }

    /// Replaces any pending value and restarts the timer.
    pub fn schedule(&mut self, value: T, now: Instant) {
        self.pending = Some((value, now + self.delay));
    }

    pub fn poll(&mut self, now: Instant) -> Option<T> {
        let ready = matches!(&self.pending, Some((_, due)) if *due <= now);
        if ready {
            self.flush()
        } else {
            None
        }
    }

    pub fn flush(&mut self) -> Option<T> {
        self.pending.take().map(|(v, _)| v)
    }

    pub fn cancel(&mut self) {
        self.pending = None;
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fires_once_after_quiet_period() {
        let start = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(300));

        d.schedule("u", start);
        d.schedule("ur", start + Duration::from_millis(100));
        d.schedule("urg", start + Duration::from_millis(200));

        assert_eq!(d.poll(start + Duration::from_millis(400)), None);
        assert_eq!(d.poll(start + Duration::from_millis(500)), Some("urg"));
        assert_eq!(d.poll(start + Duration::from_millis(900)), None);
    }

    #[test]
    fn test_flush_and_cancel() {
        let now = Instant::now();
        let mut d = Debouncer::new(Duration::from_millis(300));

        d.schedule(1, now);
        assert_eq!(d.flush(), Some(1));
        assert!(!d.is_pending());

        d.schedule(2, now);
        d.cancel();
        assert_eq!(d.poll(now + Duration::from_secs(1)), None);
    }
}
