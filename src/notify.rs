use std::collections::VecDeque;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
}

#[derive(Debug, Clone)]
pub struct Toast {
    pub kind: ToastKind,
    pub message: String,
    shown_at: Instant,
}

/// Transient notifications shown in the footer.
#[derive(Debug)]
pub struct Toasts {
    items: VecDeque<Toast>,
    ttl: Duration,
}

impl Toasts {
    const MAX_VISIBLE: usize = 3;

    pub fn new(ttl: Duration) -> Self {
        Toasts {
            items: VecDeque::new(),
            ttl,
        }
    }

    pub fn push_at(&mut self, kind: ToastKind, message: impl Into<String>, now: Instant) {
        if self.items.len() == Self::MAX_VISIBLE {
            self.items.pop_front();
        }
        self.items.push_back(Toast {
            kind,
            message: message.into(),
            shown_at: now,
        });
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push_at(ToastKind::Success, message, Instant::now());
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push_at(ToastKind::Error, message, Instant::now());
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push_at(ToastKind::Info, message, Instant::now());
    }

    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.items
            .retain(|t| now.saturating_duration_since(t.shown_at) < ttl);
    }

    pub fn visible(&self) -> impl Iterator<Item = &Toast> {
        self.items.iter()
    }

    pub fn latest(&self) -> Option<&Toast> {
        self.items.back()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toasts_expire_after_ttl() {
        let start = Instant::now();
        let mut toasts = Toasts::new(Duration::from_secs(4));
        toasts.push_at(ToastKind::Success, "Task created", start);
        toasts.push_at(ToastKind::Error, "Failed to delete task", start + Duration::from_secs(3));

        toasts.prune(start + Duration::from_secs(5));
        assert_eq!(toasts.visible().count(), 1);
        assert_eq!(toasts.latest().unwrap().kind, ToastKind::Error);

        toasts.prune(start + Duration::from_secs(8));
        assert!(toasts.is_empty());
    }

    #[test]
    fn test_oldest_toast_dropped_when_full() {
        let now = Instant::now();
        let mut toasts = Toasts::new(Duration::from_secs(4));
        for i in 0..5 {
            toasts.push_at(ToastKind::Info, format!("msg {}", i), now);
        }
        let messages: Vec<_> = toasts.visible().map(|t| t.message.as_str()).collect();
        assert_eq!(messages, vec!["msg 2", "msg 3", "msg 4"]);
    }
}
