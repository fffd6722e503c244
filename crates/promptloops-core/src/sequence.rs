use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic request tickets; only the latest dispatched ticket may commit
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dispatch a new request, superseding every earlier ticket
    pub fn next(&self) -> u64 {
        self.latest.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn latest(&self) -> u64 {
        self.latest.load(Ordering::SeqCst)
    }

    pub fn is_current(&self, ticket: u64) -> bool {
        self.latest() == ticket
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tickets_increase() {
        let seq = RequestSequence::new();
        assert_eq!(seq.latest(), 0);
        let a = seq.next();
        let b = seq.next();
        assert!(b > a);
        assert_eq!(seq.latest(), b);
    }

    #[test]
    fn test_only_latest_is_current() {
        let seq = RequestSequence::new();
        let first = seq.next();
        assert!(seq.is_current(first));

        let second = seq.next();
        assert!(!seq.is_current(first));
        assert!(seq.is_current(second));
    }
}
