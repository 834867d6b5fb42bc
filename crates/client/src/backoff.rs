//! Exponential backoff policy for the upload and done retry loops.

use std::time::Duration;

/// Doubling delay with a per-attempt cap and no elapsed-time bound: the
/// client keeps retrying for as long as the producer is willing to wait.
pub struct Backoff {
    next: Duration,
    cap: Duration,
}

impl Backoff {
    const INITIAL: Duration = Duration::from_secs(1);
    const CAP: Duration = Duration::from_secs(60);

    pub fn new() -> Self {
        Self {
            next: Self::INITIAL,
            cap: Self::CAP,
        }
    }

    /// The delay to sleep before the next attempt. Doubles per call up to
    /// the cap.
    pub fn next_delay(&mut self) -> Duration {
        let delay = self.next;
        self.next = (self.next * 2).min(self.cap);
        delay
    }

    /// Restart from the initial delay once the link is healthy again.
    pub fn reset(&mut self) {
        self.next = Self::INITIAL;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_double_up_to_the_cap() {
        let mut backoff = Backoff::new();
        let secs: Vec<u64> = (0..8).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }

    #[test]
    fn test_reset_restarts_the_progression() {
        let mut backoff = Backoff::new();
        for _ in 0..10 {
            backoff.next_delay();
        }
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(), Duration::from_secs(2));
    }
}
