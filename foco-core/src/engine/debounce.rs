//! Rate limit on executed device actions.
//!
//! Only the time since the last *executed* action matters, so results that
//! complete out of submission order are handled the same way. A completion
//! stamped earlier than the last execution counts as zero elapsed time.

use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebounceDecision {
    Execute,
    Suppress { elapsed: Duration },
}

#[derive(Debug)]
pub struct Debouncer {
    interval: Duration,
    last_executed: Option<Instant>,
}

impl Debouncer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_executed: None,
        }
    }

    /// Decide for an intent completed at `completed_at`; records it when executed.
    pub fn check(&mut self, completed_at: Instant) -> DebounceDecision {
        if let Some(last) = self.last_executed {
            let elapsed = completed_at.saturating_duration_since(last);
            if elapsed < self.interval {
                return DebounceDecision::Suppress { elapsed };
            }
        }
        self.last_executed = Some(completed_at);
        DebounceDecision::Execute
    }

    pub fn last_executed(&self) -> Option<Instant> {
        self.last_executed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_action_always_executes() {
        let mut debounce = Debouncer::new(Duration::from_millis(1000));
        assert_eq!(debounce.check(Instant::now()), DebounceDecision::Execute);
    }

    #[test]
    fn second_action_within_interval_is_suppressed() {
        let mut debounce = Debouncer::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        debounce.check(t0);
        assert_eq!(
            debounce.check(t0 + Duration::from_millis(400)),
            DebounceDecision::Suppress {
                elapsed: Duration::from_millis(400)
            }
        );
        // Suppressed actions do not move the window.
        assert_eq!(debounce.last_executed(), Some(t0));
    }

    #[test]
    fn second_action_after_interval_executes() {
        let mut debounce = Debouncer::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        debounce.check(t0);
        assert_eq!(
            debounce.check(t0 + Duration::from_millis(1500)),
            DebounceDecision::Execute
        );
        assert_eq!(
            debounce.check(t0 + Duration::from_millis(2500)),
            DebounceDecision::Execute
        );
    }

    #[test]
    fn exact_interval_boundary_executes() {
        let mut debounce = Debouncer::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        debounce.check(t0);
        assert_eq!(
            debounce.check(t0 + Duration::from_millis(1000)),
            DebounceDecision::Execute
        );
    }

    #[test]
    fn out_of_order_completion_counts_as_zero_elapsed() {
        let mut debounce = Debouncer::new(Duration::from_millis(1000));
        let t0 = Instant::now();
        debounce.check(t0 + Duration::from_millis(500));
        assert_eq!(
            debounce.check(t0),
            DebounceDecision::Suppress {
                elapsed: Duration::ZERO
            }
        );
    }
}
