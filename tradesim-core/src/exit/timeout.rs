//! Timeout exit — close at the bar close once the holding horizon has elapsed.

use chrono::Duration;

use crate::domain::{ExitReason, Position};

use super::{ExitDecision, ExitPolicy, MarketContext};

#[derive(Debug, Clone, PartialEq)]
pub struct TimeoutExit {
    pub max_hold: Duration,
}

impl TimeoutExit {
    pub fn new(max_hold: Duration) -> Self {
        Self { max_hold }
    }

    pub fn hours(hours: u32) -> Self {
        Self::new(Duration::hours(i64::from(hours)))
    }
}

impl ExitPolicy for TimeoutExit {
    fn name(&self) -> &str {
        "timeout"
    }

    fn check(&self, position: &Position, ctx: &MarketContext<'_>) -> ExitDecision {
        if position.hold_duration(ctx.now) >= self.max_hold {
            ExitDecision::full(ctx.bar.close, ExitReason::Timeout)
        } else {
            ExitDecision::Hold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;

    #[test]
    fn fires_at_horizon_on_close() {
        // Entry on day 1, 48h horizon.
        let policy = TimeoutExit::hours(48);
        let pos = long_at(100.0);

        let b2 = bar(2, 100.0, 101.0, 99.0, 100.5);
        assert!(policy.check(&pos, &MarketContext::new(&b2)).is_hold());

        let b3 = bar(3, 100.0, 101.0, 99.0, 100.7);
        assert_eq!(
            policy.check(&pos, &MarketContext::new(&b3)),
            ExitDecision::full(100.7, ExitReason::Timeout)
        );
    }
}
