// Retry policy for download attempts

use std::time::Duration;

use super::errors::FailureKind;

/// What to do after a failed attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Switch to the next identity and try again right away
    RotateIdentity,
    /// Same identity, after a pause
    RetryAfter(Duration),
    /// Record the failure
    GiveUp,
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts including the first
    pub max_attempts: u32,
    /// Pause before retrying a transient failure
    pub transient_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            transient_delay: Duration::from_millis(1500),
        }
    }
}

impl RetryPolicy {
    /// `attempt` is 1-based (1 = first attempt).
    pub fn decide(&self, attempt: u32, kind: FailureKind) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::GiveUp;
        }
        match kind {
            FailureKind::Blocked => RetryDecision::RotateIdentity,
            FailureKind::Transient => RetryDecision::RetryAfter(self.transient_delay),
            FailureKind::Unavailable
            | FailureKind::Private
            | FailureKind::Removed
            | FailureKind::Unknown => RetryDecision::GiveUp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_rotates_until_exhausted() {
        let p = RetryPolicy::default();
        assert_eq!(p.decide(1, FailureKind::Blocked), RetryDecision::RotateIdentity);
        assert_eq!(p.decide(2, FailureKind::Blocked), RetryDecision::RotateIdentity);
        assert_eq!(p.decide(3, FailureKind::Blocked), RetryDecision::GiveUp);
    }

    #[test]
    fn transient_waits() {
        let p = RetryPolicy {
            max_attempts: 2,
            transient_delay: Duration::from_millis(10),
        };
        assert_eq!(
            p.decide(1, FailureKind::Transient),
            RetryDecision::RetryAfter(Duration::from_millis(10))
        );
        assert_eq!(p.decide(2, FailureKind::Transient), RetryDecision::GiveUp);
    }

    #[test]
    fn terminal_kinds_never_retry() {
        let p = RetryPolicy::default();
        for kind in [
            FailureKind::Unavailable,
            FailureKind::Private,
            FailureKind::Removed,
            FailureKind::Unknown,
        ] {
            assert_eq!(p.decide(1, kind), RetryDecision::GiveUp);
        }
    }

    #[test]
    fn single_attempt_policy() {
        let p = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        assert_eq!(p.decide(1, FailureKind::Blocked), RetryDecision::GiveUp);
    }
}
