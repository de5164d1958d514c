use std::time::Duration;

use tokio::time::Instant;

use crate::error::TmdbError;

/// Caller-supplied cut-off for a lookup operation.
///
/// Checked before each matcher tier transition and before each provider
/// query; an expired deadline aborts with [`TmdbError::DeadlineExpired`]
/// instead of proceeding to the next (costlier) fallback.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Option<Instant>);

impl Deadline {
    /// No cut-off; the operation runs every tier to completion.
    pub fn none() -> Self {
        Self(None)
    }

    pub fn after(timeout: Duration) -> Self {
        Self(Some(Instant::now() + timeout))
    }

    pub fn at(instant: Instant) -> Self {
        Self(Some(instant))
    }

    pub fn expired(&self) -> bool {
        self.0.is_some_and(|at| Instant::now() >= at)
    }

    pub fn check(&self) -> Result<(), TmdbError> {
        if self.expired() {
            Err(TmdbError::DeadlineExpired)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unbounded_deadline_never_expires() {
        assert!(Deadline::none().check().is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_expires_after_timeout() {
        let deadline = Deadline::after(Duration::from_secs(5));
        assert!(deadline.check().is_ok());

        tokio::time::advance(Duration::from_secs(6)).await;
        assert!(matches!(
            deadline.check(),
            Err(TmdbError::DeadlineExpired)
        ));
    }
}
