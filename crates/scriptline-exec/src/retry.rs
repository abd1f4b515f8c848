//! Connect-with-retry
//!
//! Freshly provisioned hosts often are not accepting SSH yet when the first
//! script is sent. The connect loop absorbs that with a fixed number of
//! attempts and a constant pause between them.

use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use crate::error::ExecError;
use crate::keys::load_credential;
use crate::result::RemoteTarget;
use crate::transport::{DialParams, Transport, TransportError};

/// SSH port; not configurable
pub const SSH_PORT: u16 = 22;

/// Default total number of dial attempts
pub const DEFAULT_MAX_ATTEMPTS: u32 = 20;

/// Default pause between dial attempts
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// Bounded, constant-backoff retry policy
///
/// Always allows at least one attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            backoff: DEFAULT_BACKOFF,
        }
    }
}

impl RetryPolicy {
    /// Create a policy
    ///
    /// # Errors
    /// Returns `ExecError::Config` if `max_attempts` is zero
    pub fn new(max_attempts: u32, backoff: Duration) -> Result<Self, ExecError> {
        if max_attempts == 0 {
            return Err(ExecError::Config(
                "retry max_attempts must be at least 1".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            backoff,
        })
    }

    /// Total attempts, including the first
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Pause after each failed attempt except the last
    #[must_use]
    pub fn backoff(&self) -> Duration {
        self.backoff
    }
}

/// Source of delay between attempts
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Pause for `duration`
    async fn sleep(&self, duration: Duration);
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// Load the target's key, then dial until a connection succeeds or the
/// policy runs out of attempts
///
/// Host keys are not verified by the production transport, which is only
/// acceptable for throwaway test machines.
///
/// # Errors
/// - `ExecError::Config` if the policy allows no attempts (no dial is made)
/// - `ExecError::Credential` if the key cannot be loaded (no dial is made)
/// - `ExecError::ConnectionExhausted` if every attempt failed
#[instrument(skip_all, fields(host = %target.host))]
pub async fn connect_with_retry<T, S>(
    transport: &T,
    sleeper: &S,
    policy: &RetryPolicy,
    target: &RemoteTarget,
) -> Result<T::Connection, ExecError>
where
    T: Transport + ?Sized,
    S: Sleeper + ?Sized,
{
    if policy.max_attempts == 0 {
        return Err(ExecError::Config(
            "retry max_attempts must be at least 1".to_string(),
        ));
    }

    let key = load_credential(&target.key_path)?;

    let params = DialParams {
        host: target.host.clone(),
        port: SSH_PORT,
        user: target.user.clone(),
        key,
    };

    let mut attempts = 0;
    let mut last_error = None;

    for attempt in 1..=policy.max_attempts {
        debug!(attempt, max_attempts = policy.max_attempts, "dialing");

        attempts = attempt;
        match transport.dial(&params).await {
            Ok(conn) => {
                info!(attempt, user = %params.user, "SSH connected and authenticated");
                return Ok(conn);
            }
            Err(e) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %e,
                    "connection attempt failed"
                );
                last_error = Some(e);
            }
        }

        if attempt < policy.max_attempts {
            sleeper.sleep(policy.backoff).await;
        }
    }

    match last_error {
        Some(last_error) => Err(ExecError::ConnectionExhausted {
            host: target.host.clone(),
            attempts,
            last_error,
        }),
        None => Err(ExecError::Config(
            "retry policy made no connection attempt".to_string(),
        )),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::transport::{Connection, Session, SessionOutput};

    struct NoopSession;

    #[async_trait]
    impl Session for NoopSession {
        async fn exec(&mut self, _command: &str) -> Result<SessionOutput, TransportError> {
            Ok(SessionOutput::default())
        }

        async fn close(self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    struct NoopConnection;

    #[async_trait]
    impl Connection for NoopConnection {
        type Session = NoopSession;

        async fn open_session(&mut self) -> Result<NoopSession, TransportError> {
            Ok(NoopSession)
        }

        async fn close(self) -> Result<(), TransportError> {
            Ok(())
        }
    }

    /// Refuses until attempt `accept_on` (never, if `None`)
    struct FlakyTransport {
        accept_on: Option<u32>,
        attempts: AtomicU32,
    }

    impl FlakyTransport {
        fn new(accept_on: Option<u32>) -> Self {
            Self {
                accept_on,
                attempts: AtomicU32::new(0),
            }
        }

        fn attempts(&self) -> u32 {
            self.attempts.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Transport for FlakyTransport {
        type Connection = NoopConnection;

        async fn dial(&self, params: &DialParams) -> Result<NoopConnection, TransportError> {
            assert_eq!(params.port, SSH_PORT);
            let n = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            match self.accept_on {
                Some(k) if n >= k => Ok(NoopConnection),
                _ => Err(TransportError::Dial(format!("refused on attempt {n}"))),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSleeper {
        sleeps: Mutex<Vec<Duration>>,
    }

    #[async_trait]
    impl Sleeper for RecordingSleeper {
        async fn sleep(&self, duration: Duration) {
            self.sleeps.lock().unwrap().push(duration);
        }
    }

    fn target(key_path: PathBuf) -> RemoteTarget {
        RemoteTarget::new(key_path, "ci", "10.0.0.5")
    }

    fn fixture_target() -> RemoteTarget {
        target(PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/id_ed25519"))
    }

    #[tokio::test]
    async fn test_never_accepting_host_exhausts_twenty_attempts() {
        let transport = FlakyTransport::new(None);
        let sleeper = RecordingSleeper::default();

        let err = connect_with_retry(&transport, &sleeper, &RetryPolicy::default(), &fixture_target())
            .await
            .err()
            .unwrap();

        assert_eq!(transport.attempts(), 20);
        let sleeps = sleeper.sleeps.lock().unwrap();
        assert_eq!(sleeps.len(), 19);
        assert!(sleeps.iter().all(|d| *d == Duration::from_secs(1)));

        match err {
            ExecError::ConnectionExhausted {
                host,
                attempts,
                last_error,
            } => {
                assert_eq!(host, "10.0.0.5");
                assert_eq!(attempts, 20);
                assert_eq!(last_error, TransportError::Dial("refused on attempt 20".to_string()));
            }
            other => panic!("expected ConnectionExhausted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_returns_on_first_success() {
        for k in [1, 7, 20] {
            let transport = FlakyTransport::new(Some(k));
            let sleeper = RecordingSleeper::default();

            let result =
                connect_with_retry(&transport, &sleeper, &RetryPolicy::default(), &fixture_target())
                    .await;

            assert!(result.is_ok(), "attempt {k} should connect");
            assert_eq!(transport.attempts(), k);
            assert_eq!(sleeper.sleeps.lock().unwrap().len() as u32, k - 1);
        }
    }

    #[tokio::test]
    async fn test_unreadable_key_makes_no_attempts() {
        let transport = FlakyTransport::new(Some(1));
        let sleeper = RecordingSleeper::default();

        let err = connect_with_retry(
            &transport,
            &sleeper,
            &RetryPolicy::default(),
            &target(PathBuf::from("/nonexistent/key")),
        )
        .await
        .err()
        .unwrap();

        assert!(matches!(err, ExecError::Credential { .. }));
        assert_eq!(transport.attempts(), 0);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_policy_count_is_reported() {
        let transport = FlakyTransport::new(None);
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy::new(3, Duration::from_millis(5)).unwrap();

        let err = connect_with_retry(&transport, &sleeper, &policy, &fixture_target())
            .await
            .err()
            .unwrap();

        assert_eq!(transport.attempts(), 3);
        assert!(err.to_string().contains("after 3 attempts"));
    }

    #[tokio::test]
    async fn test_zero_attempt_policy_never_dials() {
        let transport = FlakyTransport::new(Some(1));
        let sleeper = RecordingSleeper::default();
        let policy = RetryPolicy {
            max_attempts: 0,
            backoff: Duration::from_millis(1),
        };

        let err = connect_with_retry(&transport, &sleeper, &policy, &fixture_target())
            .await
            .err()
            .unwrap();

        assert!(matches!(err, ExecError::Config(_)), "got {err:?}");
        assert_eq!(transport.attempts(), 0);
        assert!(sleeper.sleeps.lock().unwrap().is_empty());
    }

    #[test]
    fn test_single_attempt_policy_accessors() {
        let policy = RetryPolicy::new(1, Duration::from_millis(5)).unwrap();
        assert_eq!(policy.max_attempts(), 1);
        assert_eq!(policy.backoff(), Duration::from_millis(5));
    }

    #[test]
    fn test_zero_attempts_rejected() {
        assert!(matches!(
            RetryPolicy::new(0, DEFAULT_BACKOFF),
            Err(ExecError::Config(_))
        ));
    }
}
