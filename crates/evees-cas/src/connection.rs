//! Connection readiness shared by network backends.
//!
//! A backend composes a [`Connection`] and routes every operation through
//! [`Connection::ensure_ready`]. The first caller runs the connect routine;
//! concurrent callers wait for it. A failed attempt leaves the connection
//! `Disconnected` so a later call tries again.

use std::future::Future;

use tokio::sync::{watch, OnceCell};
use tracing::{info, warn};

use crate::CasError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Ready,
}

#[derive(Debug)]
pub struct Connection {
    name: String,
    state: watch::Sender<ConnectionState>,
    ready: OnceCell<()>,
}

impl Connection {
    pub fn new(name: impl Into<String>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            name: name.into(),
            state,
            ready: OnceCell::new(),
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Observe state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn is_ready(&self) -> bool {
        self.ready.initialized()
    }

    /// Run `connect` unless the connection is already ready.
    pub async fn ensure_ready<F, Fut>(&self, connect: F) -> Result<(), CasError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(), CasError>>,
    {
        self.ready
            .get_or_try_init(|| async {
                self.state.send_replace(ConnectionState::Connecting);
                match connect().await {
                    Ok(()) => {
                        self.state.send_replace(ConnectionState::Ready);
                        info!(backend = %self.name, "Backend ready");
                        Ok(())
                    }
                    Err(e) => {
                        self.state.send_replace(ConnectionState::Disconnected);
                        warn!(backend = %self.name, error = %e, "Backend connection failed");
                        Err(e)
                    }
                }
            })
            .await
            .map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_connects_once_under_concurrency() {
        let connection = Arc::new(Connection::new("test"));
        let attempts = Arc::new(AtomicUsize::new(0));

        let calls = (0..8).map(|_| {
            let connection = connection.clone();
            let attempts = attempts.clone();
            async move {
                connection
                    .ensure_ready(|| async move {
                        attempts.fetch_add(1, Ordering::SeqCst);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                        Ok(())
                    })
                    .await
            }
        });
        for result in futures::future::join_all(calls).await {
            result.unwrap();
        }

        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(connection.state(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_subscribers_observe_transitions() {
        let connection = Connection::new("watched");
        let mut states = connection.subscribe();
        assert_eq!(*states.borrow(), ConnectionState::Disconnected);

        connection
            .ensure_ready(|| {
                let during = *states.borrow();
                async move {
                    assert_eq!(during, ConnectionState::Connecting);
                    Ok(())
                }
            })
            .await
            .unwrap();

        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), ConnectionState::Ready);
    }

    #[tokio::test]
    async fn test_failed_connect_is_retried() {
        let connection = Connection::new("flaky");
        let err = connection
            .ensure_ready(|| async { Err(CasError::InvalidArgument("down".into())) })
            .await;
        assert!(err.is_err());
        assert_eq!(connection.state(), ConnectionState::Disconnected);
        assert!(!connection.is_ready());

        connection.ensure_ready(|| async { Ok(()) }).await.unwrap();
        assert_eq!(connection.state(), ConnectionState::Ready);
        assert!(connection.is_ready());
    }
}
