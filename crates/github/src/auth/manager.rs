use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::Duration;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{AuthError, Clock, Credential, CredentialExchange, SystemClock};

type PendingRefresh = Shared<BoxFuture<'static, Result<Credential, AuthError>>>;

enum TokenState {
    Unset,
    Valid(Credential),
    /// An exchange is in flight; every caller that needs a fresh token awaits
    /// `pending`. `previous` is still served while it has not expired.
    Refreshing {
        previous: Option<Credential>,
        pending: PendingRefresh,
    },
}

impl TokenState {
    fn usable(&self, now: chrono::DateTime<chrono::Utc>) -> Option<&Credential> {
        let current = match self {
            TokenState::Valid(credential) => Some(credential),
            TokenState::Refreshing {
                previous: Some(credential),
                ..
            } => Some(credential),
            _ => None,
        };
        current.filter(|credential| credential.is_valid_at(now))
    }

    fn take_credential(&mut self) -> Option<Credential> {
        match std::mem::replace(self, TokenState::Unset) {
            TokenState::Unset => None,
            TokenState::Valid(credential) => Some(credential),
            TokenState::Refreshing { previous, .. } => previous,
        }
    }
}

struct Inner {
    exchange: Arc<dyn CredentialExchange>,
    clock: Arc<dyn Clock>,
    state: Mutex<TokenState>,
}

impl Inner {
    fn finish_refresh(&self, result: &Result<Credential, AuthError>) {
        let mut state = self.state.lock();
        let previous = state.take_credential();
        *state = match result {
            Ok(credential) => TokenState::Valid(credential.clone()),
            Err(_) => previous.map_or(TokenState::Unset, TokenState::Valid),
        };
    }
}

/// Process-wide owner of the installation credential.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<Inner>,
}

impl TokenManager {
    pub fn new(exchange: Arc<dyn CredentialExchange>) -> Self {
        Self::with_clock(exchange, Arc::new(SystemClock))
    }

    pub fn with_clock(exchange: Arc<dyn CredentialExchange>, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Arc::new(Inner {
                exchange,
                clock,
                state: Mutex::new(TokenState::Unset),
            }),
        }
    }

    /// Returns a token that is valid right now, exchanging for a new one when
    /// needed. Concurrent callers share a single in-flight exchange.
    pub async fn token(&self) -> Result<String, AuthError> {
        let pending = {
            let mut state = self.inner.state.lock();
            if let Some(credential) = state.usable(self.inner.clock.now()) {
                return Ok(credential.token.clone());
            }
            if let TokenState::Refreshing { pending, .. } = &*state {
                pending.clone()
            } else {
                self.begin_refresh(&mut state)
            }
        };

        pending.await.map(|credential| credential.token)
    }

    /// Refreshes when the credential is missing or expires within `margin`.
    /// Returns whether an exchange was awaited.
    pub async fn refresh_if_expiring(&self, margin: Duration) -> Result<bool, AuthError> {
        let pending = {
            let mut state = self.inner.state.lock();
            let now = self.inner.clock.now();
            match &*state {
                TokenState::Valid(credential) if !credential.expires_within(now, margin) => {
                    return Ok(false);
                }
                TokenState::Refreshing { pending, .. } => pending.clone(),
                _ => self.begin_refresh(&mut state),
            }
        };

        pending.await.map(|_| true)
    }

    /// Wakes every `interval` and refreshes ahead of expiry until `cancel` fires.
    pub fn spawn_proactive_refresh(
        &self,
        interval: StdDuration,
        margin: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let manager = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Proactive credential refresh stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        match manager.refresh_if_expiring(margin).await {
                            Ok(true) => info!("Credential refreshed ahead of expiry"),
                            Ok(false) => {}
                            Err(e) => warn!(error = %e, "Proactive credential refresh failed"),
                        }
                    }
                }
            }
        })
    }

    /// Must be called with the state lock held.
    fn begin_refresh(&self, state: &mut TokenState) -> PendingRefresh {
        let previous = state.take_credential();
        let inner = Arc::clone(&self.inner);

        // The exchange runs on its own task so that a caller giving up does
        // not abandon the refresh for everyone else.
        let handle = tokio::spawn(async move {
            debug!("Exchanging for a new credential");
            let result = inner.exchange.exchange().await;
            if let Err(e) = &result {
                warn!(error = %e, "Credential exchange failed");
            }
            inner.finish_refresh(&result);
            result
        });

        let pending = async move {
            handle
                .await
                .unwrap_or_else(|e| Err(AuthError::Aborted(e.to_string())))
        }
        .boxed()
        .shared();

        *state = TokenState::Refreshing {
            previous,
            pending: pending.clone(),
        };
        pending
    }
}
