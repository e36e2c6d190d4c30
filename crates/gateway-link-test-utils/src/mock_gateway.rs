// Scripted in-process gateway.
//
// Every call is recorded. By default `login` and `refresh` issue numbered
// tokens (`gw-access-1`, `gw-refresh-1`, ...) and `who_am_i` answers with the
// configured gateway user id. Individual calls can be queued with explicit
// responses or made to fail.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use gateway_link_core::{GatewayApi, GatewayApiError, GatewayTokenResponse, GatewayUser};

/// One recorded gateway call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GatewayCall {
    Login {
        provider: String,
        upstream_access_token: String,
    },
    WhoAmI {
        access_token: String,
    },
    Logout {
        access_token: String,
    },
    Refresh {
        refresh_token: String,
    },
}

type Scripted<T> = Mutex<VecDeque<Result<T, GatewayApiError>>>;

#[derive(Debug)]
pub struct MockGateway {
    user_id: Mutex<String>,
    expires_in: i64,
    refresh_token_expires_in: i64,
    issued: AtomicU32,
    latency: Option<Duration>,
    logins: Scripted<GatewayTokenResponse>,
    identities: Scripted<GatewayUser>,
    logouts: Scripted<()>,
    refreshes: Scripted<GatewayTokenResponse>,
    calls: Mutex<Vec<GatewayCall>>,
}

impl Default for MockGateway {
    fn default() -> Self {
        Self::new("g-1")
    }
}

impl MockGateway {
    /// A gateway that identifies every token as `user_id`.
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Mutex::new(user_id.into()),
            expires_in: 3600,
            refresh_token_expires_in: 86400,
            issued: AtomicU32::new(0),
            latency: None,
            logins: Mutex::default(),
            identities: Mutex::default(),
            logouts: Mutex::default(),
            refreshes: Mutex::default(),
            calls: Mutex::default(),
        }
    }

    /// Token lifetimes used for generated grants.
    pub fn with_lifetimes(mut self, expires_in: i64, refresh_token_expires_in: i64) -> Self {
        self.expires_in = expires_in;
        self.refresh_token_expires_in = refresh_token_expires_in;
        self
    }

    /// Sleep this long inside every call, to widen race windows.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn set_user_id(&self, user_id: impl Into<String>) {
        *lock(&self.user_id) = user_id.into();
    }

    // ─── Scripting ───────────────────────────────────────────────

    pub fn push_login(&self, result: Result<GatewayTokenResponse, GatewayApiError>) {
        lock(&self.logins).push_back(result);
    }

    pub fn push_who_am_i(&self, result: Result<GatewayUser, GatewayApiError>) {
        lock(&self.identities).push_back(result);
    }

    pub fn push_logout(&self, result: Result<(), GatewayApiError>) {
        lock(&self.logouts).push_back(result);
    }

    pub fn push_refresh(&self, result: Result<GatewayTokenResponse, GatewayApiError>) {
        lock(&self.refreshes).push_back(result);
    }

    /// A grant with explicit values.
    pub fn grant(
        access_token: &str,
        refresh_token: &str,
        expires_in: i64,
        refresh_token_expires_in: i64,
    ) -> GatewayTokenResponse {
        GatewayTokenResponse {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            expires_in,
            refresh_token_expires_in,
            user: None,
        }
    }

    // ─── Inspection ──────────────────────────────────────────────

    pub fn calls(&self) -> Vec<GatewayCall> {
        lock(&self.calls).clone()
    }

    pub fn login_calls(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::Login { .. }))
    }

    pub fn who_am_i_calls(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::WhoAmI { .. }))
    }

    pub fn logout_calls(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::Logout { .. }))
    }

    pub fn refresh_calls(&self) -> usize {
        self.count(|c| matches!(c, GatewayCall::Refresh { .. }))
    }

    fn count(&self, pred: impl Fn(&GatewayCall) -> bool) -> usize {
        lock(&self.calls).iter().filter(|c| pred(c)).count()
    }

    async fn record(&self, call: GatewayCall) {
        lock(&self.calls).push(call);
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn next_grant(&self) -> GatewayTokenResponse {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        Self::grant(
            &format!("gw-access-{n}"),
            &format!("gw-refresh-{n}"),
            self.expires_in,
            self.refresh_token_expires_in,
        )
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

fn pop<T>(queue: &Scripted<T>) -> Option<Result<T, GatewayApiError>> {
    lock(queue).pop_front()
}

#[async_trait]
impl GatewayApi for MockGateway {
    async fn login(
        &self,
        provider: &str,
        upstream_access_token: &str,
    ) -> Result<GatewayTokenResponse, GatewayApiError> {
        self.record(GatewayCall::Login {
            provider: provider.to_string(),
            upstream_access_token: upstream_access_token.to_string(),
        })
        .await;
        pop(&self.logins).unwrap_or_else(|| Ok(self.next_grant()))
    }

    async fn who_am_i(&self, access_token: &str) -> Result<GatewayUser, GatewayApiError> {
        self.record(GatewayCall::WhoAmI {
            access_token: access_token.to_string(),
        })
        .await;
        pop(&self.identities)
            .unwrap_or_else(|| Ok(GatewayUser::new(lock(&self.user_id).clone())))
    }

    async fn logout(&self, access_token: &str) -> Result<(), GatewayApiError> {
        self.record(GatewayCall::Logout {
            access_token: access_token.to_string(),
        })
        .await;
        pop(&self.logouts).unwrap_or(Ok(()))
    }

    async fn refresh(&self, refresh_token: &str) -> Result<GatewayTokenResponse, GatewayApiError> {
        self.record(GatewayCall::Refresh {
            refresh_token: refresh_token.to_string(),
        })
        .await;
        pop(&self.refreshes).unwrap_or_else(|| Ok(self.next_grant()))
    }
}
