//! Token lifecycle management.
//!
//! [`TokenManager`] owns the live [`Credential`]. It persists the pair in two
//! places (a short-lived cookie and the durable store), attaches the access
//! token to outgoing requests, and refreshes it with at most one refresh
//! request in flight at a time.

pub mod cookie;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, TimeDelta, Utc};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::api::{ApiRequest, AuthApi, RefreshGrant};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::models::Credential;
use crate::store::{keys, KeyValueStore};
use crate::util::{lifetime, system_clock, Clock};

pub use cookie::{CookieJar, CookieOptions, MemoryCookieJar, SameSite};

/// Name of the cookie carrying the access token.
pub const ACCESS_COOKIE: &str = "accessToken";

const CREDENTIAL_KEYS: [&str; 4] = [
    keys::ACCESS_TOKEN,
    keys::REFRESH_TOKEN,
    keys::ACCESS_EXPIRY,
    keys::REFRESH_EXPIRY,
];

/// A request ready to send, and whether a refresh ran to produce its token.
#[derive(Debug, Clone)]
pub struct Authorized {
    pub request: ApiRequest,
    pub refreshed: bool,
}

type RefreshOutcome = Option<Result<String>>;

struct InFlightRefresh {
    outcome: watch::Sender<RefreshOutcome>,
    task: JoinHandle<()>,
}

impl InFlightRefresh {
    /// Resolve every waiter with `SessionExpired` and stop the request.
    fn cancel(self) {
        self.outcome.send_replace(Some(Err(Error::SessionExpired)));
        self.task.abort();
    }
}

#[derive(Default)]
struct SessionState {
    credential: Option<Credential>,
    refresh: Option<InFlightRefresh>,
    /// Bumped whenever the credential is replaced or cleared outside a
    /// refresh, so a stale refresh result is never installed.
    epoch: u64,
}

struct TokenInner {
    api: AuthApi,
    cookies: Arc<dyn CookieJar>,
    store: Arc<dyn KeyValueStore>,
    access_ttl: TimeDelta,
    refresh_ttl: TimeDelta,
    skew: TimeDelta,
    clock: Clock,
    state: Mutex<SessionState>,
}

/// Owner of the session credential. Clones share one session.
#[derive(Clone)]
pub struct TokenManager {
    inner: Arc<TokenInner>,
}

impl TokenManager {
    pub fn new(
        api: AuthApi,
        cookies: Arc<dyn CookieJar>,
        store: Arc<dyn KeyValueStore>,
        config: &ClientConfig,
    ) -> Self {
        Self::with_clock(api, cookies, store, config, system_clock())
    }

    pub fn with_clock(
        api: AuthApi,
        cookies: Arc<dyn CookieJar>,
        store: Arc<dyn KeyValueStore>,
        config: &ClientConfig,
        clock: Clock,
    ) -> Self {
        Self {
            inner: Arc::new(TokenInner {
                api,
                cookies,
                store,
                access_ttl: lifetime(config.access_token_ttl_secs),
                refresh_ttl: lifetime(config.refresh_token_ttl_secs),
                skew: lifetime(config.expiry_skew_secs),
                clock,
                state: Mutex::new(SessionState::default()),
            }),
        }
    }

    /// Sign in with email and password and establish the returned pair.
    pub async fn sign_in(&self, email: &str, password: &str) -> Result<Credential> {
        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(Error::Validation(
                "Email and password are required".to_string(),
            ));
        }

        let pair = self.inner.api.sign_in(email, password).await?;
        let credential = self.establish(&pair.access_token, &pair.refresh_token)?;
        tracing::info!("Signed in as {}", email);
        Ok(credential)
    }

    /// Register an account. Does not sign in.
    pub async fn sign_up(&self, username: &str, email: &str, password: &str) -> Result<String> {
        let (username, email) = (username.trim(), email.trim());
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(Error::Validation(
                "Username, email and password are required".to_string(),
            ));
        }
        self.inner.api.sign_up(username, email, password).await
    }

    /// Install a freshly issued token pair.
    ///
    /// The cookie is written first, then the durable store. If the store
    /// write fails the cookie is removed again and the call fails with
    /// [`Error::Persistence`]; the in-memory session is left untouched.
    pub fn establish(&self, access_token: &str, refresh_token: &str) -> Result<Credential> {
        let now = self.now();
        let credential = Credential {
            access_token: access_token.to_string(),
            refresh_token: refresh_token.to_string(),
            access_expires_at: now + self.inner.access_ttl,
            refresh_expires_at: now + self.inner.refresh_ttl,
        };

        let mut state = self.lock();
        self.persist(&credential, self.inner.access_ttl, state.credential.as_ref())?;
        state.epoch += 1;
        if let Some(refresh) = state.refresh.take() {
            refresh.cancel();
        }
        state.credential = Some(credential.clone());
        Ok(credential)
    }

    /// Rebuild the session from the durable store at startup.
    ///
    /// Missing keys mean there is no session. A pair whose refresh lifetime
    /// has passed is cleared. An expired access token is kept and refreshed
    /// on first use.
    pub fn restore(&self) -> Result<Option<Credential>> {
        let store = &self.inner.store;
        let (Some(access_token), Some(refresh_token)) = (
            store.get(keys::ACCESS_TOKEN)?,
            store.get(keys::REFRESH_TOKEN)?,
        ) else {
            return Ok(None);
        };

        let now = self.now();
        let credential = Credential {
            access_token,
            refresh_token,
            access_expires_at: read_instant(store.as_ref(), keys::ACCESS_EXPIRY)?.unwrap_or(now),
            refresh_expires_at: read_instant(store.as_ref(), keys::REFRESH_EXPIRY)?
                .unwrap_or(now + self.inner.refresh_ttl),
        };

        let mut state = self.lock();
        if credential.refresh_expired(now) {
            tracing::info!("Stored session has expired");
            state.epoch += 1;
            state.credential = None;
            if let Some(refresh) = state.refresh.take() {
                refresh.cancel();
            }
            self.clear_persisted()?;
            return Ok(None);
        }

        if !credential.access_expired(now, TimeDelta::zero()) {
            let remaining = credential.access_expires_at - now;
            self.inner.cookies.set(
                ACCESS_COOKIE,
                &credential.access_token,
                &CookieOptions::credential(remaining),
            )?;
        }
        state.epoch += 1;
        if let Some(refresh) = state.refresh.take() {
            refresh.cancel();
        }
        state.credential = Some(credential.clone());
        tracing::debug!("Restored stored session");
        Ok(Some(credential))
    }

    pub fn current(&self) -> Option<Credential> {
        self.lock().credential.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock().credential.is_some()
    }

    /// Set the current access token as the request's bearer credential. With
    /// no session the request is returned unauthenticated.
    pub fn attach(&self, request: ApiRequest) -> ApiRequest {
        match self.lock().credential.as_ref() {
            Some(credential) => request.with_bearer(credential.access_token.clone()),
            None => request,
        }
    }

    /// Like [`attach`](Self::attach), but refreshes first when the access
    /// token is past its expiry.
    pub async fn authorize(&self, request: ApiRequest) -> Result<Authorized> {
        let expired = self
            .lock()
            .credential
            .as_ref()
            .is_some_and(|credential| credential.access_expired(self.now(), self.inner.skew));

        if expired {
            tracing::debug!("Access token expired, refreshing before request");
            let token = self.refresh().await?;
            return Ok(Authorized {
                request: request.with_bearer(token),
                refreshed: true,
            });
        }
        Ok(Authorized {
            request: self.attach(request),
            refreshed: false,
        })
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Concurrent callers share one refresh request and its result. On
    /// failure the session is cleared and every caller gets
    /// [`Error::SessionExpired`].
    pub async fn refresh(&self) -> Result<String> {
        self.refresh_unless_replaced(None).await
    }

    /// Refresh after the server rejected `rejected`. When the credential has
    /// already moved past that token, the current one is returned without
    /// another refresh request.
    pub(crate) async fn refresh_rejected(&self, rejected: &str) -> Result<String> {
        self.refresh_unless_replaced(Some(rejected)).await
    }

    /// Clear the cookie, the durable store and the in-memory credential.
    /// Pending refresh waiters resolve with [`Error::SessionExpired`].
    pub fn teardown(&self) -> Result<()> {
        let mut state = self.lock();
        state.epoch += 1;
        let had_session = state.credential.take().is_some();
        if let Some(refresh) = state.refresh.take() {
            refresh.cancel();
        }
        let cleared = self.clear_persisted();
        drop(state);

        if had_session {
            tracing::info!("Session cleared");
        }
        cleared
    }

    async fn refresh_unless_replaced(&self, rejected: Option<&str>) -> Result<String> {
        let mut outcome = {
            let mut state = self.lock();
            if let Some(refresh) = state.refresh.as_ref() {
                refresh.outcome.subscribe()
            } else {
                let Some(credential) = state.credential.as_ref() else {
                    return Err(Error::SessionExpired);
                };
                if rejected.is_some_and(|token| token != credential.access_token) {
                    return Ok(credential.access_token.clone());
                }

                let refresh_token = credential.refresh_token.clone();
                let (sender, receiver) = watch::channel(None);
                let epoch = state.epoch;
                let manager = self.clone();
                let task = tokio::spawn(async move {
                    let result = manager.inner.api.refresh(&refresh_token).await;
                    manager.complete_refresh(epoch, result);
                });
                state.refresh = Some(InFlightRefresh {
                    outcome: sender,
                    task,
                });
                receiver
            }
        };

        let result = match outcome.wait_for(Option::is_some).await {
            Ok(result) => result.clone().unwrap_or(Err(Error::SessionExpired)),
            Err(_) => Err(Error::SessionExpired),
        };
        result
    }

    fn complete_refresh(&self, epoch: u64, result: Result<RefreshGrant>) {
        let mut state = self.lock();
        if state.epoch != epoch {
            return;
        }
        let Some(refresh) = state.refresh.take() else {
            return;
        };

        let previous = state.credential.clone();
        let outcome = match (result, previous) {
            (Ok(grant), Some(previous)) => {
                let now = self.now();
                let access_lifetime = grant.expires_in.map_or(self.inner.access_ttl, lifetime);
                let rotated = grant.refresh_token.is_some();
                let credential = Credential {
                    access_token: grant.access_token,
                    refresh_token: grant
                        .refresh_token
                        .unwrap_or_else(|| previous.refresh_token.clone()),
                    access_expires_at: now + access_lifetime,
                    refresh_expires_at: if rotated {
                        now + self.inner.refresh_ttl
                    } else {
                        previous.refresh_expires_at
                    },
                };
                let token = credential.access_token.clone();
                let persisted = self.persist(&credential, access_lifetime, Some(&previous));
                state.credential = Some(credential);
                match persisted {
                    Ok(()) => {
                        tracing::debug!("Access token refreshed");
                        Ok(token)
                    }
                    Err(error) => {
                        tracing::error!("Refreshed token could not be persisted: {}", error);
                        Err(error)
                    }
                }
            }
            (Ok(_), None) => Err(Error::SessionExpired),
            (Err(error), _) => {
                tracing::warn!("Token refresh failed: {}", error);
                state.credential = None;
                if let Err(error) = self.clear_persisted() {
                    tracing::error!("Failed to clear expired session: {}", error);
                }
                Err(Error::SessionExpired)
            }
        };
        drop(state);
        refresh.outcome.send_replace(Some(outcome));
    }

    /// Write cookie then durable store. If the store fails the cookie is
    /// removed and the store goes back to `previous`, or is cleared when
    /// there was no previous pair.
    fn persist(
        &self,
        credential: &Credential,
        cookie_max_age: TimeDelta,
        previous: Option<&Credential>,
    ) -> Result<()> {
        self.inner.cookies.set(
            ACCESS_COOKIE,
            &credential.access_token,
            &CookieOptions::credential(cookie_max_age),
        )?;

        if let Err(error) = self.write_store(credential) {
            tracing::error!("Failed to persist session: {}", error);
            if let Err(rollback) = self.inner.cookies.remove(ACCESS_COOKIE) {
                tracing::error!("Failed to roll back session cookie: {}", rollback);
            }
            match previous {
                Some(previous) => {
                    for (key, value) in store_entries(previous) {
                        if let Err(cleanup) = self.inner.store.set(key, &value) {
                            tracing::warn!("Failed to restore session key {}: {}", key, cleanup);
                        }
                    }
                }
                None => {
                    for key in CREDENTIAL_KEYS {
                        if let Err(cleanup) = self.inner.store.remove(key) {
                            tracing::warn!(
                                "Failed to remove partial session key {}: {}",
                                key,
                                cleanup
                            );
                        }
                    }
                }
            }
            return Err(error);
        }
        Ok(())
    }

    fn write_store(&self, credential: &Credential) -> Result<()> {
        for (key, value) in store_entries(credential) {
            self.inner.store.set(key, &value)?;
        }
        Ok(())
    }

    /// Remove the cookie and every credential key, reporting the first
    /// failure after attempting all of them.
    fn clear_persisted(&self) -> Result<()> {
        let mut first_error = self.inner.cookies.remove(ACCESS_COOKIE).err();
        for key in CREDENTIAL_KEYS {
            if let Err(error) = self.inner.store.remove(key) {
                first_error.get_or_insert(error);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn now(&self) -> DateTime<Utc> {
        (self.inner.clock)()
    }
}

fn store_entries(credential: &Credential) -> [(&'static str, String); 4] {
    [
        (keys::ACCESS_TOKEN, credential.access_token.clone()),
        (keys::REFRESH_TOKEN, credential.refresh_token.clone()),
        (keys::ACCESS_EXPIRY, credential.access_expires_at.to_rfc3339()),
        (keys::REFRESH_EXPIRY, credential.refresh_expires_at.to_rfc3339()),
    ]
}

fn read_instant(store: &dyn KeyValueStore, key: &str) -> Result<Option<DateTime<Utc>>> {
    Ok(store
        .get(key)?
        .and_then(|raw| match DateTime::parse_from_rfc3339(&raw) {
            Ok(parsed) => Some(parsed.with_timezone(&Utc)),
            Err(error) => {
                tracing::warn!("Ignoring unreadable {}: {}", key, error);
                None
            }
        }))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::api::{ApiResponse, Method, Transport};
    use crate::store::MemoryStore;
    use crate::testing::{manual_clock, respond, FakeTransport, FlakyStore};

    struct Harness {
        tokens: TokenManager,
        transport: Arc<FakeTransport>,
        cookies: Arc<MemoryCookieJar>,
    }

    fn harness(
        transport: FakeTransport,
        store: Arc<dyn KeyValueStore>,
        clock: Clock,
    ) -> Harness {
        let transport = Arc::new(transport);
        let cookies = Arc::new(MemoryCookieJar::with_clock(clock.clone()));
        let api = AuthApi::new(transport.clone() as Arc<dyn Transport>);
        let tokens = TokenManager::with_clock(
            api,
            cookies.clone(),
            store,
            &ClientConfig::default(),
            clock,
        );
        Harness {
            tokens,
            transport,
            cookies,
        }
    }

    fn refresh_ok() -> FakeTransport {
        FakeTransport::new(|request| match request.path.as_str() {
            "/auth/refresh" => respond(200, &json!({"accessToken": "access-2"})),
            _ => respond(404, &json!({"message": "no route"})),
        })
    }

    #[test]
    fn establish_writes_cookie_and_store() {
        let (clock, _) = manual_clock();
        let store = Arc::new(MemoryStore::new());
        let h = harness(refresh_ok(), store.clone(), clock);

        let credential = h.tokens.establish("access-1", "refresh-1").unwrap();

        assert_eq!(
            h.cookies.get(ACCESS_COOKIE).unwrap().as_deref(),
            Some("access-1")
        );
        let options = h.cookies.options(ACCESS_COOKIE).unwrap().unwrap();
        assert_eq!(options.max_age, TimeDelta::seconds(900));
        assert_eq!(
            store.get(keys::REFRESH_TOKEN).unwrap().as_deref(),
            Some("refresh-1")
        );
        assert_eq!(
            credential.refresh_expires_at - credential.access_expires_at,
            TimeDelta::seconds(604_800 - 900)
        );
        assert_eq!(h.tokens.current(), Some(credential));
    }

    #[test]
    fn establish_rolls_back_cookie_when_store_fails() {
        let (clock, _) = manual_clock();
        let h = harness(refresh_ok(), Arc::new(FlakyStore::failing()), clock);

        let error = h.tokens.establish("access-1", "refresh-1").unwrap_err();

        assert!(matches!(error, Error::Persistence(_)));
        assert_eq!(h.cookies.get(ACCESS_COOKIE).unwrap(), None);
        assert!(!h.tokens.is_authenticated());
    }

    #[test]
    fn attach_without_session_sends_unauthenticated() {
        let (clock, _) = manual_clock();
        let h = harness(refresh_ok(), Arc::new(MemoryStore::new()), clock);

        assert_eq!(h.tokens.attach(ApiRequest::get("/notes")).bearer, None);
        h.tokens.establish("access-1", "refresh-1").unwrap();
        assert_eq!(
            h.tokens.attach(ApiRequest::get("/notes")).bearer.as_deref(),
            Some("access-1")
        );
    }

    #[tokio::test]
    async fn authorize_refreshes_expired_access_token() {
        let (clock, offset) = manual_clock();
        let h = harness(refresh_ok(), Arc::new(MemoryStore::new()), clock);
        h.tokens.establish("access-1", "refresh-1").unwrap();

        let fresh = h.tokens.authorize(ApiRequest::get("/notes")).await.unwrap();
        assert!(!fresh.refreshed);
        assert_eq!(h.transport.count(Method::Post, "/auth/refresh"), 0);

        offset.store(901, Ordering::SeqCst);
        let authorized = h.tokens.authorize(ApiRequest::get("/notes")).await.unwrap();
        assert!(authorized.refreshed);
        assert_eq!(authorized.request.bearer.as_deref(), Some("access-2"));
        assert_eq!(h.transport.count(Method::Post, "/auth/refresh"), 1);

        let current = h.tokens.current().unwrap();
        assert_eq!(current.refresh_token, "refresh-1");
        assert_eq!(
            h.cookies.get(ACCESS_COOKIE).unwrap().as_deref(),
            Some("access-2")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_refreshes_share_one_request() {
        let (clock, _) = manual_clock();
        let transport = refresh_ok().with_latency(Duration::from_millis(200));
        let h = harness(transport, Arc::new(MemoryStore::new()), clock);
        h.tokens.establish("access-1", "refresh-1").unwrap();

        let (first, second) = tokio::join!(h.tokens.refresh(), h.tokens.refresh());

        assert_eq!(first.unwrap(), "access-2");
        assert_eq!(second.unwrap(), "access-2");
        assert_eq!(h.transport.count(Method::Post, "/auth/refresh"), 1);
    }

    #[tokio::test]
    async fn rejected_token_already_replaced_is_not_refreshed_again() {
        let (clock, _) = manual_clock();
        let h = harness(refresh_ok(), Arc::new(MemoryStore::new()), clock);
        h.tokens.establish("access-1", "refresh-1").unwrap();

        h.tokens.refresh().await.unwrap();
        let token = h.tokens.refresh_rejected("access-1").await.unwrap();

        assert_eq!(token, "access-2");
        assert_eq!(h.transport.count(Method::Post, "/auth/refresh"), 1);
    }

    #[tokio::test]
    async fn refresh_adopts_rotated_refresh_token() {
        let (clock, _) = manual_clock();
        let transport = FakeTransport::new(|_| {
            respond(
                200,
                &json!({"data": {"accessToken": "access-2", "refreshToken": "refresh-2", "expiresIn": 60}}),
            )
        });
        let store = Arc::new(MemoryStore::new());
        let h = harness(transport, store.clone(), clock);
        let established = h.tokens.establish("access-1", "refresh-1").unwrap();

        h.tokens.refresh().await.unwrap();

        let current = h.tokens.current().unwrap();
        assert_eq!(current.refresh_token, "refresh-2");
        assert_eq!(
            current.access_expires_at,
            established.access_expires_at - TimeDelta::seconds(840)
        );
        assert_eq!(
            store.get(keys::REFRESH_TOKEN).unwrap().as_deref(),
            Some("refresh-2")
        );
    }

    #[tokio::test]
    async fn failed_refresh_clears_session() {
        let (clock, _) = manual_clock();
        let transport = FakeTransport::new(|_| {
            respond(401, &json!({"error": "Unauthorized", "message": "invalid refresh token"}))
        });
        let store = Arc::new(MemoryStore::new());
        let h = harness(transport, store.clone(), clock);
        h.tokens.establish("access-1", "refresh-1").unwrap();

        assert_eq!(h.tokens.refresh().await, Err(Error::SessionExpired));
        assert!(!h.tokens.is_authenticated());
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
        assert_eq!(h.cookies.get(ACCESS_COOKIE).unwrap(), None);

        assert_eq!(h.tokens.refresh().await, Err(Error::SessionExpired));
        assert_eq!(h.transport.count(Method::Post, "/auth/refresh"), 1);
    }

    #[tokio::test]
    async fn malformed_refresh_response_expires_session() {
        let (clock, _) = manual_clock();
        let transport = FakeTransport::new(|_| Ok(ApiResponse::new(200, "<html>")));
        let h = harness(transport, Arc::new(MemoryStore::new()), clock);
        h.tokens.establish("access-1", "refresh-1").unwrap();

        assert_eq!(h.tokens.refresh().await, Err(Error::SessionExpired));
        assert!(!h.tokens.is_authenticated());
    }

    #[tokio::test(start_paused = true)]
    async fn teardown_resolves_pending_refresh_waiters() {
        let (clock, _) = manual_clock();
        let transport = refresh_ok().with_latency(Duration::from_secs(5));
        let store = Arc::new(MemoryStore::new());
        let h = harness(transport, store.clone(), clock);
        h.tokens.establish("access-1", "refresh-1").unwrap();

        let tokens = h.tokens.clone();
        let waiter = tokio::spawn(async move { tokens.refresh().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        h.tokens.teardown().unwrap();
        assert_eq!(waiter.await.unwrap(), Err(Error::SessionExpired));

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert!(!h.tokens.is_authenticated());
        assert_eq!(store.get(keys::ACCESS_TOKEN).unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn restore_during_refresh_resolves_waiters() {
        let (clock, _) = manual_clock();
        let transport = refresh_ok().with_latency(Duration::from_millis(200));
        let h = harness(transport, Arc::new(MemoryStore::new()), clock);
        h.tokens.establish("access-1", "refresh-1").unwrap();

        let tokens = h.tokens.clone();
        let waiter = tokio::spawn(async move { tokens.refresh().await });
        tokio::time::sleep(Duration::from_millis(10)).await;

        let restored = h.tokens.restore().unwrap().unwrap();
        assert_eq!(restored.access_token, "access-1");
        assert_eq!(waiter.await.unwrap(), Err(Error::SessionExpired));

        assert_eq!(h.tokens.refresh().await.unwrap(), "access-2");
        assert_eq!(h.transport.count(Method::Post, "/auth/refresh"), 2);
        assert_eq!(h.tokens.current().unwrap().access_token, "access-2");
    }

    #[tokio::test]
    async fn refresh_store_failure_keeps_previous_pair_on_disk() {
        let (clock, _) = manual_clock();
        let store = Arc::new(FlakyStore::default());
        let h = harness(refresh_ok(), store.clone(), clock);
        h.tokens.establish("access-1", "refresh-1").unwrap();
        store.fail_on(keys::REFRESH_EXPIRY);

        let error = h.tokens.refresh().await.unwrap_err();

        assert!(matches!(error, Error::Persistence(_)));
        assert_eq!(h.tokens.current().unwrap().access_token, "access-2");
        assert_eq!(
            store.get(keys::ACCESS_TOKEN).unwrap().as_deref(),
            Some("access-1")
        );
        assert_eq!(
            store.get(keys::REFRESH_TOKEN).unwrap().as_deref(),
            Some("refresh-1")
        );
        assert!(store.get(keys::REFRESH_EXPIRY).unwrap().is_some());
    }

    #[test]
    fn teardown_is_idempotent() {
        let (clock, _) = manual_clock();
        let store = Arc::new(MemoryStore::new());
        let h = harness(refresh_ok(), store.clone(), clock);
        h.tokens.establish("access-1", "refresh-1").unwrap();

        h.tokens.teardown().unwrap();
        h.tokens.teardown().unwrap();

        assert_eq!(h.tokens.current(), None);
        assert_eq!(h.cookies.get(ACCESS_COOKIE).unwrap(), None);
        for key in CREDENTIAL_KEYS {
            assert_eq!(store.get(key).unwrap(), None);
        }
    }

    #[test]
    fn restore_reads_durable_store() {
        let (clock, offset) = manual_clock();
        let store = Arc::new(MemoryStore::new());
        let first = harness(refresh_ok(), store.clone(), clock.clone());
        let established = first.tokens.establish("access-1", "refresh-1").unwrap();

        offset.store(3600, Ordering::SeqCst);
        let second = harness(refresh_ok(), store, clock);
        let restored = second.tokens.restore().unwrap().unwrap();

        assert_eq!(restored.access_token, "access-1");
        assert_eq!(
            restored.refresh_expires_at.timestamp(),
            established.refresh_expires_at.timestamp()
        );
        assert!(second.tokens.is_authenticated());
        assert_eq!(second.cookies.get(ACCESS_COOKIE).unwrap(), None);
    }

    #[test]
    fn restore_discards_pair_past_refresh_lifetime() {
        let (clock, offset) = manual_clock();
        let store = Arc::new(MemoryStore::new());
        let first = harness(refresh_ok(), store.clone(), clock.clone());
        first.tokens.establish("access-1", "refresh-1").unwrap();

        offset.store(604_800, Ordering::SeqCst);
        let second = harness(refresh_ok(), store.clone(), clock);

        assert_eq!(second.tokens.restore().unwrap(), None);
        assert_eq!(store.get(keys::REFRESH_TOKEN).unwrap(), None);
    }

    #[test]
    fn restore_with_missing_keys_has_no_session() {
        let (clock, _) = manual_clock();
        let store = Arc::new(MemoryStore::new());
        store.set(keys::ACCESS_TOKEN, "access-1").unwrap();
        let h = harness(refresh_ok(), store, clock);

        assert_eq!(h.tokens.restore().unwrap(), None);
        assert!(!h.tokens.is_authenticated());
    }

    #[tokio::test]
    async fn sign_in_validates_before_network() {
        let (clock, _) = manual_clock();
        let h = harness(refresh_ok(), Arc::new(MemoryStore::new()), clock);

        let error = h.tokens.sign_in("  ", "secret").await.unwrap_err();

        assert!(matches!(error, Error::Validation(_)));
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn sign_in_establishes_returned_pair() {
        let (clock, _) = manual_clock();
        let transport = FakeTransport::new(|request| {
            assert_eq!(request.bearer, None);
            respond(200, &json!({"accessToken": "access-1", "refreshToken": "refresh-1"}))
        });
        let h = harness(transport, Arc::new(MemoryStore::new()), clock);

        let credential = h.tokens.sign_in("ada@example.com", "secret").await.unwrap();

        assert_eq!(credential.access_token, "access-1");
        assert!(h.tokens.is_authenticated());
        let request = &h.transport.requests()[0];
        assert_eq!(request.path, "/auth/signin");
        assert_eq!(
            request.body,
            Some(json!({"email": "ada@example.com", "password": "secret"}))
        );
    }

    #[tokio::test]
    async fn sign_in_rejection_is_auth_error() {
        let (clock, _) = manual_clock();
        let transport = FakeTransport::new(|_| {
            respond(200, &json!({"error": true, "message": "Invalid credentials"}))
        });
        let h = harness(transport, Arc::new(MemoryStore::new()), clock);

        let error = h.tokens.sign_in("ada@example.com", "wrong").await.unwrap_err();

        assert_eq!(error, Error::Auth("Invalid credentials".to_string()));
        assert!(!h.tokens.is_authenticated());
    }
}
