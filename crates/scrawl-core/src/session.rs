//! Session wiring.
//!
//! A [`Session`] owns one token manager, API client, sync engine and
//! connectivity monitor, built from explicit stores. Front ends create one at
//! startup, call [`Session::start`], and call [`Session::logout`] to end it.

use std::sync::Arc;

use crate::api::{ApiClient, AuthApi, ReqwestTransport, Transport};
use crate::auth::{CookieJar, MemoryCookieJar, TokenManager};
use crate::config::ClientConfig;
use crate::connectivity::ConnectivityMonitor;
use crate::error::Result;
use crate::store::{DraftStore, KeyValueStore, MemoryStore};
use crate::sync::NoteSyncEngine;

/// Persistence backends for a session.
#[derive(Clone)]
pub struct SessionStores {
    pub cookies: Arc<dyn CookieJar>,
    /// Durable store for the token pair.
    pub tokens: Arc<dyn KeyValueStore>,
    /// Durable store for the local draft.
    pub drafts: Arc<dyn KeyValueStore>,
}

impl SessionStores {
    /// Process-local stores; nothing survives a restart.
    pub fn in_memory() -> Self {
        Self {
            cookies: Arc::new(MemoryCookieJar::new()),
            tokens: Arc::new(MemoryStore::new()),
            drafts: Arc::new(MemoryStore::new()),
        }
    }
}

/// What [`Session::start`] found in the stores.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStart {
    pub authenticated: bool,
    pub restored_draft: bool,
}

#[derive(Clone)]
pub struct Session {
    config: ClientConfig,
    tokens: TokenManager,
    api: ApiClient,
    engine: NoteSyncEngine,
    connectivity: ConnectivityMonitor,
}

impl Session {
    pub fn new(
        config: ClientConfig,
        transport: Arc<dyn Transport>,
        stores: SessionStores,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let tokens = TokenManager::new(
            AuthApi::new(transport.clone()),
            stores.cookies,
            stores.tokens,
            &config,
        );
        let api = ApiClient::new(transport, tokens.clone());
        let engine = NoteSyncEngine::new(
            api.clone(),
            DraftStore::new(stores.drafts),
            connectivity.clone(),
            &config,
        );
        Self {
            config,
            tokens,
            api,
            engine,
            connectivity,
        }
    }

    /// Session over HTTP, starting online.
    pub fn connect(config: ClientConfig, stores: SessionStores) -> Result<Self> {
        let transport = Arc::new(ReqwestTransport::new(&config)?);
        Ok(Self::new(
            config,
            transport,
            stores,
            ConnectivityMonitor::default(),
        ))
    }

    pub const fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub const fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub const fn api(&self) -> &ApiClient {
        &self.api
    }

    pub const fn engine(&self) -> &NoteSyncEngine {
        &self.engine
    }

    pub const fn connectivity(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Restore the stored token pair and local draft.
    pub async fn start(&self) -> Result<SessionStart> {
        let authenticated = self.tokens.restore()?.is_some();
        let restored_draft = self.engine.restore_local_draft().await?;
        Ok(SessionStart {
            authenticated,
            restored_draft,
        })
    }

    /// End the session: cancel pending edits' timer, then clear every copy
    /// of the credential. Pending refreshes resolve with `SessionExpired`.
    pub fn logout(&self) -> Result<()> {
        if self.engine.cancel_pending() {
            tracing::debug!("Cancelled pending flush on logout");
        }
        self.tokens.teardown()?;
        tracing::info!("Logged out");
        Ok(())
    }
}
