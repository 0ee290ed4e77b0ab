//! Authenticated notes client.

use std::sync::Arc;

use serde_json::json;

use super::envelope::decode_data;
use super::transport::{ApiRequest, ApiResponse, Transport};
use crate::auth::TokenManager;
use crate::error::Result;
use crate::models::{Note, NoteId, NotePayload};

/// Note CRUD against the remote API.
///
/// Every request goes through the [`TokenManager`]: an access token past its
/// expiry is refreshed first, and a 401 triggers exactly one refresh and one
/// retry.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    tokens: TokenManager,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, tokens: TokenManager) -> Self {
        Self { transport, tokens }
    }

    pub const fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub async fn list_notes(&self) -> Result<Vec<Note>> {
        let response = self.send(ApiRequest::get("/notes")).await?;
        decode_data(response)
    }

    /// Search notes by text. A blank query lists every note.
    pub async fn search_notes(&self, query: &str) -> Result<Vec<Note>> {
        let query = query.trim();
        if query.is_empty() {
            return self.list_notes().await;
        }

        let path = format!("/notes/search?query={}", urlencoding::encode(query));
        let response = self.send(ApiRequest::get(path)).await?;
        decode_data(response)
    }

    pub async fn create_note(&self, payload: &NotePayload) -> Result<Note> {
        let request = ApiRequest::post("/notes", note_body(payload));
        let note: Note = decode_data(self.send(request).await?)?;
        tracing::info!("Created note {}", note.id);
        Ok(note)
    }

    pub async fn update_note(&self, id: &NoteId, payload: &NotePayload) -> Result<Note> {
        let request = ApiRequest::patch(format!("/notes/{id}"), note_body(payload));
        let note = decode_data(self.send(request).await?)?;
        tracing::info!("Updated note {}", id);
        Ok(note)
    }

    pub async fn delete_note(&self, id: &NoteId) -> Result<()> {
        let response = self.send(ApiRequest::delete(format!("/notes/{id}"))).await?;
        if !response.is_success() {
            return Err(response.into_error());
        }
        tracing::info!("Deleted note {}", id);
        Ok(())
    }

    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        let authorized = self.tokens.authorize(request.clone()).await?;
        let bearer = authorized.request.bearer.clone();
        let response = self.transport.send(authorized.request).await?;

        if !response.is_unauthorized() || authorized.refreshed {
            return Ok(response);
        }
        let Some(rejected) = bearer else {
            return Ok(response);
        };

        tracing::debug!("Access token rejected, refreshing once");
        let token = self.tokens.refresh_rejected(&rejected).await?;
        self.transport.send(request.with_bearer(token)).await
    }
}

fn note_body(payload: &NotePayload) -> serde_json::Value {
    json!({
        "title": payload.title,
        "body": payload.body,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::api::{AuthApi, Method};
    use crate::auth::MemoryCookieJar;
    use crate::config::ClientConfig;
    use crate::error::Error;
    use crate::store::MemoryStore;
    use crate::testing::{manual_clock, respond, FakeTransport, NotesBackend};
    use crate::util::Clock;

    fn client(transport: FakeTransport, clock: Clock) -> (ApiClient, Arc<FakeTransport>) {
        let transport = Arc::new(transport);
        let shared: Arc<dyn Transport> = transport.clone();
        let tokens = TokenManager::with_clock(
            AuthApi::new(shared.clone()),
            Arc::new(MemoryCookieJar::with_clock(clock.clone())),
            Arc::new(MemoryStore::new()),
            &ClientConfig::default(),
            clock,
        );
        (ApiClient::new(shared, tokens), transport)
    }

    /// Accepts only `access-2`; refresh hands it out.
    fn rotating_backend(backend: NotesBackend) -> FakeTransport {
        FakeTransport::new(move |request| match request.path.as_str() {
            "/auth/refresh" => respond(200, &json!({"accessToken": "access-2"})),
            _ if request.bearer.as_deref() != Some("access-2") => {
                respond(401, &json!({"error": "Unauthorized", "message": "jwt expired"}))
            }
            _ => backend.handle(request),
        })
    }

    #[tokio::test]
    async fn requests_carry_bearer_token() {
        let (clock, _) = manual_clock();
        let backend = NotesBackend::default();
        let handler = backend.clone();
        let (client, transport) = client(FakeTransport::new(move |r| handler.handle(r)), clock);
        client.tokens().establish("access-1", "refresh-1").unwrap();

        client.list_notes().await.unwrap();

        assert_eq!(transport.requests()[0].bearer.as_deref(), Some("access-1"));
    }

    #[tokio::test]
    async fn unauthorized_request_refreshes_once_and_retries() {
        let (clock, _) = manual_clock();
        let backend = NotesBackend::default();
        backend.seed("n1", "Groceries", "milk");
        let (client, transport) = client(rotating_backend(backend), clock);
        client.tokens().establish("access-1", "refresh-1").unwrap();

        let notes = client.list_notes().await.unwrap();

        assert_eq!(notes.len(), 1);
        let paths = transport
            .requests()
            .into_iter()
            .map(|request| (request.path, request.bearer))
            .collect::<Vec<_>>();
        assert_eq!(
            paths,
            vec![
                ("/notes".to_string(), Some("access-1".to_string())),
                ("/auth/refresh".to_string(), None),
                ("/notes".to_string(), Some("access-2".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn request_after_expiry_refreshes_first() {
        let (clock, offset) = manual_clock();
        let backend = NotesBackend::default();
        let (client, transport) = client(rotating_backend(backend), clock);
        client.tokens().establish("access-1", "refresh-1").unwrap();

        offset.store(901, Ordering::SeqCst);
        client
            .create_note(&NotePayload {
                title: "Draft".to_string(),
                body: String::new(),
            })
            .await
            .unwrap();

        let requests = transport.requests();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].path, "/auth/refresh");
        assert_eq!(requests[1].path, "/notes");
        assert_eq!(requests[1].bearer.as_deref(), Some("access-2"));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_unauthorized_requests_share_one_refresh() {
        let (clock, _) = manual_clock();
        let backend = NotesBackend::default();
        let transport = rotating_backend(backend).with_latency(Duration::from_millis(50));
        let (client, transport) = client(transport, clock);
        client.tokens().establish("access-1", "refresh-1").unwrap();

        let (first, second) = tokio::join!(client.list_notes(), client.search_notes("milk"));

        first.unwrap();
        second.unwrap();
        assert_eq!(transport.count(Method::Post, "/auth/refresh"), 1);
        let retried = transport
            .note_requests()
            .into_iter()
            .filter(|request| request.bearer.as_deref() == Some("access-2"))
            .count();
        assert_eq!(retried, 2);
    }

    #[tokio::test]
    async fn failed_refresh_surfaces_session_expired() {
        let (clock, _) = manual_clock();
        let transport = FakeTransport::new(|_| {
            respond(401, &json!({"error": "Unauthorized", "message": "jwt expired"}))
        });
        let (client, transport) = client(transport, clock);
        client.tokens().establish("access-1", "refresh-1").unwrap();

        assert_eq!(client.list_notes().await, Err(Error::SessionExpired));
        assert_eq!(transport.count(Method::Get, "/notes"), 1);
        assert!(!client.tokens().is_authenticated());
    }

    #[tokio::test]
    async fn second_rejection_is_auth_error() {
        let (clock, _) = manual_clock();
        let transport = FakeTransport::new(|request| match request.path.as_str() {
            "/auth/refresh" => respond(200, &json!({"accessToken": "access-2"})),
            _ => respond(401, &json!({"error": "Unauthorized", "message": "forbidden"})),
        });
        let (client, transport) = client(transport, clock);
        client.tokens().establish("access-1", "refresh-1").unwrap();

        assert_eq!(
            client.list_notes().await,
            Err(Error::Auth("forbidden".to_string()))
        );
        assert_eq!(transport.count(Method::Get, "/notes"), 2);
        assert_eq!(transport.count(Method::Post, "/auth/refresh"), 1);
    }

    #[tokio::test]
    async fn unauthenticated_rejection_does_not_refresh() {
        let (clock, _) = manual_clock();
        let transport = FakeTransport::new(|_| {
            respond(401, &json!({"error": "Unauthorized", "message": "login required"}))
        });
        let (client, transport) = client(transport, clock);

        assert!(matches!(client.list_notes().await, Err(Error::Auth(_))));
        assert_eq!(transport.requests().len(), 1);
    }

    #[tokio::test]
    async fn search_encodes_query_and_blank_lists() {
        let (clock, _) = manual_clock();
        let backend = NotesBackend::default();
        backend.seed("n1", "Rust & tokio", "");
        backend.seed("n2", "Groceries", "");
        let handler = backend.clone();
        let (client, transport) = client(FakeTransport::new(move |r| handler.handle(r)), clock);

        let found = client.search_notes("rust & tokio").await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(
            transport.requests()[0].path,
            "/notes/search?query=rust%20%26%20tokio"
        );

        let all = client.search_notes("   ").await.unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(transport.requests()[1].path, "/notes");
    }

    #[tokio::test]
    async fn create_update_and_delete_round_trip() {
        let (clock, _) = manual_clock();
        let backend = NotesBackend::default();
        let handler = backend.clone();
        let (client, transport) = client(FakeTransport::new(move |r| handler.handle(r)), clock);
        let payload = NotePayload {
            title: "Draft".to_string(),
            body: "first".to_string(),
        };

        let created = client.create_note(&payload).await.unwrap();
        assert_eq!(created.id.as_str(), "n1");
        assert_eq!(
            transport.requests()[0].body,
            Some(json!({"title": "Draft", "body": "first"}))
        );

        let updated = client
            .update_note(
                &created.id,
                &NotePayload {
                    body: "second".to_string(),
                    ..payload
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.body, "second");
        assert_eq!(transport.requests()[1].method, Method::Patch);
        assert_eq!(transport.requests()[1].path, "/notes/n1");

        client.delete_note(&created.id).await.unwrap();
        assert_eq!(backend.note("n1"), None);
        assert!(matches!(
            client.delete_note(&created.id).await,
            Err(Error::Api { status: 404, .. })
        ));
    }
}
