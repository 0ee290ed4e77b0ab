//! Test doubles shared by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use serde_json::{json, Value};

use crate::api::{ApiRequest, ApiResponse, Method, Transport};
use crate::error::{Error, Result};
use crate::store::{KeyValueStore, MemoryStore};
use crate::util::Clock;

/// Clock frozen at creation; advance it by storing seconds into the handle.
pub fn manual_clock() -> (Clock, Arc<AtomicI64>) {
    let offset = Arc::new(AtomicI64::new(0));
    let start = Utc::now();
    let handle = offset.clone();
    let clock: Clock = Arc::new(move || start + TimeDelta::seconds(handle.load(Ordering::SeqCst)));
    (clock, offset)
}

type Handler = Box<dyn Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync>;

/// Transport answering through a closure and recording every request.
pub struct FakeTransport {
    handler: Handler,
    latency: Duration,
    requests: Mutex<Vec<ApiRequest>>,
}

impl FakeTransport {
    pub fn new(
        handler: impl Fn(&ApiRequest) -> Result<ApiResponse> + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Box::new(handler),
            latency: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Delay every response, so concurrent callers overlap.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn requests(&self) -> Vec<ApiRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: Method, path: &str) -> usize {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|request| request.method == method && request.path == path)
            .count()
    }

    /// Requests other than `/auth/*` calls.
    pub fn note_requests(&self) -> Vec<ApiRequest> {
        self.requests()
            .into_iter()
            .filter(|request| request.path.starts_with("/notes"))
            .collect()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse> {
        self.requests.lock().unwrap().push(request.clone());
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        (self.handler)(&request)
    }
}

pub fn respond(status: u16, body: &Value) -> Result<ApiResponse> {
    Ok(ApiResponse::new(status, body.to_string()))
}

/// In-memory notes backend: `POST /notes` assigns `n1`, `n2`, ...;
/// `PATCH /notes/{id}` echoes the update. Writes fail with a 503 or a dropped
/// connection while the corresponding switch is set.
#[derive(Clone, Default)]
pub struct NotesBackend {
    notes: Arc<Mutex<HashMap<String, Value>>>,
    next_id: Arc<AtomicUsize>,
    pub fail_writes: Arc<AtomicBool>,
    pub drop_connections: Arc<AtomicBool>,
}

impl NotesBackend {
    pub fn handle(&self, request: &ApiRequest) -> Result<ApiResponse> {
        if self.drop_connections.load(Ordering::SeqCst) {
            return Err(Error::TransientNetwork("connection reset".to_string()));
        }
        let is_write = matches!(request.method, Method::Post | Method::Patch);
        if is_write && self.fail_writes.load(Ordering::SeqCst) {
            return respond(503, &json!({"error": "Service Unavailable", "message": "try later"}));
        }

        match (request.method, request.path.as_str()) {
            (Method::Get, "/notes") => {
                let notes = self.notes.lock().unwrap().values().cloned().collect::<Vec<_>>();
                respond(200, &json!({ "data": notes }))
            }
            (Method::Get, path) if path.starts_with("/notes/search?query=") => {
                let query = path.trim_start_matches("/notes/search?query=");
                let decoded = urlencoding::decode(query).unwrap().to_lowercase();
                let notes = self
                    .notes
                    .lock()
                    .unwrap()
                    .values()
                    .filter(|note| {
                        note["title"]
                            .as_str()
                            .unwrap_or("")
                            .to_lowercase()
                            .contains(&decoded)
                    })
                    .cloned()
                    .collect::<Vec<_>>();
                respond(200, &json!({ "data": notes }))
            }
            (Method::Post, "/notes") => {
                let id = format!("n{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
                let note = self.store_note(&id, request.body.as_ref());
                respond(201, &json!({ "data": note }))
            }
            (Method::Patch, path) => {
                let id = path.trim_start_matches("/notes/");
                if !self.notes.lock().unwrap().contains_key(id) {
                    return respond(404, &json!({"error": "Not Found", "message": "Note not found"}));
                }
                let note = self.store_note(id, request.body.as_ref());
                respond(200, &json!({ "data": note }))
            }
            (Method::Delete, path) => {
                let id = path.trim_start_matches("/notes/");
                if self.notes.lock().unwrap().remove(id).is_some() {
                    Ok(ApiResponse::new(204, ""))
                } else {
                    respond(404, &json!({"error": "Not Found", "message": "Note not found"}))
                }
            }
            _ => respond(404, &json!({"error": "Not Found", "message": "no route"})),
        }
    }

    pub fn seed(&self, id: &str, title: &str, body: &str) {
        self.notes.lock().unwrap().insert(
            id.to_string(),
            json!({"_id": id, "title": title, "content": body}),
        );
    }

    pub fn note(&self, id: &str) -> Option<Value> {
        self.notes.lock().unwrap().get(id).cloned()
    }

    fn store_note(&self, id: &str, body: Option<&Value>) -> Value {
        let body = body.cloned().unwrap_or(Value::Null);
        let note = json!({
            "_id": id,
            "title": body["title"],
            "content": body["body"],
            "updatedAt": "2024-03-01T10:00:00.000Z",
        });
        self.notes.lock().unwrap().insert(id.to_string(), note.clone());
        note
    }
}

/// Memory store whose writes can be switched to fail, for every key or for
/// one key only.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    pub fail_writes: AtomicBool,
    failing_key: Mutex<Option<String>>,
}

impl FlakyStore {
    pub fn failing() -> Self {
        let store = Self::default();
        store.fail_writes.store(true, Ordering::SeqCst);
        store
    }

    /// Fail writes to `key` from now on.
    pub fn fail_on(&self, key: &str) {
        *self.failing_key.lock().unwrap() = Some(key.to_string());
    }

    fn check(&self, key: &str) -> Result<()> {
        let key_fails = self.failing_key.lock().unwrap().as_deref() == Some(key);
        if key_fails || self.fail_writes.load(Ordering::SeqCst) {
            Err(Error::Persistence("disk full".to_string()))
        } else {
            Ok(())
        }
    }
}

impl KeyValueStore for FlakyStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.check(key)?;
        self.inner.set(key, value)
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.check(key)?;
        self.inner.remove(key)
    }
}
