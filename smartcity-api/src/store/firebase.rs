use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time;

use super::{StateStore, StoreError, Watch, WatchId};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

struct Endpoint {
    client: Client,
    url: String,
    auth: Option<String>,
}

impl Endpoint {
    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}/{}.json", self.url.trim_end_matches('/'), path.trim_matches('/'));
        let builder = self.client.request(method, url);

        match &self.auth {
            Some(auth) => builder.query(&[("auth", auth)]),
            None => builder,
        }
    }

    async fn send(&self, path: &str, request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await?;

        match response.status() {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(StoreError::PermissionDenied(path.to_string()))
            }
            status if !status.is_success() => Err(StoreError::Status {
                status: status.as_u16(),
                path: path.to_string(),
            }),
            _ => Ok(response),
        }
    }

    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let response = self.send(path, self.request(Method::GET, path)).await?;

        Ok(match response.json::<Value>().await? {
            Value::Null => None,
            value => Some(value),
        })
    }
}

/// Firebase Realtime Database client over the REST interface.
///
/// Watches use the `text/event-stream` endpoint. Event payloads are only used
/// as a trigger: each `put` or `patch` causes a full re-read of the watched path.
pub struct FirebaseStore {
    endpoint: Arc<Endpoint>,
    watches: Mutex<HashMap<WatchId, JoinHandle<()>>>,
    next_watch: AtomicU64,
}

impl FirebaseStore {
    pub fn new(url: &str, auth: Option<String>) -> Result<Self, StoreError> {
        Ok(Self {
            endpoint: Arc::new(Endpoint {
                client: Client::builder().build()?,
                url: url.to_string(),
                auth,
            }),
            watches: Mutex::new(HashMap::new()),
            next_watch: AtomicU64::new(1),
        })
    }
}

impl Drop for FirebaseStore {
    fn drop(&mut self) {
        for (_, task) in self.watches.get_mut().drain() {
            task.abort();
        }
    }
}

#[async_trait]
impl StateStore for FirebaseStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.endpoint.read(path).await
    }

    async fn write_whole(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let request = self.endpoint.request(Method::PUT, path).json(&value);
        self.endpoint.send(path, request).await?;

        Ok(())
    }

    async fn write_field(&self, path: &str, fields: Map<String, Value>) -> Result<(), StoreError> {
        let request = self.endpoint.request(Method::PATCH, path).json(&fields);
        self.endpoint.send(path, request).await?;

        Ok(())
    }

    async fn remove(&self, path: &str) -> Result<(), StoreError> {
        let request = self.endpoint.request(Method::DELETE, path);
        self.endpoint.send(path, request).await?;

        Ok(())
    }

    async fn watch(&self, path: &str) -> Result<Watch, StoreError> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let _ = sender.send(self.endpoint.read(path).await?);

        let id = self.next_watch.fetch_add(1, Ordering::Relaxed);
        let task = tokio::spawn(follow(self.endpoint.clone(), path.to_string(), sender));
        self.watches.lock().await.insert(id, task);

        Ok(Watch { id, receiver })
    }

    async fn unwatch(&self, id: WatchId) {
        if let Some(task) = self.watches.lock().await.remove(&id) {
            task.abort();
        }
    }
}

async fn follow(endpoint: Arc<Endpoint>, path: String, sender: mpsc::UnboundedSender<Option<Value>>) {
    loop {
        match stream(&endpoint, &path, &sender).await {
            Ok(StreamEnd::ReceiverGone) => return,
            Ok(StreamEnd::Cancelled(reason)) => {
                tracing::warn!("watch on `{}` cancelled by the store: {}", path, reason);
                return;
            }
            Ok(StreamEnd::Closed) => tracing::debug!("event stream for `{}` closed", path),
            Err(e) if e.is_permission_denied() => {
                tracing::warn!("watch on `{}` not permitted: {}", path, e);
                return;
            }
            Err(e) => tracing::error!("event stream for `{}` failed: {}", path, e),
        }

        time::sleep(RECONNECT_DELAY).await;
    }
}

enum StreamEnd {
    Closed,
    Cancelled(String),
    ReceiverGone,
}

async fn stream(
    endpoint: &Endpoint,
    path: &str,
    sender: &mpsc::UnboundedSender<Option<Value>>,
) -> Result<StreamEnd, StoreError> {
    let request = endpoint
        .request(Method::GET, path)
        .header(ACCEPT, "text/event-stream");
    let mut chunks = endpoint.send(path, request).await?.bytes_stream();
    let mut parser = EventStreamParser::default();

    while let Some(chunk) = chunks.next().await {
        for event in parser.push(&chunk?) {
            match event {
                StreamEvent::Changed => {
                    let value = endpoint.read(path).await?;
                    if sender.send(value).is_err() {
                        return Ok(StreamEnd::ReceiverGone);
                    }
                }
                StreamEvent::KeepAlive => {}
                StreamEvent::Cancelled(reason) => return Ok(StreamEnd::Cancelled(reason)),
            }
        }
    }

    Ok(StreamEnd::Closed)
}

#[derive(Debug, PartialEq)]
enum StreamEvent {
    Changed,
    KeepAlive,
    Cancelled(String),
}

/// Splits a server-sent event stream into Firebase events.
#[derive(Default)]
struct EventStreamParser {
    buffer: Vec<u8>,
    name: Option<String>,
    data: String,
}

impl EventStreamParser {
    fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();

        while let Some(end) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let line = String::from_utf8_lossy(&line);
            let line = line.trim_end_matches(['\n', '\r']);

            if line.is_empty() {
                if let Some(event) = self.dispatch() {
                    events.push(event);
                }
            } else if let Some(name) = line.strip_prefix("event:") {
                self.name = Some(name.trim().to_string());
            } else if let Some(data) = line.strip_prefix("data:") {
                self.data.push_str(data.trim());
            }
        }

        events
    }

    fn dispatch(&mut self) -> Option<StreamEvent> {
        let data = std::mem::take(&mut self.data);

        match self.name.take()?.as_str() {
            "put" | "patch" => Some(StreamEvent::Changed),
            "keep-alive" => Some(StreamEvent::KeepAlive),
            "cancel" | "auth_revoked" => Some(StreamEvent::Cancelled(data)),
            other => {
                tracing::debug!("ignoring event stream entry `{}`", other);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_put_and_keep_alive() {
        let mut parser = EventStreamParser::default();
        let events = parser.push(
            b"event: put\ndata: {\"path\":\"/\",\"data\":{\"online\":1}}\n\nevent: keep-alive\ndata: null\n\n",
        );

        assert_eq!(events, vec![StreamEvent::Changed, StreamEvent::KeepAlive]);
    }

    #[test]
    fn test_parse_split_chunks() {
        let mut parser = EventStreamParser::default();

        assert!(parser.push(b"event: pa").is_empty());
        assert!(parser.push("tch\r\ndata: {\"path\":\"/Ventilação\"".as_bytes()).is_empty());
        assert_eq!(parser.push(b"}\r\n\r\n"), vec![StreamEvent::Changed]);
    }

    #[test]
    fn test_parse_cancel() {
        let mut parser = EventStreamParser::default();
        let events = parser.push(b"event: cancel\ndata: permission denied\n\n");

        assert_eq!(events, vec![StreamEvent::Cancelled("permission denied".to_string())]);
    }

    #[test]
    fn test_request_url() {
        let store = FirebaseStore::new("https://city.firebaseio.com/", Some("token".to_string())).unwrap();
        let request = store
            .endpoint
            .request(Method::GET, "/smartcity/status")
            .build()
            .unwrap();

        assert_eq!(
            request.url().as_str(),
            "https://city.firebaseio.com/smartcity/status.json?auth=token"
        );
    }
}
