//! In-memory collaborators for tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::TransportError;
use crate::transport::{ConnectivityProbe, HttpResponse, HttpTransport};

/// A request captured by [`MockTransport`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: serde_json::Value,
    pub timeout: Option<Duration>,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Replies with a canned result and records every request.
pub(crate) struct MockTransport {
    reply: Result<HttpResponse, TransportError>,
    delay: Option<Duration>,
    requests: Mutex<Vec<RecordedRequest>>,
}

impl MockTransport {
    pub fn ok(body: &str) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: &str) -> Self {
        Self {
            reply: Ok(HttpResponse {
                status,
                body: body.to_string(),
            }),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(err: TransportError) -> Self {
        Self {
            reply: Err(err),
            delay: None,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn last_request(&self) -> RecordedRequest {
        self.requests().pop().expect("no request recorded")
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn post_json(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: String,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, TransportError> {
        self.requests.lock().unwrap().push(RecordedRequest {
            url: url.to_string(),
            headers: headers.to_vec(),
            body: serde_json::from_str(&body).unwrap_or(serde_json::Value::Null),
            timeout,
        });
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply.clone()
    }
}

/// Probe with a fixed answer that counts how often it was asked.
pub(crate) struct CountingProbe {
    online: bool,
    calls: AtomicUsize,
}

impl CountingProbe {
    pub fn new(online: bool) -> Self {
        Self {
            online,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectivityProbe for CountingProbe {
    async fn is_online(&self) -> bool {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.online
    }
}
