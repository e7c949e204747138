//! HTTP listener.
//!
//! Routes:
//! - `POST /fileSet`   form fields `action`, `data`, `id`
//! - `GET  /capture`   registers the caller's User-Agent
//! - `POST /heartbeat` `?id=<browser>`
//! - `GET  /test/<p>`  raw content of a loaded file

use std::collections::HashMap;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tiny_http::{Header, Method, Request, Response, Server};
use tokio::sync::watch;

use crate::errors::ServerError;
use crate::handlers::FileSetService;
use crate::protocol::{FIELD_ACTION, FIELD_DATA, FIELD_ID};

/// How long an accept loop blocks before rechecking for shutdown.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Request bodies above this size are refused with 413.
pub const DEFAULT_MAX_BODY_BYTES: usize = 32 * 1024 * 1024;

const TEST_PREFIX: &str = "/test/";

const JSON: &str = "application/json";
const TEXT: &str = "text/plain";

/// A response before it is bound to a connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
    pub no_cache: bool,
}

impl Reply {
    fn json(body: String) -> Self {
        Self {
            status: 200,
            content_type: JSON,
            body,
            no_cache: false,
        }
    }

    fn text(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            content_type: TEXT,
            body: body.into(),
            no_cache: false,
        }
    }

    fn not_found() -> Self {
        Self::text(404, "not found")
    }
}

/// Route one request.
pub fn route(
    service: &FileSetService,
    method: &Method,
    url: &str,
    user_agent: Option<&str>,
    body: &str,
) -> Reply {
    let (path, query) = url.split_once('?').unwrap_or((url, ""));

    match (method, path) {
        (Method::Post, "/fileSet") => {
            // Body fields override query fields.
            let mut fields = form_fields(query);
            fields.extend(form_fields(body));
            file_set(service, &fields)
        }
        (Method::Get, "/capture") => {
            let captured = service.capture(user_agent.unwrap_or_default());
            match serde_json::to_string(&captured) {
                Ok(body) => Reply::json(body),
                Err(e) => Reply::text(500, e.to_string()),
            }
        }
        (Method::Post, "/heartbeat") => {
            let fields = form_fields(query);
            match fields.get(FIELD_ID) {
                Some(id) if service.heartbeat(id) => Reply::text(200, "OK"),
                Some(id) => {
                    tracing::warn!(browser = %id, "heartbeat from unknown browser");
                    Reply::not_found()
                }
                None => Reply::text(400, "missing id"),
            }
        }
        (Method::Get, path) if path.starts_with(TEST_PREFIX) => test_resource(service, path),
        _ => Reply::not_found(),
    }
}

fn file_set(service: &FileSetService, fields: &HashMap<String, String>) -> Reply {
    let Some(action) = fields.get(FIELD_ACTION) else {
        return Reply::text(400, "missing action");
    };
    let browser_id = fields.get(FIELD_ID).map(String::as_str);
    let data = fields.get(FIELD_DATA).map(String::as_str);

    match service.handle(action, browser_id, data) {
        Ok(value) => Reply::json(value.to_string()),
        Err(e) => {
            tracing::warn!(action = %action, "file set request failed: {e}");
            Reply::text(e.status_code(), e.to_string())
        }
    }
}

fn test_resource(service: &FileSetService, path: &str) -> Reply {
    let raw = &path[TEST_PREFIX.len()..];
    let display_path = match urlencoding::decode(raw) {
        Ok(decoded) => decoded.into_owned(),
        Err(_) => return Reply::text(400, "invalid path encoding"),
    };

    match service.file_content(&display_path) {
        Some(content) => Reply {
            status: 200,
            content_type: mime_guess::from_path(&display_path)
                .first_raw()
                .unwrap_or(TEXT),
            body: content.to_string(),
            no_cache: true,
        },
        None => Reply::not_found(),
    }
}

fn form_fields(encoded: &str) -> HashMap<String, String> {
    url::form_urlencoded::parse(encoded.as_bytes())
        .into_owned()
        .collect()
}

fn header(name: &str, value: &str) -> Option<Header> {
    Header::from_bytes(name.as_bytes(), value.as_bytes()).ok()
}

/// Bound listener serving one [`FileSetService`].
pub struct FileSetServer {
    server: Arc<Server>,
    service: Arc<FileSetService>,
    max_body_bytes: usize,
}

impl FileSetServer {
    pub fn bind(addr: &str, service: Arc<FileSetService>) -> Result<Self, ServerError> {
        let server = Server::http(addr).map_err(|e| ServerError::Bind {
            addr: addr.to_string(),
            message: e.to_string(),
        })?;
        Ok(Self {
            server: Arc::new(server),
            service,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        })
    }

    pub fn with_max_body_bytes(mut self, max_body_bytes: usize) -> Self {
        self.max_body_bytes = max_body_bytes;
        self
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Run `workers` accept loops until `shutdown` turns true.
    pub async fn serve(
        self,
        workers: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Result<(), ServerError> {
        if let Some(addr) = self.local_addr() {
            tracing::info!("file set server listening on http://{addr}");
        }

        let handles: Vec<_> = (0..workers.max(1))
            .map(|_| {
                let server = Arc::clone(&self.server);
                let service = Arc::clone(&self.service);
                let shutdown = shutdown.clone();
                let limit = self.max_body_bytes;
                tokio::task::spawn_blocking(move || {
                    accept_loop(&server, &service, limit, &shutdown)
                })
            })
            .collect();

        for handle in handles {
            handle.await?;
        }
        tracing::info!("file set server stopped");
        Ok(())
    }
}

fn accept_loop(
    server: &Server,
    service: &FileSetService,
    max_body_bytes: usize,
    shutdown: &watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        match server.recv_timeout(POLL_INTERVAL) {
            Ok(Some(request)) => {
                if let Err(e) = respond(service, request, max_body_bytes) {
                    tracing::warn!("Connection error: {e}");
                }
            }
            Ok(None) => {}
            Err(e) => {
                tracing::error!("Accept error: {e}");
            }
        }
    }
}

/// Read at most `limit` bytes of body. `Err` carries the rejection to send.
fn read_body(request: &mut Request, limit: usize) -> std::io::Result<Result<String, Reply>> {
    let too_large = || Reply::text(413, format!("request body exceeds {limit} bytes"));
    if request.body_length().is_some_and(|len| len > limit) {
        return Ok(Err(too_large()));
    }

    let mut bytes = Vec::new();
    let cap = u64::try_from(limit).unwrap_or(u64::MAX).saturating_add(1);
    Read::take(request.as_reader(), cap).read_to_end(&mut bytes)?;
    if bytes.len() > limit {
        return Ok(Err(too_large()));
    }
    Ok(String::from_utf8(bytes).map_err(|_| Reply::text(400, "request body is not valid UTF-8")))
}

fn respond(
    service: &FileSetService,
    mut request: Request,
    max_body_bytes: usize,
) -> std::io::Result<()> {
    let reply = match read_body(&mut request, max_body_bytes)? {
        Ok(body) => {
            let user_agent = request
                .headers()
                .iter()
                .find(|h| h.field.equiv("User-Agent"))
                .map(|h| h.value.as_str().to_string());
            route(
                service,
                request.method(),
                request.url(),
                user_agent.as_deref(),
                &body,
            )
        }
        Err(rejected) => {
            tracing::warn!(url = %request.url(), status = rejected.status, "request body rejected");
            rejected
        }
    };
    tracing::debug!(
        method = %request.method(),
        url = %request.url(),
        status = reply.status,
        "request served"
    );

    let mut response = Response::from_data(reply.body).with_status_code(reply.status);
    let mut headers = vec![header("Content-Type", reply.content_type)];
    if reply.no_cache {
        headers.extend([
            header("Cache-Control", "no-cache, no-store, must-revalidate"),
            header("Pragma", "no-cache"),
            header("Expires", "0"),
        ]);
    }
    for h in headers.into_iter().flatten() {
        response = response.with_header(h);
    }
    request.respond(response)
}
