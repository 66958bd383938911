//! Plain HTTP responses for the non-upgrade pass-through path (spec §1
//! "a pass-through hook for non-upgrade requests", SPEC_FULL.md §B).

use crate::http::parser::ParsedRequest;

/// A minimal HTTP/1.1 response, rendered by [`HttpHandler::handle`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub reason: &'static str,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, reason: &'static str) -> Self {
        HttpResponse {
            status,
            reason,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn not_found() -> Self {
        HttpResponse::new(404, "Not Found").with_text_body("not found")
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_text_body(self, body: impl Into<String>) -> Self {
        self.with_header("Content-Type", "text/plain; charset=utf-8")
            .with_body(body.into().into_bytes())
    }

    pub fn render(&self) -> Vec<u8> {
        let mut out = format!("HTTP/1.1 {} {}\r\n", self.status, self.reason);
        for (name, value) in &self.headers {
            out.push_str(&format!("{name}: {value}\r\n"));
        }
        out.push_str(&format!("Content-Length: {}\r\n", self.body.len()));
        out.push_str("Connection: close\r\n\r\n");
        let mut bytes = out.into_bytes();
        bytes.extend_from_slice(&self.body);
        bytes
    }
}

/// Handles HTTP requests that arrive on the WebSocket listener but never
/// ask to upgrade (spec §1's named-but-undetailed pass-through hook). A
/// server without one configured falls back to [`DefaultHttpHandler`].
pub trait HttpHandler: Send + Sync + 'static {
    fn handle(&self, request: &ParsedRequest) -> HttpResponse;
}

/// Replies 404 to everything; the handler used when a server is built
/// without `.http_handler(...)`.
pub struct DefaultHttpHandler;

impl HttpHandler for DefaultHttpHandler {
    fn handle(&self, _request: &ParsedRequest) -> HttpResponse {
        HttpResponse::not_found()
    }
}

impl<F> HttpHandler for F
where
    F: Fn(&ParsedRequest) -> HttpResponse + Send + Sync + 'static,
{
    fn handle(&self, request: &ParsedRequest) -> HttpResponse {
        (self)(request)
    }
}
