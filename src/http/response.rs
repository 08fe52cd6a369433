pub use crate::http::status::StatusCode;

/// What happens to the connection once a response has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Keep the socket registered for the next request
    KeepAlive,
    /// Deregister and close after the write drains
    Close,
}

impl Disposition {
    /// Value of the `Connection` header announcing this disposition.
    pub fn header_value(&self) -> &'static str {
        match self {
            Disposition::KeepAlive => "keep-alive",
            Disposition::Close => "close",
        }
    }
}

/// Represents a complete HTTP response ready to be sent to a client.
///
/// `Content-Length` always equals `body.len()` for responses produced by
/// [`ResponseBuilder::build`].
#[derive(Debug, Clone)]
pub struct Response {
    /// Protocol token for the status line
    pub version: String,
    /// The HTTP status code
    pub status: StatusCode,
    /// Headers in the order they will be written
    pub headers: Vec<(String, String)>,
    /// Response body as bytes
    pub body: Vec<u8>,
    /// Whether the connection survives this response
    pub disposition: Disposition,
}

impl Response {
    /// Retrieves a header value by name (case-insensitive).
    pub fn header(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_str())
    }

    pub fn keep_alive(&self) -> bool {
        self.disposition == Disposition::KeepAlive
    }
}

/// Builder for constructing HTTP responses in a fluent style.
///
/// # Example
///
/// ```
/// # use status_echo::http::response::{Disposition, ResponseBuilder, StatusCode};
/// let response = ResponseBuilder::new(StatusCode::OK)
///     .disposition(Disposition::Close)
///     .header("Content-Type", "text/html")
///     .body(b"<html></html>".to_vec())
///     .build();
/// assert_eq!(response.header("Content-Length"), Some("13"));
/// ```
pub struct ResponseBuilder {
    version: String,
    status: StatusCode,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
    disposition: Disposition,
}

impl ResponseBuilder {
    /// Creates a new response builder with the specified status code.
    ///
    /// The disposition defaults to [`Disposition::Close`].
    pub fn new(status: StatusCode) -> Self {
        Self {
            version: "HTTP/1.1".to_string(),
            status,
            headers: Vec::new(),
            body: Vec::new(),
            disposition: Disposition::Close,
        }
    }

    /// Sets the protocol token written on the status line.
    pub fn version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Adds or replaces a header.
    ///
    /// A header with the same name (compared case-insensitively) keeps its
    /// position but takes the new value.
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_header(key.into(), value.into());
        self
    }

    /// Sets the disposition and the matching `Connection` header.
    pub fn disposition(mut self, disposition: Disposition) -> Self {
        self.disposition = disposition;
        self.set_header("Connection".to_string(), disposition.header_value().to_string());
        self
    }

    /// Sets the response body.
    pub fn body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Builds the final Response.
    ///
    /// `Content-Length` is always derived from the body, overriding any value
    /// set through [`ResponseBuilder::header`].
    pub fn build(mut self) -> Response {
        let length = self.body.len().to_string();
        self.set_header("Content-Length".to_string(), length);

        Response {
            version: self.version,
            status: self.status,
            headers: self.headers,
            body: self.body,
            disposition: self.disposition,
        }
    }

    fn set_header(&mut self, key: String, value: String) {
        match self
            .headers
            .iter_mut()
            .find(|(k, _)| k.eq_ignore_ascii_case(&key))
        {
            Some(entry) => entry.1 = value,
            None => self.headers.push((key, value)),
        }
    }
}
