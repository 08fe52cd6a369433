use crate::http::request::{split_target, Headers, Method, QueryParams, Request};
use crate::http::status::StatusCode;

/// Reasons a buffer does not yield a request.
///
/// Everything except [`ParseError::Incomplete`] is terminal for the
/// connection: the peer gets an error response and the socket is closed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// Start line is not `METHOD TARGET HTTP-VERSION`, or is not UTF-8
    #[error("malformed request start line")]
    MalformedStartLine,
    /// Well-formed start line naming a method outside GET/POST/PUT/HEAD
    #[error("unsupported method `{0}`")]
    UnsupportedMethod(String),
    /// Content-Length header that is not a non-negative integer
    #[error("invalid content-length header")]
    InvalidContentLength,
    /// Buffer grew past the configured request limit
    #[error("request exceeds {0} bytes")]
    RequestTooLarge(usize),
    /// Peer closed before sending the body its Content-Length announced
    #[error("request body truncated")]
    TruncatedBody,
    /// More bytes are needed before a decision can be made
    #[error("incomplete request")]
    Incomplete,
}

impl ParseError {
    /// Status code the peer is answered with for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ParseError::UnsupportedMethod(_) => StatusCode::NOT_IMPLEMENTED,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

/// Parses one request from the front of `buf`.
///
/// On success returns the request and the number of bytes it occupied, so the
/// caller can drain them and keep whatever follows for the next request.
pub fn parse_http_request(buf: &[u8]) -> Result<(Request, usize), ParseError> {
    parse(buf, false)
}

/// Parses what a peer sent before closing its write side.
///
/// End of input terminates whatever is open: a buffer with no line break is
/// taken whole as the start line, and an unterminated header block ends at
/// the last byte. Never returns [`ParseError::Incomplete`].
pub fn parse_final_request(buf: &[u8]) -> Result<Request, ParseError> {
    parse(buf, true).map(|(request, _)| request)
}

fn parse(buf: &[u8], at_eof: bool) -> Result<(Request, usize), ParseError> {
    // A complete start line is judged immediately, before the header block ends.
    let line_end = match find_line_end(buf) {
        Some(pos) => pos,
        None if at_eof => buf.len(),
        None => return Err(ParseError::Incomplete),
    };
    let start_line = std::str::from_utf8(&buf[..line_end])
        .map_err(|_| ParseError::MalformedStartLine)?;
    let (method, target, version) = parse_start_line(start_line)?;

    let (head_end, body_start) = match find_headers_end(buf) {
        Some(bounds) => bounds,
        None if at_eof => (buf.len(), buf.len()),
        None => return Err(ParseError::Incomplete),
    };
    let head = std::str::from_utf8(&buf[..head_end])
        .map_err(|_| ParseError::MalformedStartLine)?;

    let mut headers = Headers::new();
    for line in head.split('\n').skip(1) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        if line.is_empty() {
            continue;
        }
        match line.split_once(':') {
            Some((name, value)) => headers.append(name, value),
            None => tracing::trace!(line, "skipping header line without colon"),
        }
    }

    let content_length = headers
        .get("content-length")
        .map(|v| v.parse::<usize>().map_err(|_| ParseError::InvalidContentLength))
        .transpose()?
        .unwrap_or(0);

    let body_bytes = &buf[body_start..];
    if body_bytes.len() < content_length {
        return Err(if at_eof {
            ParseError::TruncatedBody
        } else {
            ParseError::Incomplete
        });
    }

    let (path, query) = split_target(target);
    let request = Request {
        method,
        target: target.to_string(),
        path: path.to_string(),
        query: QueryParams::parse(query),
        version: version.to_string(),
        headers,
        body: body_bytes[..content_length].to_vec(),
    };

    Ok((request, body_start + content_length))
}

/// Splits a start line into method, target and protocol token.
pub fn parse_start_line(line: &str) -> Result<(Method, &str, &str), ParseError> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let mut parts = line.split_whitespace();

    let (method, target, version) = match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some(m), Some(t), Some(v), None) => (m, t, v),
        _ => return Err(ParseError::MalformedStartLine),
    };

    if !version.contains("HTTP") {
        return Err(ParseError::MalformedStartLine);
    }

    let method = Method::from_str(method)
        .ok_or_else(|| ParseError::UnsupportedMethod(method.to_string()))?;

    Ok((method, target, version))
}

/// Parses the status line at the front of a rendered response.
///
/// Returns the protocol token and the status code. Codes outside the registry
/// are rejected as malformed.
pub fn parse_status_line(buf: &[u8]) -> Result<(String, StatusCode), ParseError> {
    let line_end = find_line_end(buf).unwrap_or(buf.len());
    let line = std::str::from_utf8(&buf[..line_end])
        .map_err(|_| ParseError::MalformedStartLine)?;
    let line = line.strip_suffix('\r').unwrap_or(line);

    let mut parts = line.splitn(3, ' ');
    let version = parts.next().filter(|v| v.contains("HTTP"));
    let code = parts.next().and_then(|c| c.parse::<u16>().ok());

    match (version, code.and_then(StatusCode::from_u16)) {
        (Some(version), Some(status)) => Ok((version.to_string(), status)),
        _ => Err(ParseError::MalformedStartLine),
    }
}

/// Position of the first `\n`.
fn find_line_end(buf: &[u8]) -> Option<usize> {
    buf.iter().position(|&b| b == b'\n')
}

/// Locates the blank line ending the header block.
///
/// Returns the end of the head (exclusive) and the start of the body. Both
/// `\r\n\r\n` and bare `\n\n` terminate the block.
fn find_headers_end(buf: &[u8]) -> Option<(usize, usize)> {
    let mut line_start = 0;
    while let Some(offset) = buf[line_start..].iter().position(|&b| b == b'\n') {
        let line_end = line_start + offset;
        let line = &buf[line_start..line_end];
        if line.is_empty() || line == b"\r" {
            return Some((line_start, line_end + 1));
        }
        line_start = line_end + 1;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_get() {
        let req = b"GET / HTTP/1.1\r\nHost: example.com\r\n\r\n";

        let (parsed, consumed) = parse_http_request(req).unwrap();

        assert_eq!(parsed.path, "/");
        assert_eq!(parsed.headers.get("host").unwrap(), "example.com");
        assert_eq!(consumed, req.len());
    }

    #[test]
    fn final_parse_closes_open_head() {
        let (request, _) = parse(b"GET /x HTTP/1.1\r\nHost: a", true).unwrap();
        assert_eq!(request.path, "/x");
        assert_eq!(request.headers.get("host"), Some("a"));

        assert_eq!(parse(b"GARBAGE", true).unwrap_err(), ParseError::MalformedStartLine);
    }

    #[test]
    fn headers_end_accepts_bare_newlines() {
        assert_eq!(find_headers_end(b"GET / HTTP/1.0\n\nrest"), Some((15, 16)));
        assert_eq!(find_headers_end(b"GET / HTTP/1.0\r\nA: b\r\n\r\n"), Some((22, 24)));
        assert_eq!(find_headers_end(b"GET / HTTP/1.0\r\nA: b\r\n"), None);
    }
}
