//! Diagnostic echo responses.
//!
//! Every well-formed request is answered with an HTML page describing what
//! the server saw: method, peer address, the status it decided to answer with
//! and the full header list. The status is 200 unless the client asked for a
//! registered code through `?status=<code>`.

use std::fmt::Write as _;
use std::net::SocketAddr;

use crate::http::parser::ParseError;
use crate::http::request::{Method, Request};
use crate::http::response::{Disposition, Response, ResponseBuilder};

const CONTENT_TYPE: &str = "text/html";

/// Builds the echo response for a parsed request from `peer`.
///
/// HEAD requests always close after the response.
pub fn echo_response(req: &Request, peer: SocketAddr) -> Response {
    let status = req.status_override();
    // A HEAD response still carries the body, so a client that reads none
    // would misframe anything sent after it on the same connection.
    let disposition = if req.keep_alive() && req.method != Method::HEAD {
        Disposition::KeepAlive
    } else {
        Disposition::Close
    };

    let mut body = String::with_capacity(256);
    body.push_str("<html><body>");
    let _ = write!(body, "<h4>Request method: {}</h4>", req.method);
    let _ = write!(body, "<h4>Request source: {}</h4>", peer);
    let _ = write!(body, "<h4>Response status: {}</h4>", status);
    body.push_str("<h3>Request headers:</h3>");
    for (name, value) in req.headers.iter() {
        let _ = write!(body, "<h4>{}: {}</h4>", escape_html(name), escape_html(value));
    }
    body.push_str("</body></html>");

    ResponseBuilder::new(status)
        .version(req.version.clone())
        .disposition(disposition)
        .header("Content-Type", CONTENT_TYPE)
        .body(body.into_bytes())
        .build()
}

/// Builds the response sent before closing on a protocol error.
///
/// 501 for an unsupported method, 400 for everything else. The disposition is
/// always [`Disposition::Close`].
pub fn error_response(err: &ParseError) -> Response {
    let status = err.status();
    let body = format!(
        "<html><body><h4>Response status: {}</h4><p>{}</p></body></html>",
        status,
        escape_html(&err.to_string())
    );

    ResponseBuilder::new(status)
        .disposition(Disposition::Close)
        .header("Content-Type", CONTENT_TYPE)
        .body(body.into_bytes())
        .build()
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '&' => out.push_str("&amp;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}
