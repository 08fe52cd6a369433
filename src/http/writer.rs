use std::io::{self, Write};

use crate::http::response::Response;

/// Renders a response into wire bytes.
///
/// Status line from the response's protocol token, headers in insertion
/// order, a blank line, then the body.
pub fn serialize_response(resp: &Response) -> Vec<u8> {
    let mut buf = Vec::with_capacity(128 + resp.body.len());

    // Status line
    let status_line = format!(
        "{} {} {}\r\n",
        resp.version,
        resp.status.as_u16(),
        resp.status.reason_phrase()
    );
    buf.extend_from_slice(status_line.as_bytes());

    // Headers
    for (k, v) in &resp.headers {
        buf.extend_from_slice(k.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(v.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    // Header/body separator
    buf.extend_from_slice(b"\r\n");

    // Body
    buf.extend_from_slice(&resp.body);

    buf
}

/// Outcome of pushing buffered bytes into a non-blocking sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// Every byte has been written
    Done,
    /// The sink would block; resume on the next writable event
    Pending,
}

/// A rendered response together with how much of it has been sent.
pub struct ResponseWriter {
    buffer: Vec<u8>,
    written: usize,
}

impl ResponseWriter {
    pub fn new(response: &Response) -> Self {
        Self {
            buffer: serialize_response(response),
            written: 0,
        }
    }

    /// Writes as much as the sink accepts without blocking.
    ///
    /// Partial writes advance the cursor; `WouldBlock` is reported as
    /// [`WriteProgress::Pending`] rather than an error.
    pub fn write_to<W: Write>(&mut self, sink: &mut W) -> io::Result<WriteProgress> {
        while self.written < self.buffer.len() {
            match sink.write(&self.buffer[self.written..]) {
                Ok(0) => {
                    return Err(io::Error::new(
                        io::ErrorKind::WriteZero,
                        "connection closed while writing",
                    ));
                }
                Ok(n) => self.written += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    return Ok(WriteProgress::Pending);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        Ok(WriteProgress::Done)
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.written
    }

    pub fn is_done(&self) -> bool {
        self.remaining() == 0
    }
}
