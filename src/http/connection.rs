use std::io::{self, Read};
use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use mio::Interest;
use mio::net::TcpStream;

use crate::http::echo::{echo_response, error_response};
use crate::http::parser::{parse_final_request, parse_http_request, ParseError};
use crate::http::request::Request;
use crate::http::response::{Disposition, Response};
use crate::http::writer::{ResponseWriter, WriteProgress};

/// Per-connection buffer limits.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    /// Size of a single non-blocking read
    pub read_chunk: usize,
    /// Largest request head plus body kept in memory
    pub max_request: usize,
}

impl Default for ConnectionLimits {
    fn default() -> Self {
        Self {
            read_chunk: 4096,
            max_request: 16 * 1024,
        }
    }
}

/// Readiness reported for a connection's socket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Readiness {
    pub readable: bool,
    pub writable: bool,
}

impl Readiness {
    pub fn from_event(event: &mio::event::Event) -> Self {
        Self {
            readable: event.is_readable() || event.is_read_closed() || event.is_error(),
            writable: event.is_writable() || event.is_write_closed(),
        }
    }
}

pub enum ConnectionState {
    /// Registered for READABLE, waiting for a complete request
    Reading,
    /// A request has been parsed and is being answered
    Processing(Request),
    /// Flushing a response; registered for WRITABLE while the socket pushes back
    Writing(ResponseWriter, Disposition),
    /// Terminal; the registry drops the connection
    Closed,
}

enum Fill {
    /// Socket drained to `WouldBlock`
    Drained,
    /// Buffer reached the request limit before the socket drained
    Full,
    /// Peer sent FIN
    Eof,
}

/// One accepted peer socket and its request/response cursor.
pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    buffer: BytesMut,
    state: ConnectionState,
    limits: ConnectionLimits,
    peer_closed: bool,
}

impl Connection {
    pub fn new(stream: TcpStream, peer: SocketAddr, limits: ConnectionLimits) -> Self {
        Self {
            stream,
            peer,
            buffer: BytesMut::with_capacity(limits.read_chunk),
            state: ConnectionState::Reading,
            limits,
            peer_closed: false,
        }
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    pub fn is_closed(&self) -> bool {
        matches!(self.state, ConnectionState::Closed)
    }

    /// Interest the socket should be registered with for its current state.
    pub fn interest(&self) -> Interest {
        match self.state {
            ConnectionState::Writing(..) => Interest::WRITABLE,
            _ => Interest::READABLE,
        }
    }

    pub(crate) fn stream_mut(&mut self) -> &mut TcpStream {
        &mut self.stream
    }

    /// Advances the state machine for one readiness notification.
    ///
    /// Never blocks: every socket call stops at `WouldBlock` and the state
    /// records where to resume.
    pub fn handle(&mut self, readiness: Readiness) {
        if readiness.writable && matches!(self.state, ConnectionState::Writing(..)) {
            self.drive();
        }

        // A finished write may leave unread bytes behind, so read whenever
        // the connection is back in Reading.
        if matches!(self.state, ConnectionState::Reading)
            && (readiness.readable || readiness.writable)
        {
            self.serve();
        }
    }

    /// Closes the connection without sending anything further.
    pub fn close(&mut self) {
        self.state = ConnectionState::Closed;
    }

    fn serve(&mut self) {
        loop {
            let fill = match self.fill_buffer() {
                Ok(fill) => fill,
                Err(e) => {
                    tracing::warn!(peer = %self.peer, error = %e, "read failed, closing connection");
                    self.state = ConnectionState::Closed;
                    return;
                }
            };

            if let Fill::Eof = fill {
                self.peer_closed = true;
                if self.buffer.is_empty() {
                    tracing::debug!(peer = %self.peer, "client has disconnected");
                }
            }

            self.drive();

            let again = matches!(fill, Fill::Full)
                && matches!(self.state, ConnectionState::Reading);
            if !again {
                return;
            }
        }
    }

    fn fill_buffer(&mut self) -> io::Result<Fill> {
        let mut temp = vec![0u8; self.limits.read_chunk];

        loop {
            if self.buffer.len() >= self.limits.max_request {
                return Ok(Fill::Full);
            }

            match self.stream.read(&mut temp) {
                Ok(0) => return Ok(Fill::Eof),
                Ok(n) => {
                    tracing::trace!(peer = %self.peer, bytes = n, "read");
                    self.buffer.extend_from_slice(&temp[..n]);
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(Fill::Drained),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }

    /// Runs state transitions until the connection has to wait for the socket.
    fn drive(&mut self) {
        loop {
            match &mut self.state {
                ConnectionState::Reading => match self.next_request() {
                    Some(Ok(request)) => {
                        self.state = ConnectionState::Processing(request);
                    }
                    Some(Err(err)) => {
                        tracing::debug!(peer = %self.peer, error = %err, "rejecting request");
                        self.start_write(error_response(&err));
                    }
                    None => {
                        if self.peer_closed {
                            self.state = ConnectionState::Closed;
                        }
                        return;
                    }
                },

                ConnectionState::Processing(request) => {
                    let response = echo_response(request, self.peer);
                    tracing::debug!(
                        peer = %self.peer,
                        method = %request.method,
                        target = %request.target,
                        status = response.status.as_u16(),
                        keep_alive = response.keep_alive(),
                        "sending response"
                    );
                    self.start_write(response);
                }

                ConnectionState::Writing(writer, disposition) => {
                    let disposition = *disposition;
                    match writer.write_to(&mut self.stream) {
                        Ok(WriteProgress::Pending) => return,
                        Ok(WriteProgress::Done) => {
                            self.state = if disposition == Disposition::KeepAlive && !self.peer_closed {
                                ConnectionState::Reading
                            } else {
                                ConnectionState::Closed
                            };
                        }
                        Err(e) => {
                            tracing::warn!(peer = %self.peer, error = %e, "write failed, closing connection");
                            self.state = ConnectionState::Closed;
                        }
                    }
                }

                ConnectionState::Closed => return,
            }
        }
    }

    fn start_write(&mut self, response: Response) {
        let writer = ResponseWriter::new(&response);
        self.state = ConnectionState::Writing(writer, response.disposition);
    }

    /// Takes the next request off the front of the buffer.
    ///
    /// `None` means more bytes are needed. Protocol errors clear the buffer
    /// since the connection is closed after answering them. Once the peer
    /// has half-closed, a leftover partial request is answered as it stands.
    fn next_request(&mut self) -> Option<Result<Request, ParseError>> {
        if self.buffer.is_empty() {
            return None;
        }

        match parse_http_request(&self.buffer) {
            Ok((request, consumed)) => {
                self.buffer.advance(consumed);
                Some(Ok(request))
            }
            Err(ParseError::Incomplete) => {
                if self.buffer.len() >= self.limits.max_request {
                    self.buffer.clear();
                    Some(Err(ParseError::RequestTooLarge(self.limits.max_request)))
                } else if self.peer_closed {
                    // No more bytes are coming; answer what was sent.
                    tracing::debug!(peer = %self.peer, "peer closed mid-request");
                    let outcome = parse_final_request(&self.buffer);
                    self.buffer.clear();
                    Some(outcome)
                } else {
                    None
                }
            }
            Err(err) => {
                self.buffer.clear();
                Some(Err(err))
            }
        }
    }
}
