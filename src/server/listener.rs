use std::io;
use std::net::SocketAddr;

use mio::net::{TcpListener, TcpStream};
use socket2::{Domain, Protocol, Socket, Type};
use tracing::info;

/// The bound, listening socket.
pub struct Endpoint {
    listener: TcpListener,
    local_addr: SocketAddr,
    backlog: i32,
}

/// Binds a non-blocking listening socket with address reuse enabled.
pub fn bind(addr: SocketAddr, backlog: i32) -> io::Result<Endpoint> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(backlog)?;

    let listener = TcpListener::from_std(socket.into());
    let local_addr = listener.local_addr()?;
    info!(addr = %local_addr, backlog, "Listening");

    Ok(Endpoint {
        listener,
        local_addr,
        backlog,
    })
}

impl Endpoint {
    /// Accepts one pending connection.
    ///
    /// Returns `Ok(None)` once the accept queue is empty.
    pub fn accept(&self) -> io::Result<Option<(TcpStream, SocketAddr)>> {
        match self.listener.accept() {
            Ok(pair) => Ok(Some(pair)),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(e),
        }
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn backlog(&self) -> i32 {
        self.backlog
    }

    pub(crate) fn listener_mut(&mut self) -> &mut TcpListener {
        &mut self.listener
    }
}
