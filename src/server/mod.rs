//! Socket ownership and the event loop.

pub mod listener;
pub mod reactor;

pub use listener::Endpoint;
pub use reactor::{Handler, Reactor, ShutdownHandle};
