//! Status Echo - readiness-multiplexed HTTP echo server
//!
//! A single-threaded reactor answering every request with an HTML page that
//! describes it, using the status code the client asks for via `?status=`.

pub mod config;
pub mod http;
pub mod server;
