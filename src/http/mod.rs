//! HTTP protocol implementation.
//!
//! A deliberately small HTTP/1.x subset: enough to parse a start line,
//! headers and an optional sized body, and to answer with a diagnostic page.
//!
//! # Architecture
//!
//! - **`connection`**: per-socket state machine driven by readiness events
//! - **`parser`**: parses requests (and response status lines) from byte buffers
//! - **`request`**: request representation, headers and query parameters
//! - **`response`**: response representation with builder pattern
//! - **`status`**: the registry of known status codes
//! - **`echo`**: builds the diagnostic echo and protocol-error responses
//! - **`writer`**: serializes responses and tracks partial writes
//!
//! # Connection State Machine
//!
//! ```text
//!        ┌─────────────┐
//!        │   Reading   │ ← READABLE interest, buffer until a request parses
//!        └──────┬──────┘
//!               │ Request parsed        (protocol error → error response)
//!               ▼
//!        ┌──────────────────┐
//!        │   Processing     │ ← Build echo response
//!        └──────┬───────────┘
//!               │ Response ready
//!               ▼
//!        ┌──────────────────┐
//!        │    Writing       │ ← WRITABLE interest while the socket pushes back
//!        └──────┬───────────┘
//!               │ Response sent
//!               ├─ Keep-Alive → Reading (same connection)
//!               └─ Close → Closed (deregistered)
//! ```
//!
//! A zero-byte read in `Reading` goes straight to `Closed` without a response.

pub mod connection;
pub mod echo;
pub mod parser;
pub mod request;
pub mod response;
pub mod status;
pub mod writer;
