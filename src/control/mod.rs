//! Control session with the automation engine
//!
//! A single TCP stream carries newline-delimited JSON: one request line,
//! then exactly one response line. [`Session`] layers connection state and
//! the reconnect-and-resend policy on top of a [`Transport`].

pub mod codec;
pub mod protocol;
pub mod session;
pub mod transport;

#[cfg(test)]
pub(crate) mod testkit;

pub use protocol::{Outcome, Request, Response};
pub use session::{Session, SessionOptions, SessionState};
pub use transport::{Connector, Endpoint, TcpConnector, Transport};
