//! Common utilities shared by the CLI, the console and the mock engine

pub mod config;
pub mod error;
pub mod logging;
pub mod paths;

pub use error::{Error, Result};

/// Parse a "listening at:" address from a server's startup output.
/// Handles the unspecified IPv4/IPv6 forms by converting them to loopback.
pub fn parse_listen_address(line: &str) -> Option<String> {
    let addr_start = line.find("listening at:")?;
    let addr = line[addr_start + "listening at:".len()..].trim();
    let addr = if let Some(port) = addr.strip_prefix("[::]:") {
        format!("127.0.0.1:{}", port)
    } else if let Some(port) = addr.strip_prefix("0.0.0.0:") {
        format!("127.0.0.1:{}", port)
    } else {
        addr.to_string()
    };
    Some(addr)
}
