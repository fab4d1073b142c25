//! Control session
//!
//! Owns the transport to the engine and enforces the protocol's one rule:
//! exactly one request in flight, answered by exactly one line. A transport
//! failure mid-request is recovered once: the session reconnects to the last
//! endpoint and resends the same request a single time.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::sync::{watch, Mutex};

use crate::common::config::ConnectionConfig;
use crate::common::{Error, Result};

use super::protocol::{Outcome, Request};
use super::transport::{Connector, Endpoint, TcpConnector, Transport};

/// Connection state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// Timeouts applied by the session
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Bound on establishing a connection
    pub connect_timeout: Duration,
    /// Bound on each request/response exchange, `None` waits forever
    pub response_timeout: Option<Duration>,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self::from(&ConnectionConfig::default())
    }
}

impl From<&ConnectionConfig> for SessionOptions {
    fn from(config: &ConnectionConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout(),
            response_timeout: config.response_timeout(),
        }
    }
}

/// Transport plus the endpoint it was opened against.
/// Guarded as a whole so a request and its recovery are one critical section.
#[derive(Default)]
struct Link {
    transport: Option<Box<dyn Transport>>,
    endpoint: Option<Endpoint>,
}

/// A long-lived control session with the engine
pub struct Session {
    connector: Arc<dyn Connector>,
    options: SessionOptions,
    link: Mutex<Link>,
    state: watch::Sender<SessionState>,
}

impl Session {
    /// Create a disconnected session using the given connector
    pub fn new(connector: Arc<dyn Connector>, options: SessionOptions) -> Self {
        let (state, _) = watch::channel(SessionState::Disconnected);
        Self {
            connector,
            options,
            link: Mutex::new(Link::default()),
            state,
        }
    }

    /// Create a disconnected session that talks TCP
    pub fn tcp(options: SessionOptions) -> Self {
        Self::new(Arc::new(TcpConnector), options)
    }

    /// Current state, readable while a request is in flight
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == SessionState::Connected
    }

    /// Watch state transitions
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Last endpoint a connection was established to
    pub async fn endpoint(&self) -> Option<Endpoint> {
        self.link.lock().await.endpoint.clone()
    }

    /// Connect to the engine and run the liveness probe
    ///
    /// The probe is advisory: its outcome is logged and returned, but a failed
    /// probe leaves the session connected. Any existing connection is closed
    /// first.
    pub async fn connect(&self, host: &str, port: u16) -> Result<Outcome> {
        let endpoint = Endpoint::new(host, port);
        let mut link = self.link.lock().await;

        if link.transport.is_some() {
            tracing::info!("Closing existing connection before connecting to {}", endpoint);
            self.close_link(&mut link).await;
        }

        self.open(&mut link, endpoint.clone()).await?;
        tracing::info!("Connected to {}", endpoint);

        let probe = self.send_locked(&mut link, &Request::ping()).await?;
        if self.state() != SessionState::Connected {
            // The probe's transport failed and the reconnect did not recover it
            tracing::error!("Lost connection to {} during liveness probe: {}", endpoint, probe);
            return Err(Error::TransportClosed);
        }
        if probe.is_pass() {
            tracing::info!("Liveness probe: {}", probe);
        } else {
            tracing::warn!("Liveness probe failed, staying connected: {}", probe);
        }

        Ok(probe)
    }

    /// Send one request and wait for its outcome
    pub async fn request(
        &self,
        target: &str,
        method: &str,
        params: Map<String, Value>,
    ) -> Result<Outcome> {
        self.send(&Request::new(target, method, params)).await
    }

    /// Send a prepared request and wait for its outcome
    ///
    /// Fails only with [`Error::NotConnected`]; every other problem is an
    /// [`Outcome`].
    pub async fn send(&self, request: &Request) -> Result<Outcome> {
        let mut link = self.link.lock().await;
        self.send_locked(&mut link, request).await
    }

    /// Close the connection. Safe to call in any state.
    pub async fn disconnect(&self) {
        let mut link = self.link.lock().await;
        let was_open = link.transport.is_some();
        self.close_link(&mut link).await;
        if was_open {
            tracing::info!("Disconnected");
        }
    }

    async fn send_locked(&self, link: &mut Link, request: &Request) -> Result<Outcome> {
        if self.state() != SessionState::Connected || link.transport.is_none() {
            return Err(Error::NotConnected);
        }

        let line = request.to_line()?;
        tracing::debug!(">>> {}", String::from_utf8_lossy(&line));

        let first_error = match self.exchange(link, &line).await {
            Ok(raw) => return Ok(Self::classify(raw)),
            Err(e) if e.is_transport() => e,
            Err(e) => return Err(e),
        };

        tracing::warn!("Transport failed during {}: {}. Reconnecting", request, first_error);
        self.close_link(link).await;

        let Some(endpoint) = link.endpoint.clone() else {
            return Ok(Outcome::TransportFailure {
                error: first_error.to_string(),
            });
        };

        if let Err(e) = self.open(link, endpoint).await {
            tracing::error!("Reconnect failed: {}", e);
            return Ok(Outcome::TransportFailure {
                error: format!("{}; reconnect failed: {}", first_error, e),
            });
        }

        tracing::info!("Reconnected, resending {}", request);
        match self.exchange(link, &line).await {
            Ok(raw) => Ok(Self::classify(raw)),
            Err(e) => {
                tracing::error!("Resend of {} failed: {}", request, e);
                self.close_link(link).await;
                Ok(Outcome::TransportFailure {
                    error: format!("{} (after reconnect)", e),
                })
            }
        }
    }

    /// One send followed by one receive on the current transport
    async fn exchange(&self, link: &mut Link, line: &[u8]) -> Result<String> {
        let transport = link.transport.as_mut().ok_or(Error::NotConnected)?;

        let round_trip = async {
            transport.send_line(line).await?;
            transport.recv_line().await
        };

        let bytes = match self.options.response_timeout {
            Some(limit) => tokio::time::timeout(limit, round_trip)
                .await
                .map_err(|_| Error::ResponseTimeout(limit))??,
            None => round_trip.await?,
        };

        let raw = String::from_utf8_lossy(&bytes).into_owned();
        tracing::debug!("<<< {}", raw);
        Ok(raw)
    }

    fn classify(raw: String) -> Outcome {
        let outcome = Outcome::from_raw(raw);
        if let Outcome::Failure { error, .. } = &outcome {
            tracing::warn!("Malformed response: {}", error);
        }
        outcome
    }

    async fn open(&self, link: &mut Link, endpoint: Endpoint) -> Result<()> {
        self.state.send_replace(SessionState::Connecting);
        match self
            .connector
            .connect(&endpoint, self.options.connect_timeout)
            .await
        {
            Ok(transport) => {
                link.transport = Some(transport);
                link.endpoint = Some(endpoint);
                self.state.send_replace(SessionState::Connected);
                Ok(())
            }
            Err(e) => {
                self.state.send_replace(SessionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn close_link(&self, link: &mut Link) {
        if let Some(mut transport) = link.transport.take() {
            transport.close().await;
        }
        self.state.send_replace(SessionState::Disconnected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::testkit::{reply, Attempt, ScriptedConnector, Step};

    const PONG: &str = r#"{"success":true,"message":"pong"}"#;
    const PING_LINE: &str = r#"{"target":"system","method":"ping","params":{}}"#;
    const GET_CLIPBOARD_LINE: &str = r#"{"target":"clipboard","method":"getClipboard","params":{}}"#;

    fn session(connector: &ScriptedConnector) -> Session {
        Session::new(Arc::new(connector.clone()), SessionOptions::default())
    }

    #[tokio::test]
    async fn test_connect_runs_probe() {
        let connector = ScriptedConnector::new(vec![Attempt::Accept(vec![reply(PONG)])]);
        let session = session(&connector);

        let probe = session.connect("127.0.0.1", 19999).await.unwrap();

        assert!(probe.is_pass());
        assert_eq!(session.state(), SessionState::Connected);
        assert_eq!(connector.sent(), vec![PING_LINE.to_string()]);
        assert_eq!(
            session.endpoint().await,
            Some(Endpoint::new("127.0.0.1", 19999))
        );
    }

    #[tokio::test]
    async fn test_connect_refused_stays_disconnected() {
        let connector = ScriptedConnector::new(vec![Attempt::Refuse]);
        let session = session(&connector);

        let err = session.connect("127.0.0.1", 19999).await.unwrap_err();

        assert!(err.is_connect());
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_probe_is_advisory() {
        let connector = ScriptedConnector::new(vec![Attempt::Accept(vec![
            reply(r#"{"success":false,"error":"busy"}"#),
            reply(r#"{"success":true,"text":"hi"}"#),
        ])]);
        let session = session(&connector);

        let probe = session.connect("127.0.0.1", 19999).await.unwrap();
        assert!(!probe.is_pass());
        assert!(session.is_connected());

        let outcome = session
            .request("clipboard", "getClipboard", Map::new())
            .await
            .unwrap();
        assert!(outcome.is_pass());
    }

    #[tokio::test]
    async fn test_connect_fails_when_probe_loses_connection() {
        let connector =
            ScriptedConnector::new(vec![Attempt::Accept(vec![Step::FailRecv]), Attempt::Refuse]);
        let session = session(&connector);

        let err = session.connect("127.0.0.1", 19999).await.unwrap_err();

        assert!(matches!(err, Error::TransportClosed));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_probe_recovered_by_reconnect_connects() {
        let connector = ScriptedConnector::new(vec![
            Attempt::Accept(vec![Step::FailRecv]),
            Attempt::Accept(vec![reply(PONG)]),
        ]);
        let session = session(&connector);

        let probe = session.connect("127.0.0.1", 19999).await.unwrap();

        assert!(probe.is_pass());
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_request_requires_connection() {
        let connector = ScriptedConnector::new(vec![]);
        let session = session(&connector);

        let err = session.request("system", "ping", Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(connector.connects(), 0);
    }

    #[tokio::test]
    async fn test_send_failure_reconnects_and_resends_once() {
        let connector = ScriptedConnector::new(vec![
            Attempt::Accept(vec![reply(PONG), Step::FailSend]),
            Attempt::Accept(vec![reply(r#"{"success":true,"text":"copied"}"#)]),
        ]);
        let session = session(&connector);
        session.connect("127.0.0.1", 19999).await.unwrap();

        let outcome = session
            .request("clipboard", "getClipboard", Map::new())
            .await
            .unwrap();

        assert!(outcome.is_pass());
        assert_eq!(outcome.response().unwrap().payload["text"], "copied");
        assert_eq!(connector.connects(), 2);
        // No probe on reconnect: only the resend reaches the new connection
        assert_eq!(
            connector.sent(),
            vec![PING_LINE.to_string(), GET_CLIPBOARD_LINE.to_string()]
        );
        assert!(session.is_connected());
    }

    #[tokio::test]
    async fn test_receive_failure_resends_same_request() {
        let connector = ScriptedConnector::new(vec![
            Attempt::Accept(vec![reply(PONG), Step::FailRecv]),
            Attempt::Accept(vec![reply(r#"{"success":true}"#)]),
        ]);
        let session = session(&connector);
        session.connect("127.0.0.1", 19999).await.unwrap();

        let outcome = session
            .request("clipboard", "getClipboard", Map::new())
            .await
            .unwrap();

        assert!(outcome.is_pass());
        assert_eq!(
            connector.sent(),
            vec![
                PING_LINE.to_string(),
                GET_CLIPBOARD_LINE.to_string(),
                GET_CLIPBOARD_LINE.to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_reconnect_failure_is_transport_failure() {
        let connector = ScriptedConnector::new(vec![
            Attempt::Accept(vec![reply(PONG), Step::FailSend]),
            Attempt::Refuse,
        ]);
        let session = session(&connector);
        session.connect("127.0.0.1", 19999).await.unwrap();

        let outcome = session.request("power", "wakeUp", Map::new()).await.unwrap();

        assert!(matches!(outcome, Outcome::TransportFailure { .. }));
        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(connector.connects(), 2);

        let err = session.request("power", "wakeUp", Map::new()).await.unwrap_err();
        assert!(matches!(err, Error::NotConnected));
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_resend_failure_does_not_retry_again() {
        let connector = ScriptedConnector::new(vec![
            Attempt::Accept(vec![reply(PONG), Step::FailRecv]),
            Attempt::Accept(vec![Step::FailRecv]),
            Attempt::Accept(vec![reply(PONG)]),
        ]);
        let session = session(&connector);
        session.connect("127.0.0.1", 19999).await.unwrap();

        let outcome = session.request("power", "wakeUp", Map::new()).await.unwrap();

        match outcome {
            Outcome::TransportFailure { error } => assert!(error.contains("after reconnect")),
            other => panic!("Expected TransportFailure, got {:?}", other),
        }
        assert_eq!(connector.connects(), 2);
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_malformed_response_keeps_raw_text() {
        let connector =
            ScriptedConnector::new(vec![Attempt::Accept(vec![reply(PONG), reply("not json")])]);
        let session = session(&connector);
        session.connect("127.0.0.1", 19999).await.unwrap();

        let outcome = session.request("system", "ping", Map::new()).await.unwrap();

        assert_eq!(outcome.raw(), Some("not json"));
        assert!(matches!(outcome, Outcome::Failure { .. }));
        assert!(session.is_connected());
        assert_eq!(connector.connects(), 1);
    }

    #[tokio::test]
    async fn test_response_timeout_triggers_recovery() {
        let connector = ScriptedConnector::new(vec![
            Attempt::Accept(vec![reply(PONG), Step::Hang]),
            Attempt::Accept(vec![reply(r#"{"success":true}"#)]),
        ]);
        let session = Session::new(
            Arc::new(connector.clone()),
            SessionOptions {
                connect_timeout: Duration::from_secs(1),
                response_timeout: Some(Duration::from_millis(50)),
            },
        );
        session.connect("127.0.0.1", 19999).await.unwrap();

        let outcome = session.request("system", "ping", Map::new()).await.unwrap();

        assert!(outcome.is_pass());
        assert_eq!(connector.connects(), 2);
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let connector = ScriptedConnector::new(vec![Attempt::Accept(vec![reply(PONG)])]);
        let session = session(&connector);

        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);

        session.connect("127.0.0.1", 19999).await.unwrap();
        session.disconnect().await;
        session.disconnect().await;
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[tokio::test]
    async fn test_concurrent_requests_alternate() {
        let connector = ScriptedConnector::new(vec![Attempt::Accept(vec![
            reply(PONG),
            reply(r#"{"success":true}"#),
            reply(r#"{"success":true}"#),
            reply(r#"{"success":true}"#),
            reply(r#"{"success":true}"#),
        ])]);
        let session = Arc::new(session(&connector));
        session.connect("127.0.0.1", 19999).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..4 {
            let session = Arc::clone(&session);
            handles.push(tokio::spawn(async move {
                session.request("system", "ping", Map::new()).await.unwrap()
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_pass());
        }

        let events = connector.events();
        assert_eq!(events.len(), 10);
        for pair in events.chunks(2) {
            assert!(pair[0].starts_with("send "));
            assert_eq!(pair[1], "recv");
        }
    }

    #[tokio::test]
    async fn test_state_is_observable() {
        let connector = ScriptedConnector::new(vec![Attempt::Accept(vec![reply(PONG)])]);
        let session = session(&connector);
        let mut states = session.subscribe();

        session.connect("127.0.0.1", 19999).await.unwrap();
        assert!(states.has_changed().unwrap());
        assert_eq!(*states.borrow_and_update(), SessionState::Connected);

        session.disconnect().await;
        assert_eq!(*states.borrow_and_update(), SessionState::Disconnected);
    }
}
