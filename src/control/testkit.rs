//! Scripted connector for exercising the session without sockets
//!
//! Each accepted connection replays its own list of steps; connect attempts
//! beyond the script are refused. Everything that happens is recorded so
//! tests can assert on reconnects and resends.

use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::common::{Error, Result};

use super::transport::{Connector, Endpoint, Transport};

/// What one connection does for the next exchange
#[derive(Debug, Clone)]
pub enum Step {
    /// Accept the send, answer with this line
    Reply(String),
    /// Fail the send
    FailSend,
    /// Accept the send, then fail the receive
    FailRecv,
    /// Accept the send, never answer
    Hang,
}

pub fn reply(line: &str) -> Step {
    Step::Reply(line.to_string())
}

/// Plan for one connect attempt
#[derive(Debug, Clone)]
pub enum Attempt {
    Refuse,
    Accept(Vec<Step>),
}

#[derive(Debug, Default)]
struct Script {
    attempts: VecDeque<Attempt>,
    connects: usize,
    sent: Vec<String>,
    events: Vec<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ScriptedConnector {
    script: Arc<Mutex<Script>>,
}

impl ScriptedConnector {
    pub fn new(attempts: Vec<Attempt>) -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                attempts: attempts.into(),
                ..Script::default()
            })),
        }
    }

    /// Number of connect attempts, refused ones included
    pub fn connects(&self) -> usize {
        self.script.lock().unwrap().connects
    }

    /// Every line the session sent, in order
    pub fn sent(&self) -> Vec<String> {
        self.script.lock().unwrap().sent.clone()
    }

    /// Interleaved send/recv log
    pub fn events(&self) -> Vec<String> {
        self.script.lock().unwrap().events.clone()
    }
}

#[async_trait]
impl Connector for ScriptedConnector {
    async fn connect(&self, endpoint: &Endpoint, _timeout: Duration) -> Result<Box<dyn Transport>> {
        let mut script = self.script.lock().unwrap();
        script.connects += 1;
        match script.attempts.pop_front() {
            Some(Attempt::Accept(steps)) => Ok(Box::new(ScriptedTransport {
                steps: steps.into(),
                script: Arc::clone(&self.script),
            })),
            Some(Attempt::Refuse) | None => Err(Error::connect_failed(
                endpoint.to_string(),
                io::Error::from(io::ErrorKind::ConnectionRefused),
            )),
        }
    }
}

struct ScriptedTransport {
    steps: VecDeque<Step>,
    script: Arc<Mutex<Script>>,
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send_line(&mut self, line: &[u8]) -> Result<()> {
        if matches!(self.steps.front(), Some(Step::FailSend)) {
            self.steps.pop_front();
            return Err(Error::Io(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        let line = String::from_utf8_lossy(line).into_owned();
        let mut script = self.script.lock().unwrap();
        script.events.push(format!("send {}", line));
        script.sent.push(line);
        Ok(())
    }

    async fn recv_line(&mut self) -> Result<Vec<u8>> {
        let step = self.steps.pop_front();
        self.script.lock().unwrap().events.push("recv".to_string());
        match step {
            Some(Step::Reply(line)) => {
                tokio::task::yield_now().await;
                Ok(line.into_bytes())
            }
            Some(Step::Hang) => std::future::pending().await,
            Some(Step::FailRecv) | Some(Step::FailSend) | None => Err(Error::TransportClosed),
        }
    }

    async fn close(&mut self) {
        self.steps.clear();
    }
}
