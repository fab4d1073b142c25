//! Control protocol message types
//!
//! A request addresses a capability as `target` + `method` with a JSON object
//! of parameters. A response is a JSON object carrying at least `success`,
//! an `error` string on failure, and engine-defined payload fields otherwise.
//! Responses carry no request identifier; correlation is purely positional.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::common::Result;

/// Request sent to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    pub target: String,
    pub method: String,
    #[serde(default)]
    pub params: Map<String, Value>,
}

impl Request {
    pub fn new(target: impl Into<String>, method: impl Into<String>, params: Map<String, Value>) -> Self {
        Self {
            target: target.into(),
            method: method.into(),
            params,
        }
    }

    /// The liveness probe issued after every successful connect
    pub fn ping() -> Self {
        Self::new("system", "ping", Map::new())
    }

    /// Serialize as a single wire line, without terminator
    pub fn to_line(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.target, self.method)
    }
}

/// Well-formed response from the engine
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Application-level success flag reported by the engine
    pub success: bool,
    /// Error message reported by the engine
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Every other field of the response
    #[serde(flatten)]
    pub payload: Map<String, Value>,
}

impl Response {
    /// Interpret a response line
    ///
    /// Fails with a description when the text is not a JSON object. A missing
    /// `success` field counts as `false`; a non-string `error` is kept as its
    /// JSON rendering.
    pub fn parse(raw: &str) -> std::result::Result<Self, String> {
        let value: Value = serde_json::from_str(raw).map_err(|e| format!("invalid JSON: {}", e))?;

        let Value::Object(mut payload) = value else {
            return Err("response is not a JSON object".to_string());
        };

        let success = payload
            .remove("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let error = payload.remove("error").and_then(|v| match v {
            Value::Null => None,
            Value::String(s) => Some(s),
            other => Some(other.to_string()),
        });

        Ok(Self {
            success,
            error,
            payload,
        })
    }

    /// Error message to show for an application-level failure
    pub fn error_message(&self) -> &str {
        self.error.as_deref().unwrap_or("Unknown error")
    }
}

/// Result of one protocol exchange
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// A well-formed response arrived; check `response.success` for the
    /// application-level result
    Success { response: Response, raw: String },
    /// Something arrived but it was not a valid response
    Failure { error: String, raw: String },
    /// No response arrived, even after the reconnect-and-resend attempt
    TransportFailure { error: String },
}

impl Outcome {
    /// Classify a received line
    pub fn from_raw(raw: String) -> Self {
        match Response::parse(&raw) {
            Ok(response) => Self::Success { response, raw },
            Err(error) => Self::Failure { error, raw },
        }
    }

    /// Whether the exchange worked and the engine reported success
    pub fn is_pass(&self) -> bool {
        matches!(self, Self::Success { response, .. } if response.success)
    }

    /// The response, if one was parsed
    pub fn response(&self) -> Option<&Response> {
        match self {
            Self::Success { response, .. } => Some(response),
            _ => None,
        }
    }

    /// Raw response text, if anything was received
    pub fn raw(&self) -> Option<&str> {
        match self {
            Self::Success { raw, .. } | Self::Failure { raw, .. } => Some(raw),
            Self::TransportFailure { .. } => None,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success { response, .. } if response.success => {
                write!(f, "ok {}", Value::Object(response.payload.clone()))
            }
            Self::Success { response, .. } => {
                write!(f, "remote error: {}", response.error_message())
            }
            Self::Failure { error, raw } => write!(f, "malformed response ({}): {}", error, raw),
            Self::TransportFailure { error } => write!(f, "transport error: {}", error),
        }
    }
}
