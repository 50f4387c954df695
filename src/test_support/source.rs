use crate::api::{ClientError, TelemetrySource};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Canned {
    Json(Vec<Value>),
    Text(Vec<String>),
    Remote(String),
    Undecodable(String),
}

/// Telemetry source answering each action with a canned response.
///
/// Unknown actions are answered with a remote error, matching what the live
/// API does for an unrecognised `act`.
#[derive(Debug, Default)]
pub struct StaticSource {
    responses: HashMap<String, Canned>,
    requests: Mutex<Vec<String>>,
}

impl StaticSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_json(mut self, action: &str, records: Vec<Value>) -> Self {
        self.responses.insert(action.to_string(), Canned::Json(records));
        self
    }

    /// Answer `action` with a text body; lines are taken as already split.
    pub fn with_text<I, L>(mut self, action: &str, lines: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<String>,
    {
        let lines = lines.into_iter().map(Into::into).collect();
        self.responses.insert(action.to_string(), Canned::Text(lines));
        self
    }

    pub fn with_remote_error(mut self, action: &str, message: &str) -> Self {
        self.responses.insert(action.to_string(), Canned::Remote(message.to_string()));
        self
    }

    pub fn with_decode_error(mut self, action: &str, message: &str) -> Self {
        self.responses.insert(action.to_string(), Canned::Undecodable(message.to_string()));
        self
    }

    /// Actions requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }

    fn respond(&self, action: &str) -> Result<Canned, ClientError> {
        self.requests.lock().push(action.to_string());

        match self.responses.get(action) {
            Some(Canned::Remote(message)) => Err(ClientError::Remote(message.clone())),
            Some(Canned::Undecodable(message)) => Err(ClientError::Decode(message.clone())),
            Some(canned) => Ok(canned.clone()),
            None => Err(ClientError::Remote(format!("unknown action {action}"))),
        }
    }
}

impl TelemetrySource for StaticSource {
    async fn fetch_json_records(&self, action: &str) -> Result<Vec<Value>, ClientError> {
        match self.respond(action)? {
            Canned::Json(records) => Ok(records),
            _ => Err(ClientError::Decode(format!("{action} is not a JSON action"))),
        }
    }

    async fn fetch_text_records(&self, action: &str) -> Result<Vec<String>, ClientError> {
        match self.respond(action)? {
            Canned::Text(lines) => Ok(lines),
            _ => Err(ClientError::Decode(format!("{action} is not a text action"))),
        }
    }
}
