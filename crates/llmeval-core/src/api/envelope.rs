//! The `{ success, data }` wrapper most backend endpoints return.
//!
//! Bodies are classified once, at the client boundary. An object carrying a
//! boolean `success` is an envelope; anything else is a bare payload and is
//! treated as a success.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use super::ApiError;

const DEFAULT_FAILURE_MESSAGE: &str = "Request failed";

#[derive(Debug, Clone, PartialEq)]
pub enum Envelope<T> {
    Success { data: T },
    Failure { message: String },
}

impl Envelope<Value> {
    pub fn from_body(body: Value) -> Self {
        match body {
            Value::Object(mut map) => match map.get("success").and_then(Value::as_bool) {
                Some(true) => Envelope::Success {
                    data: map.remove("data").unwrap_or(Value::Null),
                },
                Some(false) => Envelope::Failure {
                    message: failure_message(&map),
                },
                None => Envelope::Success {
                    data: Value::Object(map),
                },
            },
            other => Envelope::Success { data: other },
        }
    }

    /// Like `from_body`, but a body without a boolean `success` is an error
    /// instead of a bare payload.
    pub fn from_enveloped_body(body: Value) -> Result<Self, ApiError> {
        if !body.get("success").is_some_and(Value::is_boolean) {
            return Err(ApiError::InvalidResponse(
                "Expected a { success, data } envelope".to_string(),
            ));
        }
        Ok(Self::from_body(body))
    }

    /// Deserialize the success payload into `T`.
    pub fn decode<T: DeserializeOwned>(self) -> Result<Envelope<T>, ApiError> {
        match self {
            Envelope::Success { data } => serde_json::from_value(data)
                .map(|data| Envelope::Success { data })
                .map_err(|e| ApiError::InvalidResponse(format!("Unexpected payload shape: {}", e))),
            Envelope::Failure { message } => Ok(Envelope::Failure { message }),
        }
    }
}

impl<T> Envelope<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, Envelope::Success { .. })
    }

    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            Envelope::Success { data } => Ok(data),
            Envelope::Failure { message } => Err(ApiError::Rejected(message)),
        }
    }
}

fn failure_message(map: &Map<String, Value>) -> String {
    ["message", "error"]
        .iter()
        .find_map(|field| map.get(*field).and_then(Value::as_str))
        .filter(|message| !message.is_empty())
        .unwrap_or(DEFAULT_FAILURE_MESSAGE)
        .to_string()
}
