use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const VALIDATION_ERRORS_MESSAGE: &str = "Validation Errors";

/// Uniform reply body for every handled request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub success: bool,
    pub status_code: u16,
    pub message: String,
    pub result: Value,
}

impl ResponseEnvelope {
    pub fn ok(result: Value) -> Self {
        Self {
            success: true,
            status_code: 200,
            message: "Success".to_string(),
            result,
        }
    }

    pub fn created(result: Value) -> Self {
        Self {
            success: true,
            status_code: 201,
            message: "Created".to_string(),
            result,
        }
    }

    pub fn failure(status_code: u16, message: impl Into<String>, result: Value) -> Self {
        Self {
            success: false,
            status_code,
            message: message.into(),
            result,
        }
    }

    pub fn validation_errors(messages: Vec<String>) -> Self {
        Self::failure(
            400,
            VALIDATION_ERRORS_MESSAGE,
            Value::Array(messages.into_iter().map(Value::String).collect()),
        )
    }
}
