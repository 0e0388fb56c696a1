//! JSON envelopes wrapping every response body.
//!
//! ```text
//! {"success": true,  "data": ..., "meta": {...}}
//! {"success": false, "error": {"code": ..., "message": ...}}
//! ```

use actix_web::HttpResponse;
use serde::Serialize;
use serde_json::{Map, Value};
use utoipa::ToSchema;

use crate::domain::Error;

/// Successful response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct SuccessEnvelope<T> {
    pub success: bool,
    pub data: T,
    #[schema(value_type = Object)]
    pub meta: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl<T: Serialize> SuccessEnvelope<T> {
    pub fn new(data: T) -> Self {
        Self {
            success: true,
            data,
            meta: Map::new(),
            message: None,
        }
    }

    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// `200 OK` carrying this envelope.
    pub fn into_response(self) -> HttpResponse {
        HttpResponse::Ok().json(self)
    }
}

/// Failure response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct FailureEnvelope {
    pub success: bool,
    pub error: Error,
}

impl FailureEnvelope {
    pub fn new(error: Error) -> Self {
        Self {
            success: false,
            error,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    fn success_envelope_has_empty_meta() {
        let body = serde_json::to_value(SuccessEnvelope::new(json!({ "a": 1 }))).expect("json");
        assert_eq!(body, json!({ "success": true, "data": { "a": 1 }, "meta": {} }));
    }

    #[rstest]
    fn message_is_included_when_set() {
        let body = serde_json::to_value(SuccessEnvelope::new(1).with_message("done")).expect("json");
        assert_eq!(body.get("message"), Some(&json!("done")));
    }

    #[rstest]
    fn failure_envelope_nests_the_error() {
        let body =
            serde_json::to_value(FailureEnvelope::new(Error::not_found("gone"))).expect("json");
        assert_eq!(body.get("success"), Some(&json!(false)));
        assert_eq!(body.pointer("/error/code"), Some(&json!("not_found")));
        assert_eq!(body.pointer("/error/message"), Some(&json!("gone")));
    }
}
