//! Remote aggregation gateway.
//!
//! Two JSON-over-POST operations:
//! - retrieve: `{userId}` → a link token or a ready stream payload
//! - exchange: `{publicToken, userId}` → a stream payload
//!
//! Both answer with `{ response_object: { tag, data } }`.

pub mod client;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::GatewayError;

pub use client::HttpGateway;

pub const TAG_LINK_TOKEN: &str = "link_token";
pub const TAG_RECURRING_DATA: &str = "recurring_data";

/// Error code the aggregator uses for a spent or unknown public token.
pub const INVALID_PUBLIC_TOKEN: &str = "INVALID_PUBLIC_TOKEN";

/// A successfully tagged gateway answer.
#[derive(Debug, Clone, PartialEq)]
pub enum GatewayResponse {
    /// The user must link a bank before data is available.
    LinkToken(String),
    /// Raw aggregator stream payload, to be normalized.
    RecurringData(Value),
}

#[async_trait]
pub trait RecurringGateway: Send + Sync {
    async fn retrieve(&self, identity: &str) -> Result<GatewayResponse, GatewayError>;

    /// Trade a one-time linking credential for a stream payload.
    async fn exchange(&self, identity: &str, public_token: &str) -> Result<Value, GatewayError>;
}

#[async_trait]
impl<G: RecurringGateway + ?Sized> RecurringGateway for std::sync::Arc<G> {
    async fn retrieve(&self, identity: &str) -> Result<GatewayResponse, GatewayError> {
        (**self).retrieve(identity).await
    }

    async fn exchange(&self, identity: &str, public_token: &str) -> Result<Value, GatewayError> {
        (**self).exchange(identity, public_token).await
    }
}

/// Parse a `{ response_object: { tag, data } }` envelope.
pub fn parse_envelope(body: &Value) -> Result<GatewayResponse, GatewayError> {
    let object = body
        .get("response_object")
        .filter(|v| v.is_object())
        .ok_or_else(|| GatewayError::MalformedResponse("missing response_object".into()))?;

    let tag = object
        .get("tag")
        .and_then(Value::as_str)
        .ok_or_else(|| GatewayError::MalformedResponse("missing tag".into()))?;

    match tag {
        TAG_LINK_TOKEN => object
            .get("data")
            .and_then(|d| d.get("link_token"))
            .and_then(Value::as_str)
            .filter(|t| !t.trim().is_empty())
            .map(|t| GatewayResponse::LinkToken(t.to_string()))
            .ok_or_else(|| GatewayError::MalformedResponse("link_token tag without a token".into())),
        TAG_RECURRING_DATA => Ok(GatewayResponse::RecurringData(
            object.get("data").cloned().unwrap_or(Value::Null),
        )),
        other => Err(GatewayError::MalformedResponse(format!("unknown tag '{}'", other))),
    }
}

/// Classify a non-success exchange answer.
///
/// 409 or an `INVALID_PUBLIC_TOKEN` error code means the credential was
/// spent or never valid; everything else is a plain status failure.
pub fn classify_exchange_failure(status: u16, body: &str) -> GatewayError {
    let code = serde_json::from_str::<Value>(body).ok().and_then(|v| {
        ["error_code", "code"]
            .iter()
            .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
    });

    if status == 409 || code.as_deref() == Some(INVALID_PUBLIC_TOKEN) {
        return GatewayError::CredentialRejected(code.unwrap_or_else(|| format!("HTTP {}", status)));
    }

    GatewayError::Status {
        status,
        body: body.to_string(),
    }
}
