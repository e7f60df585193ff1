//! Transport adapters.
//!
//! A gateway turns a provider's wire request into [`RequestInfo`] and the
//! pipeline's [`Response`] back into the provider's wire reply.

pub mod chat;
pub mod nalo;

use flow_message::Response;
use thiserror::Error;

use crate::context::{Platform, RequestInfo};
use crate::render::RenderError;

pub use chat::{ChatInbound, ChatJsonGateway, ChatOutbound};
pub use nalo::{NaloGateway, NaloReply, NaloRequest};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("request is missing `{0}`")]
    MissingField(&'static str),

    #[error("malformed request: {0}")]
    Malformed(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Render(#[from] RenderError),
}

pub trait Gateway: Send + Sync + 'static {
    type Request: Send;
    type Reply: Send;

    /// The tag sessions are scoped by (e.g. `nalo`).
    fn name(&self) -> &str;

    fn platform(&self) -> Platform;

    fn parse(&self, request: Self::Request) -> Result<RequestInfo, GatewayError>;

    fn reply(&self, request: &RequestInfo, response: Response) -> Result<Self::Reply, GatewayError>;
}

/// Best-effort E.164: drops separators and turns `00` or a bare number
/// into a `+` prefix.
pub fn normalize_msisdn(raw: &str) -> String {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '.'))
        .collect();
    if let Some(rest) = compact.strip_prefix("00") {
        return format!("+{rest}");
    }
    if !compact.is_empty() && compact.chars().all(|c| c.is_ascii_digit()) {
        return format!("+{compact}");
    }
    compact
}
