use chrono::{DateTime, Utc};
use flow_message::{ChatPayload, Location, Media, Participant, Response};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::{Gateway, GatewayError, normalize_msisdn};
use crate::context::{Platform, RequestInfo};
use crate::render::render_chat;

/// A provider-neutral inbound chat message.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ChatInbound {
    pub message_id: String,
    /// Sender phone number.
    pub from: String,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub media: Option<Media>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
pub struct ChatOutbound {
    pub to: String,
    pub payload: ChatPayload,
}

/// Accepts [`ChatInbound`] messages and answers with [`ChatOutbound`]
/// widgets, for providers fronted by a thin JSON bridge.
#[derive(Debug, Clone)]
pub struct ChatJsonGateway {
    name: String,
}

impl Default for ChatJsonGateway {
    fn default() -> Self {
        Self::new("chat")
    }
}

impl ChatJsonGateway {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

impl Gateway for ChatJsonGateway {
    type Request = ChatInbound;
    type Reply = ChatOutbound;

    fn name(&self) -> &str {
        &self.name
    }

    fn platform(&self) -> Platform {
        Platform::Chat
    }

    fn parse(&self, message: ChatInbound) -> Result<RequestInfo, GatewayError> {
        let msisdn = normalize_msisdn(&message.from);
        if msisdn.is_empty() {
            return Err(GatewayError::MissingField("from"));
        }

        // Chat has no provider session: the sender is the conversation.
        let mut info = RequestInfo::new(msisdn.clone(), self.name.clone(), Platform::Chat).with_msisdn(msisdn.clone());
        info.message_id = Some(message.message_id);
        info.input = message.text.filter(|text| !text.trim().is_empty());
        if let Some(timestamp) = message.timestamp {
            info.timestamp = timestamp;
        }
        info.contact = Some(Participant::new(msisdn.clone(), message.contact_name, Some(msisdn)));
        info.location = message.location;
        info.media = message.media;
        Ok(info)
    }

    fn reply(&self, request: &RequestInfo, response: Response) -> Result<ChatOutbound, GatewayError> {
        let to = request.msisdn.clone().ok_or(GatewayError::MissingField("from"))?;
        Ok(ChatOutbound {
            to,
            payload: render_chat(&response)?,
        })
    }
}
