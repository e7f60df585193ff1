use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use flow_message::{Location, Media, Participant};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum_macros::{Display, EnumString};

use crate::flow::Flow;
use crate::session::{Session, SessionError};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Platform {
    /// Synchronous, length-constrained, numeric-input sessions.
    Ussd,
    /// Asynchronous messaging with native widgets.
    Chat,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Ussd => "ussd",
            Platform::Chat => "chat",
        }
    }
}

/// Transport metadata a gateway extracts from one inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestInfo {
    /// Stable per-conversation id issued by the provider.
    pub id: String,
    /// The user's phone number, normalized to E.164 where possible.
    pub msisdn: Option<String>,
    /// Which gateway produced this request.
    pub gateway: String,
    pub platform: Platform,
    /// `None` on a fresh conversation.
    pub input: Option<String>,
    pub message_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub contact: Option<Participant>,
    pub location: Option<Location>,
    pub media: Option<Media>,
}

impl RequestInfo {
    pub fn new(id: impl Into<String>, gateway: impl Into<String>, platform: Platform) -> Self {
        Self {
            id: id.into(),
            msisdn: None,
            gateway: gateway.into(),
            platform,
            input: None,
            message_id: None,
            timestamp: Utc::now(),
            contact: None,
            location: None,
            media: None,
        }
    }

    pub fn with_msisdn(mut self, msisdn: impl Into<String>) -> Self {
        self.msisdn = Some(msisdn.into());
        self
    }

    pub fn with_input(mut self, input: impl Into<String>) -> Self {
        self.input = Some(input.into());
        self
    }
}

/// Per-request state owned by the pipeline. Never persisted.
///
/// The core fields are typed; anything else a middleware wants to hand to
/// the next one goes into the dotted-key bag via [`Context::insert`].
#[derive(Debug, Clone)]
pub struct Context {
    request: RequestInfo,
    flow: Arc<Flow>,
    action: String,
    session: Option<Session>,
    extensions: HashMap<String, Value>,
}

impl Context {
    pub fn new(request: RequestInfo, flow: Arc<Flow>, action: impl Into<String>) -> Self {
        Self {
            request,
            flow,
            action: action.into(),
            session: None,
            extensions: HashMap::new(),
        }
    }

    pub fn request(&self) -> &RequestInfo {
        &self.request
    }

    pub fn flow(&self) -> &Arc<Flow> {
        &self.flow
    }

    pub fn action(&self) -> &str {
        &self.action
    }

    pub fn input(&self) -> Option<&str> {
        self.request.input.as_deref()
    }

    pub fn set_input(&mut self, input: Option<String>) {
        self.request.input = input;
    }

    pub fn session(&self) -> Result<&Session, SessionError> {
        self.session
            .as_ref()
            .ok_or(SessionError::Unavailable("no session attached to this request".into()))
    }

    pub fn set_session(&mut self, session: Session) {
        self.session = Some(session);
    }

    /// Reads a value by its dotted name (`request.msisdn`, `session.id`,
    /// `flow.action`, ...), falling back to values stored with `insert`.
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "request.id" => Some(json!(self.request.id)),
            "request.msisdn" => self.request.msisdn.as_ref().map(|m| json!(m)),
            "request.gateway" => Some(json!(self.request.gateway)),
            "request.platform" => Some(json!(self.request.platform.as_str())),
            "request.input" => self.request.input.as_ref().map(|i| json!(i)),
            "request.message_id" => self.request.message_id.as_ref().map(|m| json!(m)),
            "request.timestamp" => Some(json!(self.request.timestamp.to_rfc3339())),
            "session.id" => self.session.as_ref().map(|s| json!(s.id())),
            "flow.name" => Some(json!(self.flow.name())),
            "flow.action" => Some(json!(self.action)),
            _ => self.extensions.get(key).cloned(),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.extensions.insert(key.into(), value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> Context {
        let request = RequestInfo::new("sess-9", "nalo", Platform::Ussd)
            .with_msisdn("+233200000001")
            .with_input("2");
        Context::new(request, Arc::new(Flow::new("welcome")), "main")
    }

    #[test]
    fn test_dotted_lookup_of_core_fields() {
        let ctx = ctx();
        assert_eq!(ctx.get("request.id"), Some(json!("sess-9")));
        assert_eq!(ctx.get("request.msisdn"), Some(json!("+233200000001")));
        assert_eq!(ctx.get("request.platform"), Some(json!("ussd")));
        assert_eq!(ctx.get("flow.name"), Some(json!("welcome")));
        assert_eq!(ctx.get("flow.action"), Some(json!("main")));
        assert_eq!(ctx.get("session.id"), None);
    }

    #[test]
    fn test_extension_values() {
        let mut ctx = ctx();
        ctx.insert("tenant.id", json!("acme"));
        assert_eq!(ctx.get("tenant.id"), Some(json!("acme")));
        assert_eq!(ctx.get("tenant.missing"), None);
    }

    #[test]
    fn test_session_required() {
        let mut ctx = ctx();
        assert!(ctx.session().is_err());
        ctx.set_session(Session::new("k"));
        assert_eq!(ctx.get("session.id"), Some(json!("k")));
    }

    #[test]
    fn test_input_can_be_rewritten() {
        let mut ctx = ctx();
        ctx.set_input(Some("Yes".into()));
        assert_eq!(ctx.input(), Some("Yes"));
        ctx.set_input(None);
        assert_eq!(ctx.get("request.input"), None);
    }
}
