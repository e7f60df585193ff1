use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum_macros::{Display, EnumString};

use super::SessionError;
use crate::context::Context;

/// A dimension that scopes session uniqueness.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Hash, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Boundary {
    /// The flow's registered name.
    Flow,
    /// The gateway/provider the request came through.
    Gateway,
    /// The platform (`ussd`, `chat`).
    Platform,
}

/// How the conversation itself is identified.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, JsonSchema, PartialEq, Eq, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Identifier {
    /// The user's phone number; survives across provider sessions.
    Durable,
    /// The provider-issued request/session id.
    Ephemeral,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct SessionConfig {
    /// Joined in this order, before the identifier.
    pub boundaries: Vec<Boundary>,
    /// `None` lets the channel pick (chat: durable, USSD: ephemeral).
    pub identifier: Option<Identifier>,
    /// Replace phone numbers with a short digest in session keys.
    pub hash_phone_numbers: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            boundaries: vec![Boundary::Flow, Boundary::Gateway, Boundary::Platform],
            identifier: None,
            hash_phone_numbers: true,
        }
    }
}

impl SessionConfig {
    /// One session per user across platforms.
    pub fn cross_platform(mut self) -> Self {
        self.boundaries.retain(|b| *b != Boundary::Platform);
        self
    }

    /// One session per user regardless of flow, gateway or platform.
    pub fn global(mut self) -> Self {
        self.boundaries.clear();
        self
    }

    pub fn with_identifier(mut self, identifier: Identifier) -> Self {
        self.identifier = Some(identifier);
        self
    }

    /// Derives the storage key for this request.
    ///
    /// Two requests map to the same key exactly when they agree on every
    /// configured boundary and resolve to the same identifier.
    pub fn session_key(&self, ctx: &Context, default_identifier: Identifier) -> Result<String, SessionError> {
        let mut parts: Vec<String> = Vec::with_capacity(self.boundaries.len() + 1);
        for boundary in &self.boundaries {
            let value = match boundary {
                Boundary::Flow => ctx.flow().name(),
                Boundary::Gateway => ctx.request().gateway.as_str(),
                Boundary::Platform => ctx.request().platform.as_str(),
            };
            parts.push(escape(value));
        }

        let identifier = match self.identifier.unwrap_or(default_identifier) {
            Identifier::Durable => {
                let msisdn = ctx
                    .request()
                    .msisdn
                    .as_deref()
                    .filter(|m| !m.is_empty())
                    .ok_or(SessionError::MissingIdentifier("msisdn"))?;
                if self.hash_phone_numbers {
                    short_digest(msisdn)
                } else {
                    escape(msisdn)
                }
            }
            Identifier::Ephemeral => {
                let id = ctx.request().id.as_str();
                if id.is_empty() {
                    return Err(SessionError::MissingIdentifier("request id"));
                }
                escape(id)
            }
        };
        parts.push(identifier);

        Ok(parts.join(":"))
    }
}

/// First 8 hex characters of the SHA-256 of `value`.
pub fn short_digest(value: &str) -> String {
    let digest = format!("{:x}", Sha256::digest(value.as_bytes()));
    digest[..8].to_string()
}

// ':' separates parts, so it may not appear inside one.
fn escape(part: &str) -> String {
    part.replace('%', "%25").replace(':', "%3A")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Platform, RequestInfo};
    use crate::flow::Flow;
    use std::sync::Arc;

    fn ctx(flow: &str, gateway: &str, platform: Platform, msisdn: &str, id: &str) -> Context {
        let mut request = RequestInfo::new(id, gateway, platform);
        request.msisdn = Some(msisdn.to_string());
        Context::new(request, Arc::new(Flow::new(flow)), "main")
    }

    fn base() -> Context {
        ctx("welcome", "nalo", Platform::Ussd, "+233200000001", "sess-1")
    }

    #[test]
    fn test_same_inputs_same_key() {
        let config = SessionConfig::default();
        let a = config.session_key(&base(), Identifier::Durable).unwrap();
        let b = config.session_key(&base(), Identifier::Durable).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_each_boundary_changes_key() {
        let config = SessionConfig::default();
        let key = config.session_key(&base(), Identifier::Durable).unwrap();

        let variants = [
            ctx("other", "nalo", Platform::Ussd, "+233200000001", "sess-1"),
            ctx("welcome", "nsano", Platform::Ussd, "+233200000001", "sess-1"),
            ctx("welcome", "nalo", Platform::Chat, "+233200000001", "sess-1"),
            ctx("welcome", "nalo", Platform::Ussd, "+233200000002", "sess-1"),
        ];
        for variant in variants {
            assert_ne!(config.session_key(&variant, Identifier::Durable).unwrap(), key);
        }
    }

    #[test]
    fn test_durable_key_ignores_request_id() {
        let config = SessionConfig::default();
        let other_request = ctx("welcome", "nalo", Platform::Ussd, "+233200000001", "sess-2");
        assert_eq!(
            config.session_key(&base(), Identifier::Durable).unwrap(),
            config.session_key(&other_request, Identifier::Durable).unwrap()
        );
    }

    #[test]
    fn test_ephemeral_key_uses_request_id() {
        let config = SessionConfig::default();
        let key = config.session_key(&base(), Identifier::Ephemeral).unwrap();
        assert_eq!(key, "welcome:nalo:ussd:sess-1");
    }

    #[test]
    fn test_phone_numbers_are_hashed() {
        let config = SessionConfig::default();
        let key = config.session_key(&base(), Identifier::Durable).unwrap();
        assert!(!key.contains("233200000001"));
        let suffix = key.rsplit(':').next().unwrap();
        assert_eq!(suffix.len(), 8);
        assert!(suffix.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_unhashed_phone_numbers() {
        let config = SessionConfig {
            hash_phone_numbers: false,
            ..SessionConfig::default()
        };
        let key = config.session_key(&base(), Identifier::Durable).unwrap();
        assert_eq!(key, "welcome:nalo:ussd:+233200000001");
    }

    #[test]
    fn test_configured_identifier_overrides_channel_default() {
        let config = SessionConfig::default().with_identifier(Identifier::Ephemeral);
        let key = config.session_key(&base(), Identifier::Durable).unwrap();
        assert!(key.ends_with("sess-1"));
    }

    #[test]
    fn test_cross_platform_drops_platform() {
        let config = SessionConfig::default().cross_platform();
        let ussd = config.session_key(&base(), Identifier::Durable).unwrap();
        let chat = ctx("welcome", "nalo", Platform::Chat, "+233200000001", "x");
        assert_eq!(ussd, config.session_key(&chat, Identifier::Durable).unwrap());
    }

    #[test]
    fn test_global_key_is_identifier_only() {
        let config = SessionConfig::default().global();
        let key = config.session_key(&base(), Identifier::Ephemeral).unwrap();
        assert_eq!(key, "sess-1");
    }

    #[test]
    fn test_separator_cannot_forge_parts() {
        let config = SessionConfig::default().with_identifier(Identifier::Ephemeral);
        let a = ctx("a:b", "nalo", Platform::Ussd, "", "c");
        let b = ctx("a", "b:nalo", Platform::Ussd, "", "c");
        assert_ne!(
            config.session_key(&a, Identifier::Ephemeral).unwrap(),
            config.session_key(&b, Identifier::Ephemeral).unwrap()
        );
    }

    #[test]
    fn test_durable_without_msisdn_fails() {
        let config = SessionConfig::default();
        let anonymous = ctx("welcome", "nalo", Platform::Ussd, "", "sess-1");
        let err = config.session_key(&anonymous, Identifier::Durable).unwrap_err();
        assert!(matches!(err, SessionError::MissingIdentifier("msisdn")));
    }

    #[test]
    fn test_short_digest_is_stable() {
        assert_eq!(short_digest("+233200000001"), short_digest("+233200000001"));
        assert_ne!(short_digest("+233200000001"), short_digest("+233200000002"));
    }
}
