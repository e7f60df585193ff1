use std::time::Duration;

use async_trait::async_trait;
use flow_message::Response;
use serde_json::json;
use tracing::debug;

use crate::context::Context;
use crate::error::Result;
use crate::pipeline::{Middleware, Next};
use crate::session::{Identifier, SessionConfig, SessionStore};

/// Marks a conversation as started so it is kept before any screen is answered.
pub const STARTED_AT_KEY: &str = "session.started_at";

/// Loads the conversation's session before the rest of the chain runs and
/// writes it back afterwards.
///
/// An emptied session (e.g. after the flow terminated) is removed from the
/// store instead of saved. Nothing is written when the chain fails, so the
/// store keeps the last successful state.
pub struct SessionMiddleware {
    store: SessionStore,
    config: SessionConfig,
    default_identifier: Identifier,
    ttl: Duration,
    fresh_start: bool,
}

impl SessionMiddleware {
    pub fn new(store: SessionStore, config: SessionConfig, default_identifier: Identifier, ttl: Duration) -> Self {
        Self {
            store,
            config,
            default_identifier,
            ttl,
            fresh_start: false,
        }
    }

    /// Ignore the input of the message that opens a new conversation.
    ///
    /// Chat conversations start with whatever the user typed ("hi"), which
    /// must not answer the first screen.
    pub fn with_fresh_start(mut self) -> Self {
        self.fresh_start = true;
        self
    }
}

#[async_trait]
impl Middleware for SessionMiddleware {
    fn name(&self) -> &'static str {
        "session"
    }

    async fn call(&self, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
        let key = self.config.session_key(ctx, self.default_identifier)?;
        let session = self.store.load(&key).await?;
        ctx.set_session(session.clone());
        if self.fresh_start && !session.exists() {
            debug!(session = %key, "new conversation, ignoring opening message");
            session.set(STARTED_AT_KEY, json!(ctx.request().timestamp.to_rfc3339()));
            ctx.set_input(None);
        }

        let response = next.run(ctx).await?;

        if session.exists() {
            self.store.save(&session, self.ttl).await?;
        } else {
            debug!(session = %key, "session empty, removing");
            self.store.remove(&key).await?;
        }
        Ok(response)
    }
}
