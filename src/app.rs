use chrono::{DateTime, Utc};
use flow_message::{Location, Media};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::config::PromptConfig;
use crate::context::{Context, Platform};
use crate::error::FlowError;
use crate::interrupt::{FlowResult, Interrupt};
use crate::prompt::PromptBuilder;
use crate::session::{Session, SessionError};

/// What a flow action receives.
///
/// Screens answered in an earlier request are replayed from the session, so
/// an action can be written top to bottom as if the whole conversation
/// happened in one call.
pub struct App<'a> {
    ctx: &'a Context,
    session: Session,
    input: Option<String>,
    navigation: Vec<String>,
    prompt_config: &'a PromptConfig,
    max_choices_with_media: Option<usize>,
}

impl<'a> App<'a> {
    pub fn new(
        ctx: &'a Context,
        prompt_config: &'a PromptConfig,
        max_choices_with_media: Option<usize>,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            session: ctx.session()?.clone(),
            input: ctx.input().map(String::from),
            ctx,
            navigation: Vec::new(),
            prompt_config,
            max_choices_with_media,
        })
    }

    /// Drops the request input, as after a restart.
    pub(crate) fn without_input(mut self) -> Self {
        self.input = None;
        self
    }

    /// Presents the screen `key`, or returns its stored answer.
    ///
    /// The block only runs while the screen is unanswered. It gets the
    /// pending input, which is consumed here so later screens in the same
    /// run start without input. A key may be used once per run.
    pub fn screen<T, F>(&mut self, key: &str, block: F) -> FlowResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&PromptBuilder) -> FlowResult<T>,
    {
        if self.navigation.iter().any(|visited| visited == key) {
            return Err(FlowError::DuplicateScreen(key.to_string()).into());
        }
        self.navigation.push(key.to_string());

        if let Some(stored) = self.session.get(key).filter(is_answered) {
            debug!(screen = key, "replaying stored answer");
            let value = serde_json::from_value(stored).map_err(|source| SessionError::Serialization {
                key: key.to_string(),
                source,
            })?;
            return Ok(value);
        }

        let prompt = PromptBuilder::new(self.input.take(), self.prompt_config, self.max_choices_with_media);
        let value = block(&prompt)?;
        self.session.set_as(key, &value)?;
        debug!(screen = key, "screen answered");
        Ok(value)
    }

    /// Ends the conversation with `message`.
    pub fn say<T>(&self, message: impl Into<String>) -> FlowResult<T> {
        Err(Interrupt::terminate(message))
    }

    pub fn say_with_media<T>(&self, message: impl Into<String>, media: Media) -> FlowResult<T> {
        Err(Interrupt::Terminate {
            message: message.into(),
            media: Some(media),
        })
    }

    /// Forgets the answer to the latest screen and runs the action again.
    pub fn go_back<T>(&mut self) -> FlowResult<T> {
        let Some(current) = self.navigation.last() else {
            return Err(FlowError::Usage("go_back called before any screen".into()).into());
        };
        debug!(screen = %current, "going back");
        self.session.delete(current);
        Err(Interrupt::Restart)
    }

    /// Screens visited so far in this run, oldest first.
    pub fn navigation(&self) -> &[String] {
        &self.navigation
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn context(&self) -> &Context {
        self.ctx
    }

    pub fn phone_number(&self) -> Option<&str> {
        self.ctx.request().msisdn.as_deref()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.ctx.request().message_id.as_deref()
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.ctx.request().timestamp
    }

    pub fn contact_name(&self) -> Option<&str> {
        self.ctx
            .request()
            .contact
            .as_ref()
            .and_then(|contact| contact.display_name.as_deref())
    }

    pub fn platform(&self) -> Platform {
        self.ctx.request().platform
    }

    pub fn gateway(&self) -> &str {
        &self.ctx.request().gateway
    }

    pub fn location(&self) -> Option<&Location> {
        self.ctx.request().location.as_ref()
    }

    /// Media the user sent with this request.
    pub fn media(&self) -> Option<&Media> {
        self.ctx.request().media.as_ref()
    }
}

// `false` and `0` are answers; null and empty containers are not.
fn is_answered(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Bool(_) | Value::Number(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::RequestInfo;
    use crate::flow::Flow;
    use serde_json::json;
    use std::cell::Cell;
    use std::sync::Arc;

    fn ctx(input: Option<&str>, session: &Session) -> Context {
        let mut request = RequestInfo::new("sess-1", "nalo", Platform::Ussd).with_msisdn("+233200000001");
        request.input = input.map(String::from);
        let mut ctx = Context::new(request, Arc::new(Flow::new("welcome")), "main");
        ctx.set_session(session.clone());
        ctx
    }

    #[test]
    fn test_unanswered_screen_prompts() {
        let session = Session::new("s");
        let ctx = ctx(None, &session);
        let config = PromptConfig::default();
        let mut app = App::new(&ctx, &config, None).unwrap();

        let err = app.screen("name", |p| p.ask("Name?").read()).unwrap_err();
        assert!(err.is_prompt());
        assert!(!session.contains("name"));
    }

    #[test]
    fn test_input_answers_and_is_stored() {
        let session = Session::new("s");
        let ctx = ctx(Some("Ama"), &session);
        let config = PromptConfig::default();
        let mut app = App::new(&ctx, &config, None).unwrap();

        let name: String = app.screen("name", |p| p.ask("Name?").read()).unwrap();
        assert_eq!(name, "Ama");
        assert_eq!(session.get("name"), Some(json!("Ama")));
    }

    #[test]
    fn test_input_is_consumed_by_first_unanswered_screen() {
        let session = Session::new("s");
        let ctx = ctx(Some("Ama"), &session);
        let config = PromptConfig::default();
        let mut app = App::new(&ctx, &config, None).unwrap();

        let _: String = app.screen("name", |p| p.ask("Name?").read()).unwrap();
        let err = app.screen("city", |p| p.ask("City?").read()).unwrap_err();
        assert!(err.is_prompt());
    }

    #[test]
    fn test_answered_screen_skips_block() {
        let session = Session::new("s");
        session.set("name", json!("Ama"));
        let ctx = ctx(Some("ignored"), &session);
        let config = PromptConfig::default();
        let mut app = App::new(&ctx, &config, None).unwrap();

        let calls = Cell::new(0);
        let name: String = app
            .screen("name", |p| {
                calls.set(calls.get() + 1);
                p.ask("Name?").read()
            })
            .unwrap();
        assert_eq!(name, "Ama");
        assert_eq!(calls.get(), 0);
    }

    #[test]
    fn test_false_is_an_answer() {
        let session = Session::new("s");
        session.set("agree", json!(false));
        session.set("blank", json!(""));
        let ctx = ctx(None, &session);
        let config = PromptConfig::default();
        let mut app = App::new(&ctx, &config, None).unwrap();

        let agree: bool = app.screen("agree", |p| p.yes_no("Agree?")).unwrap();
        assert!(!agree);
        assert!(app.screen::<String, _>("blank", |p| p.ask("Blank?").read()).unwrap_err().is_prompt());
    }

    #[test]
    fn test_duplicate_screen_is_rejected() {
        let session = Session::new("s");
        session.set("name", json!("Ama"));
        let ctx = ctx(None, &session);
        let config = PromptConfig::default();
        let mut app = App::new(&ctx, &config, None).unwrap();

        let _: String = app.screen("name", |p| p.ask("Name?").read()).unwrap();
        let err = app.screen::<String, _>("name", |p| p.ask("Name?").read()).unwrap_err();
        assert!(matches!(err, Interrupt::Failed(FlowError::DuplicateScreen(ref key)) if key == "name"));
    }

    #[test]
    fn test_go_back_clears_latest_screen() {
        let session = Session::new("s");
        session.set("name", json!("Ama"));
        session.set("city", json!("Accra"));
        let ctx = ctx(None, &session);
        let config = PromptConfig::default();
        let mut app = App::new(&ctx, &config, None).unwrap();

        let _: String = app.screen("name", |p| p.ask("Name?").read()).unwrap();
        let _: String = app.screen("city", |p| p.ask("City?").read()).unwrap();
        let err = app.go_back::<()>().unwrap_err();

        assert!(matches!(err, Interrupt::Restart));
        assert_eq!(session.get("name"), Some(json!("Ama")));
        assert!(!session.contains("city"));
    }

    #[test]
    fn test_go_back_without_screen_is_usage_error() {
        let session = Session::new("s");
        let ctx = ctx(None, &session);
        let config = PromptConfig::default();
        let mut app = App::new(&ctx, &config, None).unwrap();
        let err = app.go_back::<()>().unwrap_err();
        assert!(matches!(err, Interrupt::Failed(FlowError::Usage(_))));
    }

    #[test]
    fn test_say_terminates() {
        let session = Session::new("s");
        let ctx = ctx(None, &session);
        let config = PromptConfig::default();
        let app = App::new(&ctx, &config, None).unwrap();
        let err = app.say::<()>("Bye").unwrap_err();
        assert!(matches!(err, Interrupt::Terminate { ref message, media: None } if message == "Bye"));
    }

    #[test]
    fn test_request_accessors() {
        let session = Session::new("s");
        let ctx = ctx(None, &session);
        let config = PromptConfig::default();
        let app = App::new(&ctx, &config, None).unwrap();
        assert_eq!(app.phone_number(), Some("+233200000001"));
        assert_eq!(app.gateway(), "nalo");
        assert_eq!(app.platform(), Platform::Ussd);
        assert!(app.contact_name().is_none());
        assert!(app.media().is_none());
    }
}
