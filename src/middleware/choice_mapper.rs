use std::collections::BTreeMap;

use async_trait::async_trait;
use flow_message::{Choices, Response};
use tracing::debug;

use crate::context::Context;
use crate::error::Result;
use crate::pipeline::{Middleware, Next};

/// Session key holding the token → choice key map of the last screen.
pub const CHOICE_MAPPING_KEY: &str = "ussd.choice_mapping";

/// Replaces choice keys with the numbers `1..N` a keypad user can type,
/// and translates the typed number back on the next request.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChoiceMapper;

#[async_trait]
impl Middleware for ChoiceMapper {
    fn name(&self) -> &'static str {
        "choice_mapper"
    }

    async fn call(&self, ctx: &mut Context, next: Next<'_>) -> Result<Response> {
        let session = ctx.session()?.clone();

        let mapping: Option<BTreeMap<String, String>> = session.get_as(CHOICE_MAPPING_KEY)?;
        let input = ctx.input().map(str::trim).filter(|input| !input.is_empty()).map(String::from);
        if let (Some(mapping), Some(input)) = (mapping, input) {
            match mapping.get(&input) {
                Some(key) => {
                    debug!(token = %input, choice = %key, "mapped choice token");
                    ctx.set_input(Some(key.clone()));
                }
                None => {
                    debug!(input = %input, "input is not a choice token, dropping mapping");
                    session.delete(CHOICE_MAPPING_KEY);
                }
            }
        }

        let mut response = next.run(ctx).await?;

        match response.choices.take().filter(|choices| !choices.is_empty()) {
            Some(choices) => {
                let mut mapping = BTreeMap::new();
                let mut numbered = Choices::new();
                for (i, choice) in choices.iter().enumerate() {
                    let token = (i + 1).to_string();
                    mapping.insert(token.clone(), choice.key.clone());
                    numbered.insert(token, choice.label.clone());
                }
                session.set_as(CHOICE_MAPPING_KEY, &mapping)?;
                response.choices = Some(numbered);
            }
            None => session.delete(CHOICE_MAPPING_KEY),
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{Platform, RequestInfo};
    use crate::flow::Flow;
    use crate::pipeline::{Endpoint, Pipeline};
    use crate::session::Session;
    use serde_json::json;
    use std::sync::Arc;

    /// Asks for a country until it gets a valid key, then echoes it.
    struct Countries {
        choices: Choices,
    }

    #[async_trait]
    impl Endpoint for Countries {
        async fn call(&self, ctx: &mut Context) -> Result<Response> {
            match ctx.input() {
                Some(input) if self.choices.contains_key(input) => Ok(Response::terminal(input.to_string(), None)),
                _ => Ok(Response::prompt("Country?", Some(self.choices.clone()), None)),
            }
        }
    }

    fn ctx(input: Option<&str>, session: &Session) -> Context {
        let mut request = RequestInfo::new("1", "nalo", Platform::Ussd);
        request.input = input.map(String::from);
        let mut ctx = Context::new(request, Arc::new(Flow::new("f")), "main");
        ctx.set_session(session.clone());
        ctx
    }

    fn pipeline(choices: Choices) -> Pipeline {
        Pipeline::builder().with(ChoiceMapper).build(Countries { choices })
    }

    #[tokio::test]
    async fn test_choices_are_renumbered() {
        let session = Session::new("s");
        let pipeline = pipeline(Choices::pairs([("gh", "Ghana"), ("ng", "Nigeria")]));

        let response = pipeline.call(&mut ctx(None, &session)).await.unwrap();

        assert_eq!(response.choices, Some(Choices::pairs([("1", "Ghana"), ("2", "Nigeria")])));
        assert_eq!(session.get(CHOICE_MAPPING_KEY), Some(json!({"1": "gh", "2": "ng"})));
    }

    #[tokio::test]
    async fn test_token_resolves_to_original_key() {
        for choices in [
            Choices::list(["Ghana", "Nigeria", "Togo"]),
            Choices::pairs([("gh", "Ghana"), ("ng", "Nigeria"), ("tg", "Togo")]),
        ] {
            let session = Session::new("s");
            let pipeline = pipeline(choices.clone());
            pipeline.call(&mut ctx(None, &session)).await.unwrap();

            let response = pipeline.call(&mut ctx(Some("3"), &session)).await.unwrap();

            let expected = choices.keys().nth(2).unwrap().to_string();
            assert_eq!(response.message, expected);
            assert!(!session.contains(CHOICE_MAPPING_KEY));
        }
    }

    #[tokio::test]
    async fn test_unknown_token_drops_stale_mapping() {
        let session = Session::new("s");
        session.set(CHOICE_MAPPING_KEY, json!({"1": "gh"}));
        let pipeline = Pipeline::builder().with(ChoiceMapper).build(Countries {
            choices: Choices::new(),
        });

        let mut ctx = ctx(Some("Accra"), &session);
        let response = pipeline.call(&mut ctx).await.unwrap();

        assert_eq!(ctx.input(), Some("Accra"));
        assert!(response.choices.is_none());
        assert!(!session.contains(CHOICE_MAPPING_KEY));
    }
}
