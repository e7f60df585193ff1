use flow_message::{Choices, Media};
use tracing::debug;

use crate::config::PromptConfig;
use crate::error::FlowError;
use crate::interrupt::{FlowResult, Interrupt};

const YES: &str = "Yes";
const NO: &str = "No";
const INVALID_SELECTION: &str = "Invalid selection:";

/// Builds the question for one screen and answers it from the pending input.
///
/// Handed to the block of [`crate::app::App::screen`]. When the request
/// carries input the builder parses and validates it; otherwise it unwinds
/// with a prompt so the question is shown to the user.
#[derive(Debug)]
pub struct PromptBuilder {
    input: Option<String>,
    combine_validation_error: bool,
    max_choices_with_media: Option<usize>,
}

impl PromptBuilder {
    pub fn new(input: Option<String>, config: &PromptConfig, max_choices_with_media: Option<usize>) -> Self {
        Self {
            input,
            combine_validation_error: config.combine_validation_error,
            max_choices_with_media,
        }
    }

    /// The raw input this screen will be answered with, if any.
    pub fn input(&self) -> Option<&str> {
        self.input.as_deref()
    }

    /// Free-form question. Answers with the raw input unless a converter is set.
    pub fn ask(&self, message: impl Into<String>) -> Ask<'_, String> {
        Ask {
            prompt: self,
            message: message.into(),
            choices: None,
            media: None,
            selection_error: None,
            parser: Box::new(|raw: &str| Ok(raw.to_string())),
            validators: Vec::new(),
        }
    }

    /// Question restricted to `choices`, answering with the chosen key.
    ///
    /// The input may name a key directly or match a label (ignoring case).
    /// Anything else re-prompts with "Invalid selection:".
    pub fn select(&self, message: impl Into<String>, choices: impl Into<Choices>) -> Ask<'_, String> {
        let mut ask = self.ask(message).choices(choices);
        ask.selection_error = Some(INVALID_SELECTION.to_string());
        ask
    }

    pub fn yes_no(&self, message: impl Into<String>) -> FlowResult<bool> {
        self.select(message, [YES, NO]).transform(|answer| answer == YES)
    }
}

type Parser<'a, T> = Box<dyn Fn(&str) -> Result<T, String> + 'a>;
type Validator<'a, T> = Box<dyn Fn(&T) -> Option<String> + 'a>;

/// A question under construction. Finish it with [`Ask::read`] or
/// [`Ask::transform`].
pub struct Ask<'a, T> {
    prompt: &'a PromptBuilder,
    message: String,
    choices: Option<Choices>,
    media: Option<Media>,
    selection_error: Option<String>,
    parser: Parser<'a, T>,
    validators: Vec<Validator<'a, T>>,
}

impl<'a, T> Ask<'a, T> {
    pub fn choices(mut self, choices: impl Into<Choices>) -> Self {
        self.choices = Some(choices.into());
        self
    }

    pub fn media(mut self, media: Media) -> Self {
        self.media = Some(media);
        self
    }

    /// Replaces the message shown when a selection does not match any choice.
    pub fn invalid_selection(mut self, message: impl Into<String>) -> Self {
        if self.selection_error.is_some() {
            self.selection_error = Some(message.into());
        }
        self
    }

    /// Coerces the raw input. Validators registered before this call are
    /// dropped since they check the previous type.
    pub fn convert<U, F>(self, convert: F) -> Ask<'a, U>
    where
        F: Fn(&str) -> U + 'a,
    {
        self.with_parser(Box::new(move |raw: &str| Ok(convert(raw))))
    }

    /// Like [`Ask::convert`], but a failed coercion re-prompts with `error`.
    pub fn parse<U>(self, error: impl Into<String>) -> Ask<'a, U>
    where
        U: std::str::FromStr,
    {
        let error = error.into();
        self.with_parser(Box::new(move |raw: &str| raw.trim().parse::<U>().map_err(|_| error.clone())))
    }

    fn with_parser<U>(self, parser: Parser<'a, U>) -> Ask<'a, U> {
        Ask {
            prompt: self.prompt,
            message: self.message,
            choices: self.choices,
            media: self.media,
            selection_error: self.selection_error,
            parser,
            validators: Vec::new(),
        }
    }

    /// Adds a check on the converted value; `Some(error)` re-prompts.
    pub fn validate<F>(mut self, validate: F) -> Self
    where
        F: Fn(&T) -> Option<String> + 'a,
    {
        self.validators.push(Box::new(validate));
        self
    }

    pub fn transform<U, F>(self, transform: F) -> FlowResult<U>
    where
        F: FnOnce(T) -> U,
    {
        self.read().map(transform)
    }

    /// Answers the question from the pending input, or unwinds with a prompt.
    pub fn read(self) -> FlowResult<T> {
        self.check_media()?;

        let prompt = self.prompt;
        let Some(raw) = prompt.input.as_deref() else {
            return Err(Interrupt::Prompt {
                message: self.message,
                choices: self.choices,
                media: self.media,
            });
        };

        let resolved = match &self.selection_error {
            Some(error) => match self.resolve_choice(raw) {
                Some(key) => key,
                None => {
                    let error = format!("{error} {raw}");
                    return Err(self.reprompt(error));
                }
            },
            None => raw.to_string(),
        };

        let value = match (self.parser)(&resolved) {
            Ok(value) => value,
            Err(error) => return Err(self.reprompt(error)),
        };

        if let Some(error) = self.validators.iter().find_map(|validate| validate(&value)) {
            return Err(self.reprompt(error));
        }

        Ok(value)
    }

    fn resolve_choice(&self, raw: &str) -> Option<String> {
        let choices = self.choices.as_ref()?;
        let raw = raw.trim();
        if choices.contains_key(raw) {
            return Some(raw.to_string());
        }
        choices
            .iter()
            .find(|choice| choice.label.eq_ignore_ascii_case(raw))
            .map(|choice| choice.key.clone())
    }

    fn check_media(&self) -> Result<(), FlowError> {
        let (Some(limit), Some(_), Some(choices)) = (self.prompt.max_choices_with_media, &self.media, &self.choices) else {
            return Ok(());
        };
        if choices.len() > limit {
            return Err(FlowError::Argument(format!(
                "media cannot be combined with more than {limit} choices (got {})",
                choices.len()
            )));
        }
        Ok(())
    }

    fn reprompt(self, error: String) -> Interrupt {
        debug!(%error, "input rejected, prompting again");
        let message = if self.prompt.combine_validation_error {
            format!("{error}\n\n{}", self.message)
        } else {
            error
        };
        Interrupt::Prompt {
            message,
            choices: self.choices,
            media: self.media,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn builder(input: Option<&str>) -> PromptBuilder {
        PromptBuilder::new(input.map(String::from), &PromptConfig::default(), Some(3))
    }

    fn prompt_message(interrupt: Interrupt) -> String {
        match interrupt {
            Interrupt::Prompt { message, .. } => message,
            other => panic!("expected prompt, got {other:?}"),
        }
    }

    #[test]
    fn test_without_input_prompts() {
        let err = builder(None).ask("What's your name?").read().unwrap_err();
        match err {
            Interrupt::Prompt { message, choices, media } => {
                assert_eq!(message, "What's your name?");
                assert!(choices.is_none());
                assert!(media.is_none());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_with_input_answers() {
        let name = builder(Some("Ama")).ask("What's your name?").read().unwrap();
        assert_eq!(name, "Ama");
    }

    #[test]
    fn test_select_resolves_key() {
        let answer = builder(Some("Yes")).select("Continue?", ["Yes", "No"]).read().unwrap();
        assert_eq!(answer, "Yes");
    }

    #[test]
    fn test_select_matches_label_to_key() {
        let choices = [("gh", "Ghana"), ("ng", "Nigeria")];
        let answer = builder(Some("nigeria")).select("Country?", choices).read().unwrap();
        assert_eq!(answer, "ng");
    }

    #[test]
    fn test_select_rejects_unknown_choice() {
        let err = builder(Some("3")).select("Continue?", ["Yes", "No"]).read().unwrap_err();
        match err {
            Interrupt::Prompt { message, choices, .. } => {
                assert_eq!(message, "Invalid selection: 3\n\nContinue?");
                assert_eq!(choices, Some(Choices::list(["Yes", "No"])));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_select_custom_error() {
        let err = builder(Some("x"))
            .select("Pick", ["a", "b"])
            .invalid_selection("Choose a or b:")
            .read()
            .unwrap_err();
        assert!(prompt_message(err).starts_with("Choose a or b: x"));
    }

    #[test]
    fn test_validation_error_replaces_question() {
        let config = PromptConfig {
            combine_validation_error: false,
        };
        let builder = PromptBuilder::new(Some("".into()), &config, None);
        let err = builder
            .ask("Name?")
            .validate(|name| name.is_empty().then(|| "Name is required".to_string()))
            .read()
            .unwrap_err();
        assert_eq!(prompt_message(err), "Name is required");
    }

    #[test]
    fn test_convert_then_validate() {
        let age = builder(Some("17"))
            .ask("Age?")
            .parse::<u32>("Enter a number")
            .validate(|age| (*age < 18).then(|| "Must be 18+".to_string()))
            .read()
            .unwrap_err();
        assert_eq!(prompt_message(age), "Must be 18+\n\nAge?");

        let age = builder(Some(" 42 ")).ask("Age?").parse::<u32>("Enter a number").read().unwrap();
        assert_eq!(age, 42);
    }

    #[test]
    fn test_failed_parse_reprompts() {
        let err = builder(Some("forty")).ask("Age?").parse::<u32>("Enter a number").read().unwrap_err();
        assert_eq!(prompt_message(err), "Enter a number\n\nAge?");
    }

    #[test]
    fn test_convert_drops_earlier_validators() {
        let value = builder(Some("abc"))
            .ask("Code?")
            .validate(|_| Some("never".to_string()))
            .convert(|raw| raw.len())
            .read()
            .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn test_transform_runs_last() {
        let upper = builder(Some("ama")).ask("Name?").transform(|name| name.to_uppercase()).unwrap();
        assert_eq!(upper, "AMA");
    }

    #[test]
    fn test_yes_no() {
        assert!(builder(Some("Yes")).yes_no("Sure?").unwrap());
        assert!(!builder(Some("no")).yes_no("Sure?").unwrap());
        assert!(builder(None).yes_no("Sure?").unwrap_err().is_prompt());
    }

    #[test]
    fn test_media_with_too_many_choices() {
        let err = builder(None)
            .select("Pick", ["a", "b", "c", "d"])
            .media(Media::image("https://example.com/a.png"))
            .read()
            .unwrap_err();
        assert!(matches!(err, Interrupt::Failed(FlowError::Argument(_))));
    }

    #[test]
    fn test_media_limit_unset_allows_any_count() {
        let builder = PromptBuilder::new(None, &PromptConfig::default(), None);
        let err = builder
            .select("Pick", ["a", "b", "c", "d"])
            .media(Media::image("https://example.com/a.png"))
            .read()
            .unwrap_err();
        assert!(err.is_prompt());
    }
}
