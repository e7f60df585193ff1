use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::app::App;
use crate::error::FlowError;
use crate::interrupt::FlowResult;

/// A named entry point of a flow. Runs to completion or unwinds with an
/// [`crate::interrupt::Interrupt`]; it never returns a useful value.
pub type Action = Arc<dyn Fn(&mut App<'_>) -> FlowResult + Send + Sync>;

/// A flow: a name plus its actions, looked up by name at dispatch time.
///
/// ```ignore
/// let flow = Flow::new("welcome").action("main", |app| {
///     let name: String = app.screen("name", |p| p.ask("What's your name?").read())?;
///     app.say(format!("Hello, {name}!"))
/// });
/// ```
#[derive(Clone)]
pub struct Flow {
    name: String,
    actions: BTreeMap<String, Action>,
}

impl Flow {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            actions: BTreeMap::new(),
        }
    }

    /// Registers `action` under `name`, replacing any previous registration.
    pub fn action<F>(mut self, name: impl Into<String>, action: F) -> Self
    where
        F: Fn(&mut App<'_>) -> FlowResult + Send + Sync + 'static,
    {
        self.actions.insert(name.into(), Arc::new(action));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_action(&self, name: &str) -> bool {
        self.actions.contains_key(name)
    }

    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn get_action(&self, name: &str) -> Result<Action, FlowError> {
        self.actions
            .get(name)
            .cloned()
            .ok_or_else(|| FlowError::UnknownAction {
                flow: self.name.clone(),
                action: name.to_string(),
            })
    }
}

impl fmt::Debug for Flow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Flow")
            .field("name", &self.name)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
