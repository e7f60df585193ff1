use flow_message::{Choices, Media};

use crate::error::FlowError;
use crate::session::SessionError;

/// What a flow step returns: `Ok` to continue with a value, `Err` to unwind.
pub type FlowResult<T = ()> = Result<T, Interrupt>;

/// Control-flow signals a flow raises to leave the current request.
///
/// They travel up through `?` like any error and are consumed by the
/// executor, which turns them into a normalized [`flow_message::Response`].
#[derive(Debug)]
pub enum Interrupt {
    /// The flow cannot continue without another answer from the user.
    Prompt {
        message: String,
        choices: Option<Choices>,
        media: Option<Media>,
    },
    /// The flow is finished; the session is destroyed.
    Terminate { message: String, media: Option<Media> },
    /// Re-enter the flow's action from the top.
    Restart,
    /// Not part of the conversation: propagated to the caller.
    Failed(FlowError),
}

impl Interrupt {
    pub fn prompt(message: impl Into<String>) -> Self {
        Interrupt::Prompt {
            message: message.into(),
            choices: None,
            media: None,
        }
    }

    pub fn terminate(message: impl Into<String>) -> Self {
        Interrupt::Terminate {
            message: message.into(),
            media: None,
        }
    }

    pub fn is_prompt(&self) -> bool {
        matches!(self, Interrupt::Prompt { .. })
    }

    pub fn is_terminate(&self) -> bool {
        matches!(self, Interrupt::Terminate { .. })
    }
}

impl From<FlowError> for Interrupt {
    fn from(err: FlowError) -> Self {
        Interrupt::Failed(err)
    }
}

impl From<SessionError> for Interrupt {
    fn from(err: SessionError) -> Self {
        Interrupt::Failed(FlowError::Session(err))
    }
}
