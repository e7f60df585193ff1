use thiserror::Error;

use crate::config::ConfigError;
use crate::gateway::GatewayError;
use crate::render::RenderError;
use crate::session::SessionError;

/// Programming errors raised from inside a flow run.
///
/// Invalid user input never ends up here; it is answered with a re-prompt.
#[derive(Debug, Error)]
pub enum FlowError {
    #[error("screen `{0}` has already been presented in this flow run")]
    DuplicateScreen(String),

    #[error("usage error: {0}")]
    Usage(String),

    #[error("invalid argument: {0}")]
    Argument(String),

    #[error("flow `{flow}` has no action named `{action}`")]
    UnknownAction { flow: String, action: String },

    #[error("flow `{flow}` restarted {restarts} times within one request")]
    RestartLoop { flow: String, restarts: usize },

    #[error(transparent)]
    Session(#[from] SessionError),
}

/// Everything a processor can fail with.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Flow(#[from] FlowError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Gateway(#[from] GatewayError),

    #[error(transparent)]
    Render(#[from] RenderError),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
