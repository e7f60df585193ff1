use async_trait::async_trait;
use flow_message::Response;
use tracing::{debug, info, warn};

use crate::app::App;
use crate::config::PromptConfig;
use crate::context::Context;
use crate::error::{FlowError, Result};
use crate::interrupt::Interrupt;
use crate::pipeline::Endpoint;

/// Upper bound on `go_back` restarts within one request.
pub const MAX_RESTARTS: usize = 16;

pub const UNEXPECTED_END_OF_FLOW: &str = "Unexpected end of flow.";

/// Runs the requested flow action and turns its interrupt into a [`Response`].
///
/// This is the only place interrupts are consumed: a prompt becomes a
/// prompt response, a termination destroys the session, a restart re-enters
/// the action without input, and anything else is handed back as an error.
#[derive(Debug, Clone, Default)]
pub struct FlowExecutor {
    prompt: PromptConfig,
    max_choices_with_media: Option<usize>,
}

impl FlowExecutor {
    pub fn new(prompt: PromptConfig, max_choices_with_media: Option<usize>) -> Self {
        Self {
            prompt,
            max_choices_with_media,
        }
    }

    pub fn execute(&self, ctx: &Context) -> Result<Response, FlowError> {
        let action = ctx.flow().get_action(ctx.action())?;
        let session = ctx.session()?.clone();

        for restarts in 0..=MAX_RESTARTS {
            let mut app = App::new(ctx, &self.prompt, self.max_choices_with_media)?;
            if restarts > 0 {
                app = app.without_input();
            }

            match action(&mut app) {
                Err(Interrupt::Prompt { message, choices, media }) => {
                    debug!(flow = ctx.flow().name(), screens = app.navigation().len(), "prompting");
                    return Ok(Response::prompt(message, choices, media));
                }
                Err(Interrupt::Terminate { message, media }) => {
                    info!(flow = ctx.flow().name(), session = session.id(), "flow terminated");
                    session.destroy();
                    return Ok(Response::terminal(message, media));
                }
                Err(Interrupt::Restart) => {
                    debug!(flow = ctx.flow().name(), restarts = restarts + 1, "restarting flow");
                }
                Err(Interrupt::Failed(err)) => return Err(err),
                Ok(()) => {
                    warn!(
                        flow = ctx.flow().name(),
                        action = ctx.action(),
                        "flow returned without prompting or terminating"
                    );
                    session.destroy();
                    return Ok(Response::terminal(UNEXPECTED_END_OF_FLOW, None));
                }
            }
        }

        Err(FlowError::RestartLoop {
            flow: ctx.flow().name().to_string(),
            restarts: MAX_RESTARTS,
        })
    }
}

#[async_trait]
impl Endpoint for FlowExecutor {
    async fn call(&self, ctx: &mut Context) -> Result<Response> {
        Ok(self.execute(ctx)?)
    }
}
