//! Pure conversions from a flow response to what a channel can display.

pub mod chat;
pub mod ussd;

use flow_message::MediaType;
use thiserror::Error;

pub use chat::render as render_chat;
pub use ussd::render as render_ussd;

#[derive(Debug, Error, PartialEq)]
pub enum RenderError {
    #[error("{0} media cannot be used as a button header")]
    UnsupportedHeader(MediaType),

    #[error("media cannot be attached to a list of more than {max_buttons} choices")]
    MediaWithList { max_buttons: usize },
}
