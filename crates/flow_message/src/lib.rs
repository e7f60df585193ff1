pub mod log;
pub mod message;

pub use log::LogLevel;
pub use message::{
    Button, ChatPayload, Choice, Choices, ListRow, ListSection, Location, Media, MediaType,
    Participant, Response, ResponseKind,
};
