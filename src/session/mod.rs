//! Durable per-conversation storage.
//!
//! A [`Session`] is a JSON key/value map scoped by a derived session key
//! (see [`key`]). Stores hand out sessions and persist them between
//! requests (see [`store`]).

pub mod key;
pub mod state;
pub mod store;

use thiserror::Error;

pub use key::{Boundary, Identifier, SessionConfig};
pub use state::Session;
pub use store::{InMemorySessionStore, SessionStore, SessionStoreType};

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session store unavailable: {0}")]
    Unavailable(String),

    #[error("value stored under `{key}` could not be (de)serialized: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no `{0}` available to identify the session")]
    MissingIdentifier(&'static str),
}
