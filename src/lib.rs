//! Screen-based conversational flows for USSD and chat channels.
//!
//! A [`Flow`] is a set of named actions. An action is ordinary Rust code
//! written against [`App`]; each [`App::screen`] either replays the answer
//! stored in the session or unwinds with a prompt for the user. A
//! [`Processor`] wires a gateway, a session store and a flow into a
//! middleware pipeline for one channel.

pub mod app;
pub mod config;
pub mod context;
pub mod demo;
pub mod error;
pub mod executor;
pub mod flow;
pub mod gateway;
pub mod interrupt;
pub mod logger;
pub mod middleware;
pub mod pipeline;
pub mod processor;
pub mod prompt;
pub mod render;
pub mod schema;
pub mod session;

pub use app::App;
pub use config::{ConfigManager, EnvConfigManager, FlowConfig, MapConfigManager};
pub use context::{Context, Platform, RequestInfo};
pub use error::{Error, FlowError, Result};
pub use flow::Flow;
pub use interrupt::{FlowResult, Interrupt};
pub use processor::{Processor, ProcessorBuilder};
pub use prompt::PromptBuilder;

pub use flow_message::{Choices, Media, MediaType, Response, ResponseKind};
