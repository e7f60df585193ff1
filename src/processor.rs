//! Assembles a channel's pipeline around a gateway, a store and a flow.

use std::sync::Arc;

use tracing::info;

use crate::config::{ConfigError, FlowConfig};
use crate::context::{Context, Platform};
use crate::error::{Error, Result};
use crate::executor::FlowExecutor;
use crate::flow::Flow;
use crate::gateway::Gateway;
use crate::logger::RequestMetrics;
use crate::middleware::{ChoiceMapper, PaginationMiddleware, SessionMiddleware};
use crate::pipeline::{Middleware, Pipeline};
use crate::session::{Identifier, SessionConfig, SessionStore};

/// Handles one gateway's requests for one flow action.
pub struct Processor<G: Gateway> {
    gateway: G,
    flow: Arc<Flow>,
    action: String,
    pipeline: Pipeline,
    metrics: RequestMetrics,
}

impl<G: Gateway> Processor<G> {
    /// Parses `request`, runs it through the pipeline and renders the reply.
    pub async fn handle(&self, request: G::Request) -> Result<G::Reply> {
        self.metrics
            .instrument_request(self.flow.name(), || async move {
                let info = self.gateway.parse(request)?;
                let mut ctx = Context::new(info, Arc::clone(&self.flow), self.action.as_str());
                let response = self.pipeline.call(&mut ctx).await?;
                self.metrics.record_response(&response);
                Ok::<_, Error>(self.gateway.reply(ctx.request(), response)?)
            })
            .await
    }

    pub fn gateway(&self) -> &G {
        &self.gateway
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }
}

/// Collects the pieces of a processor; [`ProcessorBuilder::run`] checks
/// them all before anything is served.
pub struct ProcessorBuilder<G: Gateway> {
    platform: Platform,
    config: FlowConfig,
    gateway: Option<G>,
    store: Option<SessionStore>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl<G: Gateway> ProcessorBuilder<G> {
    /// Session, pagination and choice numbering around the flow.
    pub fn ussd(config: FlowConfig) -> Self {
        Self::new(Platform::Ussd, config)
    }

    /// Session around the flow; widgets are rendered by the gateway.
    pub fn chat(config: FlowConfig) -> Self {
        Self::new(Platform::Chat, config)
    }

    fn new(platform: Platform, config: FlowConfig) -> Self {
        Self {
            platform,
            config,
            gateway: None,
            store: None,
            middleware: Vec::new(),
        }
    }

    pub fn use_gateway(mut self, gateway: G) -> Self {
        self.gateway = Some(gateway);
        self
    }

    pub fn use_session_store(mut self, store: SessionStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn use_session_config(mut self, session: SessionConfig) -> Self {
        self.config.session = session;
        self
    }

    /// Runs between the channel middleware and the flow, in call order.
    pub fn use_middleware<M: Middleware + 'static>(mut self, middleware: M) -> Self {
        self.middleware.push(Arc::new(middleware));
        self
    }

    pub fn run(self, flow: Flow, action: impl Into<String>) -> Result<Processor<G>, ConfigError> {
        let action = action.into();
        let gateway = self.gateway.ok_or(ConfigError::MissingGateway)?;
        let store = self.store.ok_or(ConfigError::MissingSessionStore)?;

        if gateway.platform() != self.platform {
            return Err(ConfigError::Invalid {
                key: "gateway".into(),
                value: gateway.name().to_string(),
                reason: format!(
                    "a {} gateway cannot serve a {} processor",
                    gateway.platform(),
                    self.platform
                ),
            });
        }
        if !flow.has_action(&action) {
            return Err(ConfigError::UnknownAction {
                flow: flow.name().to_string(),
                action,
            });
        }
        self.config.validate()?;

        let mut builder = Pipeline::builder();
        let executor = match self.platform {
            Platform::Ussd => {
                let ussd = &self.config.ussd;
                builder = builder
                    .with(SessionMiddleware::new(
                        store,
                        self.config.session.clone(),
                        ussd.default_identifier(),
                        ussd.session_ttl(),
                    ))
                    .with(PaginationMiddleware::new(ussd.pagination.clone())?)
                    .with(ChoiceMapper);
                FlowExecutor::new(self.config.prompt.clone(), None)
            }
            Platform::Chat => {
                let chat = &self.config.chat;
                builder = builder.with(
                    SessionMiddleware::new(
                        store,
                        self.config.session.clone(),
                        Identifier::Durable,
                        chat.session_ttl(),
                    )
                    .with_fresh_start(),
                );
                FlowExecutor::new(self.config.prompt.clone(), chat.max_choices_with_media)
            }
        };
        for middleware in self.middleware {
            builder = builder.with_arc(middleware);
        }
        let pipeline = builder.build(executor);

        info!(
            flow = flow.name(),
            action = %action,
            gateway = gateway.name(),
            middleware = ?pipeline.names(),
            "processor ready"
        );

        Ok(Processor {
            gateway,
            flow: Arc::new(flow),
            action,
            pipeline,
            metrics: RequestMetrics::new(),
        })
    }
}
